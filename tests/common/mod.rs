//! Shared helpers for integration tests.

#![allow(dead_code)]

use lessdb::coding::put_var32;

/// Minimal block writer producing the layout the block reader expects:
/// prefix-compressed entries, a full key every `restart_interval`
/// entries, then the restart offsets in order and their count.
pub struct BlockBuilder {
    buf: Vec<u8>,
    restarts: Vec<u32>,
    restart_interval: usize,
    counter: usize,
    last_key: Vec<u8>,
}

impl BlockBuilder {
    pub fn new(restart_interval: usize) -> Self {
        assert!(restart_interval > 0);
        Self {
            buf: Vec::new(),
            restarts: Vec::new(),
            restart_interval,
            counter: 0,
            last_key: Vec::new(),
        }
    }

    /// Keys must be added in strictly increasing bytewise order.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> &mut Self {
        assert!(
            self.restarts.is_empty() || key > &self.last_key[..],
            "keys must be added in order"
        );
        let shared = if self.counter % self.restart_interval == 0 {
            self.restarts.push(self.buf.len() as u32);
            0
        } else {
            key.iter()
                .zip(&self.last_key)
                .take_while(|(a, b)| a == b)
                .count()
        };

        put_var32(&mut self.buf, shared as u32);
        put_var32(&mut self.buf, (key.len() - shared) as u32);
        put_var32(&mut self.buf, value.len() as u32);
        self.buf.extend_from_slice(&key[shared..]);
        self.buf.extend_from_slice(value);

        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        self.counter += 1;
        self
    }

    pub fn finish(&self) -> Vec<u8> {
        let mut out = self.buf.clone();
        for restart in &self.restarts {
            out.extend_from_slice(&restart.to_le_bytes());
        }
        out.extend_from_slice(&(self.restarts.len() as u32).to_le_bytes());
        out
    }
}

/// Encode a block from already sorted pairs.
pub fn build_block<K: AsRef<[u8]>, V: AsRef<[u8]>>(
    entries: &[(K, V)],
    restart_interval: usize,
) -> Vec<u8> {
    let mut builder = BlockBuilder::new(restart_interval);
    for (k, v) in entries {
        builder.add(k.as_ref(), v.as_ref());
    }
    builder.finish()
}

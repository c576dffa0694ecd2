//! LessDB - Block Inspector
//! Dumps the entries of a raw table block.
//!
//! Usage: `lessdb <block-file> [seek-key]`
//!
//! Keys are ordered bytewise. With a seek key, printing starts at the
//! first entry not less than it. Set `RUST_LOG=debug` for decoder logs.

use std::process;

use lessdb::comparator::BytewiseComparator;
use lessdb::engine::{Block, BlockContents};
use lessdb::error::Result;

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <block-file> [seek-key]", args[0]);
        process::exit(2);
    }

    if let Err(err) = run(&args[1], args.get(2).map(|s| s.as_bytes())) {
        eprintln!("[ERROR] {}", err);
        process::exit(1);
    }
}

fn run(path: &str, seek: Option<&[u8]>) -> Result<()> {
    let contents = BlockContents::from_file(path)?;
    let cmp = BytewiseComparator;
    let block = Block::from_contents(&contents, &cmp)?;

    println!(
        "  {} bytes, {} restart points",
        block.size(),
        block.num_restarts()
    );

    let mut cursor = match seek {
        Some(target) => block.lower_bound(target),
        None => block.begin(),
    };
    let mut printed = 0usize;
    while cursor.valid() {
        println!(
            "  {:>6}  {} => {}",
            cursor.offset(),
            display_bytes(cursor.key()),
            display_bytes(cursor.value())
        );
        printed += 1;
        cursor.advance();
    }
    cursor.status()?;

    println!(
        "  {} entries printed, {} headers decoded",
        printed,
        block.entries_decoded()
    );
    Ok(())
}

/// Quote UTF-8 text, hex-dump anything else.
fn display_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => format!("{:?}", s),
        Err(_) => bytes.iter().map(|b| format!("{:02x}", b)).collect(),
    }
}

//! Basic pool usage example
//!
//! Submits 100 print tasks to a pool of four workers, then joins it.
//!
//! Run with: cargo run --example basic_usage

use work_pool::prelude::*;

fn main() -> Result<()> {
    env_logger::init();

    let pool = ThreadPool::new(4)?;

    for i in 0..100 {
        pool.submit(move || {
            println!("{}", i);
        })?;
    }

    pool.join()?;

    match serde_json::to_string_pretty(&pool.stats()) {
        Ok(stats) => eprintln!("{}", stats),
        Err(e) => eprintln!("failed to render stats: {}", e),
    }

    Ok(())
}

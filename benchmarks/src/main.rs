use std::process::ExitCode;

use clap::Parser;
use helix_arena_bench::{logger, run, BenchConfig};

fn main() -> ExitCode {
    let config = BenchConfig::parse();
    logger::init(config.log_level);

    match run(&config) {
        Ok(report) => {
            println!("{}", report);
            ExitCode::SUCCESS
        },
        Err(err) => {
            eprintln!("arena-bench: {}", err);
            ExitCode::FAILURE
        },
    }
}

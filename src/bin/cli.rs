//! SiltDB - interactive prompt
//!
//! A line-oriented prompt over the execution engine: every line is one
//! complete statement. Blank lines and `--` comment lines are skipped;
//! `exit` or `quit` ends the session.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use siltdb::Engine;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    // A single positional argument overrides the file stem, so `siltdb mydb`
    // uses mydb.db and mydb_meta.json.
    let stem = std::env::args().nth(1).unwrap_or_else(|| "siltdb".to_string());
    let db_path = format!("{}.db", stem);
    let meta_path = format!("{}_meta.json", stem);

    let mut engine = match Engine::open(&db_path, &meta_path) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Failed to open database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Welcome to SiltDB!");
    println!("Type SQL statements followed by Enter.");
    println!("Type 'exit' or 'quit' to exit.");
    println!();

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("siltdb> ");
        io::stdout().flush().ok();

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                eprintln!("Error reading input: {}", e);
                continue;
            }
            // EOF
            None => break,
        };

        let input = line.trim();
        if input.is_empty() || input.starts_with("--") {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        match engine.execute_sql(input) {
            Ok(result) => println!("{}", result),
            Err(e) => println!("Error: {}", e),
        }
        println!();
    }

    if let Err(e) = engine.close() {
        eprintln!("Failed to flush database: {}", e);
        return ExitCode::FAILURE;
    }

    println!("Goodbye!");
    ExitCode::SUCCESS
}

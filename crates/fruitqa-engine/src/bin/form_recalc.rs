//! `form-recalc`: replay edits against a template and print the document.
//!
//! Usage:
//!   form-recalc <template.json> [engine.toml]
//!
//! Reads `{"data": {...}?, "edits": [{"path": "...", "value": ...}]}` from
//! stdin. Set `RUST_LOG=debug` to see every rule write.

use std::io::{self, Read, Write};

use fruitqa_engine::recalc_cli::run_recalc;

fn read_file(path: &str) -> String {
    match std::fs::read_to_string(path) {
        Ok(src) => src,
        Err(e) => {
            eprintln!("{path}: {e}");
            std::process::exit(1);
        }
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let template = match args.get(1) {
        Some(path) => read_file(path),
        None => {
            eprintln!("First argument must be a template JSON file.");
            std::process::exit(1);
        }
    };
    let options = args.get(2).map(|path| read_file(path));

    let mut buf = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut buf) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    match run_recalc(&template, options.as_deref(), buf.trim()) {
        Ok(result) => {
            let mut stdout = io::stdout();
            if let Err(e) = stdout.write_all(result.as_bytes()).and_then(|_| stdout.write_all(b"\n")) {
                eprintln!("{e}");
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

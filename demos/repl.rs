//! Line-oriented REPL over a hunkstore arena.
//!
//! Reads whitespace-separated commands from stdin:
//!
//! ```text
//! insert <key> <value>
//! select <key>
//! update <key> <value>
//! delete <key>
//! stats
//! ```
//!
//! Successful selects echo the value; failures print `error: <code>` to
//! stderr. Keys and values are taken as raw token bytes.

use std::io::{self, BufRead, Write};

use hunkstore::{code_of, Store};

const ARENA_SIZE: usize = 16 * 1024;

fn main() {
    env_logger::init();

    let mut buf = vec![0u8; ARENA_SIZE];
    let mut store = Store::init(&mut buf, 4).expect("arena init");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        let mut tokens = line.split_whitespace();
        let Some(command) = tokens.next() else {
            continue;
        };

        match (command, tokens.next(), tokens.next()) {
            ("insert", Some(key), Some(value)) => {
                let result = store.create(key.as_bytes(), value.as_bytes());
                report(&result);
            }
            ("select", Some(key), None) => match store.get(key.as_bytes()) {
                Some(value) => {
                    stdout.write_all(value).ok();
                    println!();
                }
                None => eprintln!("error: -2"),
            },
            ("update", Some(key), Some(value)) => {
                let result = store.update(key.as_bytes(), value.as_bytes());
                report(&result);
            }
            ("delete", Some(key), None) => {
                store.delete(key.as_bytes());
                println!("ok");
            }
            ("stats", None, None) => println!("{}", store.stats()),
            _ => eprintln!("invalid: {line}"),
        }
    }
}

fn report<T>(result: &hunkstore::Result<T>) {
    let code = code_of(result);
    if code < 0 {
        eprintln!("error: {code}");
    } else {
        println!("ok");
    }
}

//! respkv CLI Client
//!
//! Command-line interface for interacting with a respkv server.

use clap::{Parser, Subcommand};
use respkv::network::Client;
use respkv::Value;

/// respkv CLI
#[derive(Parser, Debug)]
#[command(name = "respkv-cli")]
#[command(about = "CLI for the respkv key-value server")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ping the server, optionally with a message to echo
    Ping {
        message: Option<String>,
    },

    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete one or more keys
    Del {
        /// The keys to delete
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Set a field of a hash
    Hset {
        hash: String,
        field: String,
        value: String,
    },

    /// Get a field of a hash
    Hget {
        hash: String,
        field: String,
    },

    /// Get every field and value of a hash
    Hgetall {
        hash: String,
    },
}

impl Commands {
    fn into_parts(self) -> Vec<String> {
        let mut parts = Vec::new();
        match self {
            Commands::Ping { message } => {
                parts.push("PING".to_string());
                parts.extend(message);
            }
            Commands::Get { key } => parts.extend(["GET".to_string(), key]),
            Commands::Set { key, value } => parts.extend(["SET".to_string(), key, value]),
            Commands::Del { keys } => {
                parts.push("DEL".to_string());
                parts.extend(keys);
            }
            Commands::Hset { hash, field, value } => {
                parts.extend(["HSET".to_string(), hash, field, value])
            }
            Commands::Hget { hash, field } => parts.extend(["HGET".to_string(), hash, field]),
            Commands::Hgetall { hash } => parts.extend(["HGETALL".to_string(), hash]),
        }
        parts
    }
}

fn main() {
    let args = Args::parse();

    let mut client = match Client::connect(&args.server) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Could not connect to {}: {}", args.server, e);
            std::process::exit(1);
        }
    };

    let parts = args.command.into_parts();
    match client.call(&parts[..]) {
        Ok(reply) => {
            let failed = matches!(reply, Value::Error(_));
            print_reply(&reply, 0);
            if failed {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print a reply the way redis-cli does
fn print_reply(reply: &Value, indent: usize) {
    let pad = " ".repeat(indent);
    match reply {
        Value::SimpleString(text) => println!("{}{}", pad, text),
        Value::Error(text) => println!("{}(error) {}", pad, text),
        Value::Integer(n) => println!("{}(integer) {}", pad, n),
        Value::Bulk(data) => println!("{}\"{}\"", pad, String::from_utf8_lossy(data)),
        Value::Null => println!("{}(nil)", pad),
        Value::Array(values) if values.is_empty() => println!("{}(empty array)", pad),
        Value::Array(values) => {
            for (i, value) in values.iter().enumerate() {
                print!("{}{}) ", pad, i + 1);
                match value {
                    Value::Array(_) => {
                        println!();
                        print_reply(value, indent + 3);
                    }
                    _ => print_reply(value, 0),
                }
            }
        }
    }
}

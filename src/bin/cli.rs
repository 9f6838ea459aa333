//! TetherKV CLI Client
//!
//! Command-line interface for a running TetherKV server.

use clap::{Parser, Subcommand};
use tetherkv::rpc::tcp;
use tetherkv::{ClientConfig, RemoteKv, RemoteStore, Result};

/// TetherKV CLI
#[derive(Parser, Debug)]
#[command(name = "tetherkv-cli")]
#[command(about = "CLI for the TetherKV storage service")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7450")]
    server: String,

    /// Keyspace to operate on
    #[arg(short, long, default_value = "default")]
    keyspace: String,

    /// Method name prefix the service was registered with
    #[arg(short, long, default_value = "")]
    prefix: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get { key: String },

    /// Store a key-value pair
    Put {
        key: String,
        value: String,

        /// Overwrite an existing key
        #[arg(long)]
        replace: bool,
    },

    /// Delete a key
    Del { key: String },

    /// Check which of the given keys exist
    Has { keys: Vec<String> },

    /// Report sizes of the given keys
    Stat { keys: Vec<String> },

    /// List keys in ascending order
    List {
        /// First key to list (inclusive)
        #[arg(long, default_value = "")]
        start: String,
    },

    /// Count entries in the keyspace
    Len,

    /// Store a value under its content-derived key
    CasPut { value: String },

    /// Report which of the given keys are missing
    Sync { keys: Vec<String> },

    /// Fetch server status
    Status,
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let peer = tcp::dial(&args.server)?;
    let config = ClientConfig::builder().prefix(&args.prefix).build();
    let store = RemoteStore::new(peer, config);

    if let Commands::Status = args.command {
        let status = store.status()?;
        println!("{}", String::from_utf8_lossy(&status));
        return Ok(());
    }

    let kv = store.keyspace(&args.keyspace)?;
    execute(&kv, &args.command)
}

fn execute(kv: &RemoteKv, command: &Commands) -> Result<()> {
    match command {
        Commands::Get { key } => {
            let value = kv.get(key.as_bytes())?;
            println!("{}", String::from_utf8_lossy(&value));
        }
        Commands::Put {
            key,
            value,
            replace,
        } => {
            kv.put(key.as_bytes(), value.as_bytes(), *replace)?;
            println!("OK");
        }
        Commands::Del { key } => {
            kv.delete(key.as_bytes())?;
            println!("OK");
        }
        Commands::Has { keys } => {
            for (key, present) in keys.iter().zip(kv.has(keys)?) {
                println!("{}\t{}", key, present);
            }
        }
        Commands::Stat { keys } => {
            for (key, size) in keys.iter().zip(kv.stat(keys)?) {
                match size {
                    Some(size) => println!("{}\t{}", key, size),
                    None => println!("{}\t(absent)", key),
                }
            }
        }
        Commands::List { start } => {
            for key in kv.list(start.as_bytes()) {
                println!("{}", String::from_utf8_lossy(&key?));
            }
        }
        Commands::Len => {
            println!("{}", kv.len()?);
        }
        Commands::CasPut { value } => {
            let key = kv.cas_put(value.as_bytes(), &[], &[])?;
            println!("{}", hex(&key));
        }
        Commands::Sync { keys } => {
            for key in kv.sync_keys(keys)? {
                println!("{}", String::from_utf8_lossy(&key));
            }
        }
        Commands::Status => unreachable!("handled before keyspace resolution"),
    }
    Ok(())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

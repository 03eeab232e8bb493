use bloom_blacklist::{
    BlacklistEngine, FileStorage, HashConfig, RedbStorage, Request, Response,
    RunMode,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the persisted state
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Number of bits in the Bloom filter
    #[arg(short, long, default_value = "1024")]
    array_size: usize,

    /// Hash repeat counts, one per hash function (comma separated)
    #[arg(short, long, value_delimiter = ',', default_values_t = [1u32, 2])]
    repeats: Vec<u32>,

    /// Storage backend
    #[arg(short, long, value_enum, default_value = "files")]
    storage: Backend,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    Files,
    Redb,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a URL to the blacklist
    Add {
        /// URL to add
        url: String,
    },

    /// Check whether a URL is blacklisted
    Check {
        /// URL to check
        url: String,
    },

    /// Remove a URL from the blacklist
    Delete {
        /// URL to remove
        url: String,
    },

    /// Display information about the filter and the blacklist
    Info {
        /// Also print every blacklisted URL
        #[arg(short, long)]
        list: bool,
    },

    /// Read `<operation> <url>` lines from stdin and print each response
    Console,
}

fn open_engine(cli: &Cli) -> Result<BlacklistEngine, Box<dyn std::error::Error>> {
    let config = HashConfig::new(cli.array_size, cli.repeats.clone())?;
    let engine = match cli.storage {
        Backend::Files => {
            BlacklistEngine::open(config, FileStorage::open(&cli.data_dir)?)?
        }
        Backend::Redb => {
            std::fs::create_dir_all(&cli.data_dir)?;
            let path = cli.data_dir.join("blacklist.redb");
            BlacklistEngine::open(config, RedbStorage::open(path)?)?
        }
    };
    if engine.run_mode() == RunMode::Fresh {
        if let Some(previous) = engine.previous_record() {
            eprintln!(
                "Note: configuration '{}' differs from the stored '{}', starting with an empty blacklist.",
                engine.config().record_line(),
                previous.trim()
            );
        }
    }
    Ok(engine)
}

fn validated(url: &str) -> Result<&str, Box<dyn std::error::Error>> {
    if bloom_blacklist::url::is_valid_url(url) {
        Ok(url)
    } else {
        Err(format!("'{url}' is not a valid URL").into())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let engine = open_engine(&cli)?;

    match &cli.command {
        Commands::Add { url } => {
            engine.execute(&Request::add(validated(url)?))?;
            println!("Added '{url}' to the blacklist");
        }
        Commands::Check { url } => {
            match engine.execute(&Request::contain(validated(url)?))? {
                Response::Contains {
                    filter_hit: false, ..
                } => println!("'{url}' is not blacklisted"),
                Response::Contains {
                    filter_hit: true,
                    exact_hit: false,
                } => println!(
                    "'{url}' is not blacklisted (Bloom filter false positive)"
                ),
                Response::Contains { .. } => println!("'{url}' is blacklisted"),
                other => println!("{other}"),
            }
        }
        Commands::Delete { url } => {
            match engine.execute(&Request::delete(validated(url)?))? {
                Response::NoContent => println!("Removed '{url}'"),
                _ => println!("'{url}' was not blacklisted"),
            }
        }
        Commands::Info { list } => {
            let stats = engine.stats()?;
            let fill = stats.bits_set as f64 / stats.array_size as f64;
            println!("Filter Information:");
            println!("  Data directory: {}", cli.data_dir.display());
            println!("  Configuration: {}", engine.config().record_line());
            println!("  Array size: {} bits", stats.array_size);
            println!("  Hash functions: {}", stats.hash_functions);
            println!(
                "  Bits set: {} ({:.2}%)",
                stats.bits_set,
                fill * 100.0
            );
            println!(
                "  Estimated false positive rate: {:.4}%",
                fill.powi(stats.hash_functions as i32) * 100.0
            );
            println!("  Blacklisted URLs: {}", stats.blacklisted);
            if *list {
                for url in engine.blacklisted()? {
                    println!("    {url}");
                }
            }
        }
        Commands::Console => {
            let stdin = io::stdin();
            let mut stdout = io::stdout().lock();
            for line in stdin.lock().lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                writeln!(stdout, "{}", engine.handle_line(&line))?;
                stdout.flush()?;
            }
        }
    }

    Ok(())
}

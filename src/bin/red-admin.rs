use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use red_engine::store::RedirectWriter;

#[derive(Parser)]
#[command(name = "red-admin")]
#[command(about = "Maintain the path → target mapping served by red-engine", long_about = None)]
struct Cli {
    /// Directory holding red-engine.db.
    #[arg(long = "home-dir", default_value = "/var/lib/red-engine")]
    home_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or replace a redirect
    Put { path: String, target: String },
    /// Show the target for a path
    Get { path: String },
    /// Delete a redirect
    Remove { path: String },
    /// List every redirect
    List {
        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("red-admin: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let writer = RedirectWriter::open(&cli.home_dir)?;

    match cli.command {
        Commands::Put { path, target } => {
            writer.put(&path, &target)?;
        }
        Commands::Get { path } => match writer.get(&path)? {
            Some(target) => println!("{target}"),
            None => {
                eprintln!("red-admin: no redirect for '{path}'");
                return Ok(ExitCode::FAILURE);
            }
        },
        Commands::Remove { path } => {
            if !writer.remove(&path)? {
                eprintln!("red-admin: no redirect for '{path}'");
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::List { json } => {
            let entries = writer.list()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in entries {
                    println!("{}\t{}", entry.path, entry.target);
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}


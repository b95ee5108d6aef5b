use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use server_api::normalize_calendars;
use shared::{domain::CalendarList, protocol::CalendarsPayload};
use storage::Storage;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/calendars.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Show,
    /// Write the stored list as `{"calendars": [...]}` JSON.
    Export {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replace the stored list with one read from a JSON file.
    Import {
        file: PathBuf,
    },
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;
    run(cli.command, &storage).await
}

async fn run(command: Command, storage: &Storage) -> Result<()> {
    match command {
        Command::Show => {
            let calendars = storage.load_calendars().await?;
            for (priority, entry) in calendars.rows() {
                println!("{priority}\t{}\t{}", entry.name, entry.kind);
            }
            match storage.last_updated().await? {
                Some(at) => println!("{} calendars, last updated {at}", calendars.len()),
                None => println!("list has never been written"),
            }
        }
        Command::Export { output } => {
            let payload = CalendarsPayload::new(storage.load_calendars().await?);
            let json = serde_json::to_string_pretty(&payload)?;
            match output {
                Some(path) => {
                    fs::write(&path, json)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("exported {} calendars", payload.calendars.len());
                }
                None => println!("{json}"),
            }
        }
        Command::Import { file } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let payload: CalendarsPayload = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a calendar list", file.display()))?;
            let calendars = normalize_calendars(payload.calendars)?;
            let stored = storage.replace_calendars(&calendars).await?;
            println!("imported {} calendars", stored.len());
        }
        Command::Clear => {
            storage.replace_calendars(&CalendarList::default()).await?;
            println!("cleared calendar list");
        }
    }

    Ok(())
}

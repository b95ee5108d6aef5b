use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use client_core::{ListStoreClient, LookAhead, NextEventFinder, UpcomingEvent};
use shared::{
    domain::{CalendarKind, CalendarList, Entry},
    mutation::ListIntent,
    protocol::CalendarsPayload,
};

#[derive(Parser, Debug)]
#[command(about = "View and edit the prioritized calendar list")]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:5001")]
    server_url: String,
    /// Print the resulting list as JSON instead of a table.
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    List,
    MoveUp {
        priority: usize,
    },
    MoveDown {
        priority: usize,
    },
    Rename {
        priority: usize,
        name: String,
    },
    Remove {
        priority: usize,
    },
    AddIcs {
        name: String,
        url: String,
    },
    Add {
        name: String,
        #[arg(long = "type")]
        kind: String,
        #[arg(long)]
        url: Option<String>,
    },
    /// Show the next event from the `ics-url` calendars.
    Next {
        /// Window to search, as `{days}.{hh}:{mm}:{ss}`.
        #[arg(long, default_value = "1.00:00:00")]
        look_ahead: LookAhead,
    },
}

impl Command {
    fn intent(self) -> Option<ListIntent> {
        let intent = match self {
            Command::List | Command::Next { .. } => return None,
            Command::MoveUp { priority } => ListIntent::MoveUp { index: priority },
            Command::MoveDown { priority } => ListIntent::MoveDown { index: priority },
            Command::Rename { priority, name } => ListIntent::Rename {
                index: priority,
                name,
            },
            Command::Remove { priority } => ListIntent::Remove { index: priority },
            Command::AddIcs { name, url } => ListIntent::Add {
                entry: Entry::ics(name, url),
            },
            Command::Add { name, kind, url } => {
                let mut entry = Entry::new(name, CalendarKind::from(kind));
                entry.url = url;
                ListIntent::Add { entry }
            }
        };
        Some(intent)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let client = ListStoreClient::connect(&args.server_url)?;
    let mut calendars = client
        .pull()
        .await
        .with_context(|| format!("could not load calendars from {}", args.server_url))?;

    if let Command::Next { look_ahead } = &args.command {
        let now = Utc::now();
        let next = NextEventFinder::new()
            .next_event(&calendars, now, *look_ahead)
            .await;
        if args.json {
            let value = next.as_ref().map(|event| {
                serde_json::json!({
                    "calendar": event.calendar,
                    "summary": event.summary,
                    "start": event.starts_at.to_rfc3339(),
                })
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        } else {
            println!("{}", render_next(next.as_ref(), now));
        }
        return Ok(());
    }

    if let Some(intent) = args.command.intent() {
        calendars = client
            .apply(&intent)
            .await
            .with_context(|| format!("{} was not applied", intent.name()))?;
    }

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&CalendarsPayload::new(calendars))?
        );
    } else {
        print!("{}", render_rows(&calendars));
    }
    Ok(())
}

fn render_rows(calendars: &CalendarList) -> String {
    let name_width = calendars
        .iter()
        .map(|entry| entry.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Name".len());

    let mut out = format!("{:<8}  {:<name_width$}  Type\n", "Priority", "Name");
    for (priority, entry) in calendars.rows() {
        out.push_str(&format!(
            "{:<8}  {:<name_width$}  {}",
            priority, entry.name, entry.kind
        ));
        if let Some(url) = &entry.url {
            out.push_str(&format!("  {url}"));
        }
        out.push('\n');
    }
    if calendars.is_empty() {
        out.push_str("(no calendars)\n");
    }
    out
}

fn render_next(next: Option<&UpcomingEvent>, now: DateTime<Utc>) -> String {
    let Some(event) = next else {
        return "no events in the look-ahead window".to_string();
    };
    let wait = event.starts_in(now);
    format!(
        "{} ({}) at {} UTC, in {}h {:02}m",
        event.summary,
        event.calendar,
        event.starts_at.format("%Y-%m-%d %H:%M"),
        wait.num_hours(),
        wait.num_minutes() % 60
    )
}

//! CLI subcommands.
//!
//! - `streamlog db migrate` - Run pending migrations
//! - `streamlog db status` - Check connectivity and migration status
//! - `streamlog stream append <stream-id> <stream-type> <event-type> <json> <expected-version>`
//! - `streamlog stream load <stream-id>` - Print payloads, one JSON document per line
//! - `streamlog stream show <stream-id>` - Print stream metadata and full events

use tracing::info;
use uuid::Uuid;

use streamlog_db::{connect, migrate, status};
use streamlog_eventlog::{EventStore, NewEvent, PgEventStore};

use crate::config::Config;
use crate::error::{CliError, CliResult};

pub const USAGE: &str = "Usage: streamlog <db migrate|db status|stream append|stream load|stream show> [args]";

/// A parsed command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Migrate,
    Status,
    Append {
        stream_id: Uuid,
        stream_type: String,
        event: NewEvent,
        expected_version: i64,
    },
    Load {
        stream_id: Uuid,
    },
    Show {
        stream_id: Uuid,
    },
}

impl Command {
    /// Parse arguments, excluding the program name.
    pub fn parse(args: &[String]) -> CliResult<Self> {
        let words: Vec<&str> = args.iter().map(String::as_str).collect();

        match words.as_slice() {
            ["db", "migrate"] => Ok(Command::Migrate),
            ["db", "status"] => Ok(Command::Status),
            ["db", other, ..] => Err(CliError::Usage(format!(
                "Unknown db command: {}. Use migrate or status",
                other
            ))),
            ["stream", "append", stream_id, stream_type, event_type, payload, expected_version] => {
                let payload = serde_json::from_str(payload)
                    .map_err(|e| CliError::Usage(format!("Payload is not valid JSON: {}", e)))?;
                let expected_version = expected_version.parse::<i64>().map_err(|_| {
                    CliError::Usage(format!("Invalid expected version: {}", expected_version))
                })?;

                Ok(Command::Append {
                    stream_id: parse_stream_id(stream_id)?,
                    stream_type: stream_type.to_string(),
                    event: NewEvent::new(*event_type, payload),
                    expected_version,
                })
            },
            ["stream", "append", ..] => Err(CliError::Usage(
                "stream append <stream-id> <stream-type> <event-type> <json> <expected-version>"
                    .to_string(),
            )),
            ["stream", "load", stream_id] => Ok(Command::Load {
                stream_id: parse_stream_id(stream_id)?,
            }),
            ["stream", "show", stream_id] => Ok(Command::Show {
                stream_id: parse_stream_id(stream_id)?,
            }),
            _ => Err(CliError::Usage(USAGE.to_string())),
        }
    }
}

fn parse_stream_id(raw: &str) -> CliResult<Uuid> {
    raw.parse::<Uuid>()
        .map_err(|_| CliError::Usage(format!("Invalid stream id: {}", raw)))
}

/// Connect to the database and run `command`.
pub async fn run(command: Command, config: &Config) -> anyhow::Result<()> {
    let pool = connect(&config.pool_config()?).await?;

    match command {
        Command::Migrate => {
            migrate(&pool).await?;
        },
        Command::Status => {
            status(&pool).await?;
        },
        Command::Append {
            stream_id,
            stream_type,
            event,
            expected_version,
        } => {
            let store = PgEventStore::new(pool.clone()).with_options(config.append);
            let outcome = store
                .append(stream_id, &stream_type, event, expected_version)
                .await
                .map_err(CliError::from)?;

            info!(
                event_id = %outcome.event_id,
                stream_id = %outcome.stream_id,
                version = outcome.version,
                created_stream = outcome.created_stream,
                "Appended"
            );
            println!("{}", serde_json::to_string(&outcome)?);
        },
        Command::Load { stream_id } => {
            let store = PgEventStore::new(pool.clone());
            for payload in store.load(stream_id).await.map_err(CliError::from)? {
                println!("{}", payload);
            }
        },
        Command::Show { stream_id } => {
            let store = PgEventStore::new(pool.clone());
            match store.get_stream(stream_id).await.map_err(CliError::from)? {
                Some(stream) => {
                    println!("{}", serde_json::to_string(&stream)?);
                    for event in store.load_events(stream_id, 0).await.map_err(CliError::from)? {
                        println!("{}", serde_json::to_string(&event)?);
                    }
                },
                None => info!(stream_id = %stream_id, "Stream not found"),
            }
        },
    }

    pool.close().await;
    Ok(())
}

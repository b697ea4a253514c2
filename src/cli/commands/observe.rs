//! `foresight observe`: record, import and count raw observations.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;
use uuid::Uuid;

use crate::cli::output::{action_success, output, CommandOutput};
use crate::cli::workspace::Workspace;
use crate::domain::models::{EnvironmentVariable, Observation, PresenceState};
use crate::domain::ports::ObservationRepository;

#[derive(Args, Debug)]
pub struct ObserveArgs {
    #[command(subcommand)]
    pub command: ObserveCommand,
}

#[derive(Subcommand, Debug)]
pub enum ObserveCommand {
    /// Record a single observation
    ///
    /// Examples: `record activity cooking --room kitchen`,
    /// `record presence arrived`, `record device oven on`,
    /// `record environment temperature 21.5`
    Record {
        kind: RecordKind,

        /// Activity name, presence state, device and state, or variable and value
        #[arg(required = true, num_args = 1..=2)]
        values: Vec<String>,

        /// Room the observation was made in
        #[arg(long)]
        room: Option<String>,

        /// Occupant the observation refers to
        #[arg(long)]
        user: Option<String>,

        /// Observation time (RFC3339), defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Import observations from a JSON array or JSON Lines file
    Import {
        file: PathBuf,
    },

    /// Count stored observations
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RecordKind {
    Activity,
    Presence,
    Device,
    Environment,
}

#[derive(Debug, serde::Serialize)]
pub struct RecordOutput {
    pub id: Uuid,
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

impl CommandOutput for RecordOutput {
    fn to_human(&self) -> String {
        let room = self
            .room
            .as_deref()
            .map(|r| format!(" in {r}"))
            .unwrap_or_default();
        action_success(&format!(
            "Recorded {} observation{room} at {}",
            self.kind,
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ))
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ImportOutput {
    pub file: PathBuf,
    pub read: usize,
    pub inserted: usize,
    pub duplicates: usize,
}

impl CommandOutput for ImportOutput {
    fn to_human(&self) -> String {
        let mut message = format!(
            "Imported {} of {} observation(s) from {}",
            self.inserted,
            self.read,
            self.file.display()
        );
        if self.duplicates > 0 {
            message.push_str(&format!(" ({} already stored)", self.duplicates));
        }
        action_success(&message)
    }
}

#[derive(Debug, serde::Serialize)]
pub struct CountOutput {
    pub count: u64,
}

impl CommandOutput for CountOutput {
    fn to_human(&self) -> String {
        format!("{} stored observation(s)", self.count)
    }
}

pub async fn execute(args: ObserveArgs, json_mode: bool) -> Result<()> {
    let workspace = Workspace::open().await?;
    let repository = workspace.observations();

    match args.command {
        ObserveCommand::Record {
            kind,
            values,
            room,
            user,
            at,
        } => {
            let mut observation = build_observation(kind, &values, at.unwrap_or_else(Utc::now))?;
            if let Some(room) = room {
                observation = observation.in_room(room);
            }
            if let Some(user) = user {
                observation = observation.by_user(user);
            }
            observation.validate()?;

            repository
                .append(&observation)
                .await
                .context("Failed to store observation")?;

            output(
                &RecordOutput {
                    id: observation.id,
                    kind: observation.kind().to_string(),
                    timestamp: observation.timestamp,
                    room: observation.room,
                },
                json_mode,
            );
        }
        ObserveCommand::Import { file } => {
            let content = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let observations = parse_observations(&content)?;

            let inserted = repository
                .append_batch(&observations)
                .await
                .context("Failed to store observations")?;

            output(
                &ImportOutput {
                    file,
                    read: observations.len(),
                    inserted,
                    duplicates: observations.len().saturating_sub(inserted),
                },
                json_mode,
            );
        }
        ObserveCommand::Count => {
            let count = repository
                .count()
                .await
                .context("Failed to count observations")?;
            output(&CountOutput { count }, json_mode);
        }
    }

    Ok(())
}

/// Build an observation from positional command-line values.
pub fn build_observation(
    kind: RecordKind,
    values: &[String],
    timestamp: DateTime<Utc>,
) -> Result<Observation> {
    let first = values
        .first()
        .ok_or_else(|| anyhow!("missing observation value"))?;
    let second = values.get(1);

    let observation = match (kind, second) {
        (RecordKind::Activity, None) => Observation::activity(timestamp, first),
        (RecordKind::Presence, None) => {
            let state = match first.to_lowercase().as_str() {
                "arrived" | "home" => PresenceState::Arrived,
                "departed" | "away" => PresenceState::Departed,
                other => bail!("unknown presence state '{other}', expected arrived or departed"),
            };
            Observation::presence(timestamp, state)
        }
        (RecordKind::Device, Some(state)) => {
            Observation::device_state(timestamp, first, state).from_device(first)
        }
        (RecordKind::Environment, Some(value)) => {
            let variable = EnvironmentVariable::from_str(first)
                .ok_or_else(|| anyhow!("unknown environment variable '{first}'"))?;
            let value: f64 = value
                .parse()
                .with_context(|| format!("invalid reading '{value}'"))?;
            Observation::environment(timestamp, variable, value)
        }
        (RecordKind::Activity | RecordKind::Presence, Some(_)) => {
            bail!("{kind:?} observations take exactly one value")
        }
        (RecordKind::Device | RecordKind::Environment, None) => {
            bail!("{kind:?} observations take two values")
        }
    };

    Ok(observation)
}

/// Parse a JSON array or JSON Lines document, validating every observation.
pub fn parse_observations(content: &str) -> Result<Vec<Observation>> {
    let observations: Vec<Observation> = if content.trim_start().starts_with('[') {
        serde_json::from_str(content).context("Invalid observation array")?
    } else {
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("Invalid observation on line {}", index + 1))
            })
            .collect::<Result<_>>()?
    };

    for observation in &observations {
        observation.validate()?;
    }
    Ok(observations)
}

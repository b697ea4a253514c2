//! `foresight pattern`: analyze stored history and inspect learned patterns.

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};

use crate::cli::output::{
    format_percent, format_timestamp, list_table, output, render_list, short_id, truncate,
    CommandOutput,
};
use crate::cli::workspace::Workspace;
use crate::domain::models::{MomentPrediction, Pattern, PatternType};

#[derive(Args, Debug)]
pub struct PatternArgs {
    #[command(subcommand)]
    pub command: PatternCommand,
}

#[derive(Subcommand, Debug)]
pub enum PatternCommand {
    /// Analyze stored observations and list promoted patterns
    List {
        /// Filter by type: daily, weekly, sequence, comfort
        #[arg(short = 't', long = "type")]
        pattern_type: Option<String>,

        /// Include dormant patterns
        #[arg(long)]
        all: bool,
    },

    /// Show one pattern by id or id prefix
    Show {
        id: String,
    },

    /// Predict activities and environment for a moment
    Predict {
        /// Moment to predict (RFC3339), defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct PatternListOutput {
    pub patterns: Vec<Pattern>,
    pub observations_analyzed: usize,
}

impl CommandOutput for PatternListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "type", "status", "confidence", "seen", "summary"]);
        for pattern in &self.patterns {
            table.add_row(vec![
                short_id(&pattern.id),
                pattern.pattern_type.to_string(),
                pattern.status.to_string(),
                format_percent(pattern.confidence),
                pattern.occurrences.to_string(),
                truncate(&pattern.summary(), 48),
            ]);
        }
        format!(
            "{}\n\n{} observation(s) analyzed",
            render_list("pattern", &table, self.patterns.len()),
            self.observations_analyzed
        )
    }
}

#[derive(Debug, serde::Serialize)]
pub struct PatternDetailOutput {
    pub pattern: Pattern,
}

impl CommandOutput for PatternDetailOutput {
    fn to_human(&self) -> String {
        let p = &self.pattern;
        let mut lines = vec![
            "Pattern Details:".to_string(),
            format!("  ID:          {}", p.id),
            format!("  Key:         {}", p.key),
            format!("  Type:        {}", p.pattern_type),
            format!("  Status:      {}", p.status),
            format!("  Confidence:  {}", format_percent(p.confidence)),
            format!("  Stability:   {}", format_percent(p.stability)),
            format!("  Occurrences: {}", p.occurrences),
            format!("  First seen:  {}", format_timestamp(p.first_observed)),
            format!("  Last seen:   {}", format_timestamp(p.last_observed)),
            format!("  Summary:     {}", p.summary()),
        ];
        if let Some(decayed) = p.last_decayed_at {
            lines.push(format!("  Last decay:  {}", format_timestamp(decayed)));
        }
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct PredictionOutput {
    pub prediction: MomentPrediction,
}

impl CommandOutput for PredictionOutput {
    fn to_human(&self) -> String {
        let prediction = &self.prediction;
        if prediction.activities.is_empty() && prediction.environment.is_empty() {
            return format!(
                "No prediction for {}: no active pattern applies.",
                format_timestamp(prediction.moment)
            );
        }

        let mut lines = vec![format!(
            "Prediction for {} (confidence {}):",
            format_timestamp(prediction.moment),
            format_percent(prediction.confidence)
        )];
        for activity in &prediction.activities {
            let room = activity
                .room
                .as_deref()
                .map(|r| format!(" in {r}"))
                .unwrap_or_default();
            lines.push(format!(
                "  {}{room} ({})",
                activity.name,
                format_percent(activity.confidence)
            ));
        }
        let env = &prediction.environment;
        for (name, value) in [
            ("temperature", env.temperature),
            ("humidity", env.humidity),
            ("light", env.light),
        ] {
            if let Some(value) = value {
                lines.push(format!("  target {name}: {value:.1}"));
            }
        }
        lines.join("\n")
    }
}

pub async fn execute(args: PatternArgs, json_mode: bool) -> Result<()> {
    let workspace = Workspace::open().await?;
    let (anticipator, report) = workspace.anticipator().await?;
    workspace.save_patterns(&anticipator).await?;

    match args.command {
        PatternCommand::List { pattern_type, all } => {
            let filter = pattern_type
                .as_deref()
                .map(|t| PatternType::from_str(t).ok_or_else(|| anyhow!("unknown pattern type '{t}'")))
                .transpose()?;

            let mut patterns: Vec<Pattern> = anticipator
                .patterns()
                .into_iter()
                .filter(|p| filter.is_none_or(|t| p.pattern_type == t))
                .filter(|p| all || p.is_active())
                .cloned()
                .collect();
            patterns.sort_by(|a, b| {
                b.confidence
                    .total_cmp(&a.confidence)
                    .then_with(|| a.key.cmp(&b.key))
            });

            output(
                &PatternListOutput {
                    patterns,
                    observations_analyzed: anticipator.pattern_engine().observation_count(),
                },
                json_mode,
            );
            tracing::debug!(events = report.events.len(), "analysis pass finished");
        }
        PatternCommand::Show { id } => {
            let pattern = find_by_prefix(anticipator.patterns(), &id)?.clone();
            output(&PatternDetailOutput { pattern }, json_mode);
        }
        PatternCommand::Predict { at } => {
            let moment = at.unwrap_or_else(|| anticipator.now());
            let prediction = anticipator.prediction_for_moment(moment);
            output(&PredictionOutput { prediction }, json_mode);
        }
    }

    Ok(())
}

/// Resolve a full id or unique id prefix.
pub fn find_by_prefix<'a>(patterns: Vec<&'a Pattern>, id: &str) -> Result<&'a Pattern> {
    let needle = id.trim().to_lowercase();
    if needle.is_empty() {
        bail!("pattern id cannot be empty");
    }
    let matches: Vec<&Pattern> = patterns
        .into_iter()
        .filter(|p| {
            p.id.to_string().starts_with(&needle) || p.id.simple().to_string().starts_with(&needle)
        })
        .collect();

    match matches.as_slice() {
        [pattern] => Ok(pattern),
        [] => Err(anyhow!(
            "Pattern {id} not found. Use 'foresight pattern list --all' to see available patterns."
        )),
        _ => bail!(
            "Pattern id prefix {id} is ambiguous: {} patterns match",
            matches.len()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{PatternCandidate, PatternSignature};
    use std::collections::BTreeMap;

    fn pattern() -> Pattern {
        let now = Utc::now();
        Pattern::from_candidate(&PatternCandidate {
            key: "daily:slot9".to_string(),
            signature: PatternSignature::DailyRoutine {
                slot: 9,
                mean_minute_of_day: 19 * 60,
                activities: BTreeMap::from([("cooking".to_string(), 1.0)]),
                dominant_room: Some("kitchen".to_string()),
                consistency: 0.9,
            },
            observation_ids: Vec::new(),
            strength: 0.8,
            first_seen: now,
            last_seen: now,
        })
    }

    #[test]
    fn test_find_by_prefix() {
        let a = pattern();
        let b = pattern();
        let prefix = a.id.to_string()[..8].to_string();

        let found = find_by_prefix(vec![&a, &b], &prefix).unwrap();
        assert_eq!(found.id, a.id);
        assert!(find_by_prefix(vec![&a, &b], "zzzz").is_err());
        assert!(find_by_prefix(vec![&a], "").is_err());
    }

    #[test]
    fn test_list_output_renders_summary() {
        let output = PatternListOutput {
            patterns: vec![pattern()],
            observations_analyzed: 20,
        };
        let human = output.to_human();
        assert!(human.contains("cooking around 18:00-20:00"));
        assert!(human.contains("20 observation(s) analyzed"));
    }
}

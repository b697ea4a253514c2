//! `foresight scenario`: generate and inspect scenarios.

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::cli::output::{
    format_percent, list_table, output, render_list, truncate, CommandOutput,
};
use crate::cli::workspace::{ContextSnapshot, Workspace};
use crate::domain::models::{Horizon, Scenario, TriggeredPreparation};

#[derive(Args, Debug)]
pub struct ScenarioArgs {
    #[command(subcommand)]
    pub command: ScenarioCommand,
}

#[derive(Subcommand, Debug)]
pub enum ScenarioCommand {
    /// Regenerate scenarios from stored patterns and list them
    List {
        /// YAML or JSON file with calendar, context and occupants
        #[arg(short, long)]
        context: Option<PathBuf>,

        /// Only show one horizon: immediate, short_term, daily, weekly
        #[arg(long)]
        horizon: Option<String>,

        /// Show preparation actions under each scenario
        #[arg(short, long)]
        preparations: bool,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct ScenarioListOutput {
    pub scenarios: Vec<Scenario>,
    pub conflicts: usize,
    pub triggered: Vec<TriggeredPreparation>,
    #[serde(skip)]
    pub show_preparations: bool,
}

impl CommandOutput for ScenarioListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["start", "horizon", "prob", "source", "description", "preps"]);
        for scenario in &self.scenarios {
            let probability = if scenario.conflicted || !scenario.conflicts_with.is_empty() {
                format!("{}*", format_percent(scenario.probability))
            } else {
                format_percent(scenario.probability)
            };
            table.add_row(vec![
                scenario.timeframe.start().format("%a %H:%M").to_string(),
                scenario.horizon.to_string(),
                probability,
                scenario.source.to_string(),
                truncate(&scenario.description, 44),
                scenario.required_preparation.len().to_string(),
            ]);
        }

        let mut sections = vec![render_list("scenario", &table, self.scenarios.len())];

        if self.show_preparations {
            for scenario in self.scenarios.iter().filter(|s| !s.required_preparation.is_empty()) {
                let mut lines = vec![format!("{}:", scenario.description)];
                for action in &scenario.required_preparation {
                    lines.push(format!(
                        "  {} [{}] {} (priority {})",
                        action.execute_at.format("%a %H:%M"),
                        action.category,
                        action.description,
                        action.priority
                    ));
                }
                sections.push(lines.join("\n"));
            }
        }

        if self.conflicts > 0 {
            sections.push(format!(
                "{} conflict(s) detected; * marks adjusted probabilities",
                self.conflicts
            ));
        }
        if !self.triggered.is_empty() {
            sections.push(format!("{} preparation(s) due now", self.triggered.len()));
        }
        sections.join("\n\n")
    }
}

pub async fn execute(args: ScenarioArgs, json_mode: bool) -> Result<()> {
    let ScenarioCommand::List {
        context,
        horizon,
        preparations,
    } = args.command;

    let horizon = horizon.as_deref().map(parse_horizon).transpose()?;
    let workspace = Workspace::open().await?;
    let (mut anticipator, _) = workspace.anticipator().await?;
    workspace.save_patterns(&anticipator).await?;

    if let Some(path) = context {
        ContextSnapshot::load(&path)?.apply(&mut anticipator)?;
    }

    let report = anticipator.regenerate_scenarios();
    let scenarios: Vec<Scenario> = anticipator
        .scenarios()
        .into_iter()
        .filter(|s| horizon.is_none_or(|h| s.horizon == h))
        .cloned()
        .collect();

    output(
        &ScenarioListOutput {
            scenarios,
            conflicts: report.conflicts,
            triggered: report.triggered,
            show_preparations: preparations,
        },
        json_mode,
    );
    Ok(())
}

pub fn parse_horizon(value: &str) -> Result<Horizon> {
    let normalized = value.trim().to_lowercase().replace('-', "_");
    Horizon::ALL
        .into_iter()
        .find(|h| h.as_str() == normalized)
        .ok_or_else(|| anyhow!("unknown horizon '{value}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_horizon() {
        assert_eq!(parse_horizon("short-term").unwrap(), Horizon::ShortTerm);
        assert_eq!(parse_horizon("Daily").unwrap(), Horizon::Daily);
        assert!(parse_horizon("monthly").is_err());
    }

    #[test]
    fn test_empty_list_output() {
        let output = ScenarioListOutput {
            scenarios: Vec::new(),
            conflicts: 0,
            triggered: Vec::new(),
            show_preparations: true,
        };
        assert_eq!(output.to_human(), "No scenarios found.");
    }
}

//! Command-line interface.
//!
//! `foresight [--json] <command>` where command is one of `init`, `observe`,
//! `pattern`, `scenario` or `run`. Logs go to stderr; command output to stdout.

pub mod commands;
pub mod output;
pub mod workspace;

use clap::{Parser, Subcommand};

use commands::{
    init::InitArgs, observe::ObserveArgs, pattern::PatternArgs, run::RunArgs,
    scenario::ScenarioArgs,
};

#[derive(Parser, Debug)]
#[command(name = "foresight")]
#[command(about = "Foresight - household anticipation engine", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create .foresight/config.yaml and the database
    Init(InitArgs),

    /// Record, import and count observations
    Observe(ObserveArgs),

    /// Analyze history and inspect learned patterns
    Pattern(PatternArgs),

    /// Generate and list scenarios
    Scenario(ScenarioArgs),

    /// Run the anticipation daemon in the foreground
    Run(RunArgs),
}

/// Print an error in the requested format and exit with status 1.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let chain: Vec<String> = err.chain().map(ToString::to_string).collect();
        let body = serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "causes": chain.get(1..).unwrap_or_default(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );
    } else {
        eprintln!("{} {err:#}", console::style("Error:").red().bold());
    }
    std::process::exit(1);
}

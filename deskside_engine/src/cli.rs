use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    about = "Headless host that replays input scenarios against the deskside interaction core",
    version
)]
pub struct Args {
    /// JSON machine table to use instead of the built-in desk
    #[arg(long)]
    pub machines: Option<PathBuf>,

    /// JSON frame configuration naming the active screen frame
    #[arg(long)]
    pub frames: Option<PathBuf>,

    /// JSON interaction config (timings, keys, screens)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding panel layouts (`<frame path>.json`) for screen content
    #[arg(long)]
    pub layout_root: Option<PathBuf>,

    /// Built-in scenario name or path to a scenario JSON file
    #[arg(long, default_value = "monitor_power")]
    pub scenario: String,

    /// Print the built-in scenario names and exit
    #[arg(long)]
    pub list_scenarios: bool,

    /// Path to write the session event log as JSON
    #[arg(long)]
    pub event_log_json: Option<PathBuf>,

    /// Path to write the final status snapshot as JSON
    #[arg(long)]
    pub status_json: Option<PathBuf>,

    /// Path to write a screen texture as PNG after the scenario
    #[arg(long)]
    pub dump_texture: Option<PathBuf>,

    /// Screen id whose texture --dump-texture writes
    #[arg(long, default_value = "monitor")]
    pub dump_screen: String,

    /// Print every event instead of the compact summary
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Debug)]
pub enum Command {
    ListScenarios,
    Run(RunArgs),
}

#[derive(Debug)]
pub struct RunArgs {
    pub machines: Option<PathBuf>,
    pub frames: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub layout_root: Option<PathBuf>,
    pub scenario: ScenarioSource,
    pub event_log_json: Option<PathBuf>,
    pub status_json: Option<PathBuf>,
    pub dump_texture: Option<(String, PathBuf)>,
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioSource {
    BuiltIn(String),
    File(PathBuf),
}

pub fn parse() -> Result<Command> {
    let args = Args::parse();
    args.into_command()
}

impl Args {
    fn into_command(self) -> Result<Command> {
        if self.list_scenarios {
            return Ok(Command::ListScenarios);
        }

        let scenario = if self.scenario.ends_with(".json") {
            ScenarioSource::File(PathBuf::from(&self.scenario))
        } else if deskside_engine::scenario::Scenario::BUILTIN.contains(&self.scenario.as_str()) {
            ScenarioSource::BuiltIn(self.scenario.clone())
        } else {
            bail!(
                "unknown scenario '{}' (built-in: {})",
                self.scenario,
                deskside_engine::scenario::Scenario::BUILTIN.join(", ")
            );
        };

        if let Some(path) = &self.dump_texture {
            if path.extension().and_then(|ext| ext.to_str()) != Some("png") {
                bail!("--dump-texture expects a .png path (got {})", path.display());
            }
        }

        Ok(Command::Run(RunArgs {
            machines: self.machines,
            frames: self.frames,
            config: self.config,
            layout_root: self.layout_root,
            scenario,
            event_log_json: self.event_log_json,
            status_json: self.status_json,
            dump_texture: self.dump_texture.map(|path| (self.dump_screen, path)),
            verbose: self.verbose,
        }))
    }
}

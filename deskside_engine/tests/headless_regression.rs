use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use serde::Deserialize;
use tempfile::tempdir;

#[derive(Debug, Deserialize)]
struct LoggedEvent {
    event: String,
    at_ms: u64,
}

#[derive(Debug, Deserialize)]
struct ScreenSummary {
    id: String,
    powered_on: bool,
    locked_on: bool,
    generation: u64,
}

#[derive(Debug, Deserialize)]
struct StatusSummary {
    control_attached: bool,
    screens: Vec<ScreenSummary>,
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str().context("temporary path is not valid UTF-8")
}

#[test]
fn monitor_power_run_writes_logs_and_texture() -> Result<()> {
    let temp_dir = tempdir().context("creating temporary directory for scenario output")?;
    let events_path = temp_dir.path().join("events.json");
    let status_path = temp_dir.path().join("status.json");
    let texture_path = temp_dir.path().join("monitor.png");

    let status = Command::new(env!("CARGO_BIN_EXE_deskside_engine"))
        .args([
            "--scenario",
            "monitor_power",
            "--event-log-json",
            path_str(&events_path)?,
            "--status-json",
            path_str(&status_path)?,
            "--dump-texture",
            path_str(&texture_path)?,
        ])
        .status()
        .context("executing deskside_engine")?;
    assert!(status.success(), "deskside_engine exited with {status:?}");

    let events: Vec<LoggedEvent> = read_json(&events_path)?;
    let names: Vec<&str> = events.iter().map(|event| event.event.as_str()).collect();
    for expected in [
        "lock_on.begin",
        "lock_on.arrived",
        "element.action",
        "screen.power",
        "screen.capture",
        "lock_on.exit",
        "lock_on.released",
    ] {
        assert!(names.contains(&expected), "missing {expected} in {names:?}");
    }
    assert!(
        events.windows(2).all(|pair| pair[0].at_ms <= pair[1].at_ms),
        "event log is not in time order"
    );

    let summary: StatusSummary = read_json(&status_path)?;
    assert!(summary.control_attached);
    let monitor = summary
        .screens
        .iter()
        .find(|screen| screen.id == "monitor")
        .context("monitor missing from status")?;
    assert!(monitor.powered_on);
    assert!(!monitor.locked_on);
    assert!(monitor.generation >= 1);

    let texture = image::open(&texture_path).context("decoding dumped texture")?;
    assert_eq!((texture.width(), texture.height()), (1024, 768));
    Ok(())
}

#[test]
fn unknown_scenario_is_rejected() -> Result<()> {
    let output = Command::new(env!("CARGO_BIN_EXE_deskside_engine"))
        .args(["--scenario", "no_such_scenario"])
        .output()
        .context("executing deskside_engine")?;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown scenario"), "stderr: {stderr}");
    Ok(())
}

#[test]
fn list_scenarios_prints_builtins() -> Result<()> {
    let output = Command::new(env!("CARGO_BIN_EXE_deskside_engine"))
        .arg("--list-scenarios")
        .output()
        .context("executing deskside_engine")?;
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["monitor_power", "chat_terminal", "radio_tuning"] {
        assert!(stdout.lines().any(|line| line == name), "missing {name}");
    }
    Ok(())
}

use anyhow::{anyhow, Context, Result};
use deskside_engine::demo::{self, ContentSource};
use deskside_engine::events::SessionEvent;
use deskside_engine::scenario::{run_scenario, Scenario, ScenarioReport};
use deskside_engine::{InteractionConfig, MachineRegistry};
use deskside_formats::FrameConfig;

mod cli;
use cli::{Command, RunArgs, ScenarioSource};

fn main() -> Result<()> {
    env_logger::init();
    match cli::parse()? {
        Command::ListScenarios => {
            for name in Scenario::BUILTIN {
                println!("{name}");
            }
            Ok(())
        }
        Command::Run(args) => run(args),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let registry = match args.machines.as_deref() {
        Some(path) => MachineRegistry::from_json_file(path)?,
        None => MachineRegistry::builtin(),
    };
    let config = match args.config.as_deref() {
        Some(path) => InteractionConfig::from_json_file(path)?,
        None => InteractionConfig::default(),
    };
    let frames = match args.frames.as_deref() {
        Some(path) => FrameConfig::from_json_file(path)?,
        None => demo::demo_frames(),
    };
    let content = match args.layout_root.clone() {
        Some(root) => ContentSource::Directory(root),
        None => ContentSource::BuiltIn,
    };
    let scenario = match &args.scenario {
        ScenarioSource::BuiltIn(name) => Scenario::builtin(name)
            .ok_or_else(|| anyhow!("built-in scenario '{name}' disappeared"))?,
        ScenarioSource::File(path) => Scenario::from_json_file(path)?,
    };

    let mut session = demo::build_session(demo::demo_scene(), registry, config, frames, &content);
    let report = run_scenario(&mut session, &scenario);

    if let Some(path) = args.event_log_json.as_ref() {
        report.write_event_log(path)?;
        println!("Saved event log JSON to {}", path.display());
    }
    if let Some(path) = args.status_json.as_ref() {
        report.status.write_json(path)?;
        println!("Saved status JSON to {}", path.display());
    }
    if let Some((screen_id, path)) = args.dump_texture.as_ref() {
        let screen = session
            .screens()
            .find(|screen| screen.id() == *screen_id)
            .with_context(|| format!("no screen named '{screen_id}'"))?;
        match screen.save_texture(path) {
            Ok(()) => println!("Saved {screen_id} texture to {}", path.display()),
            Err(err) => eprintln!("[deskside_engine] texture dump failed: {err:?}"),
        }
    }

    describe(&report, args.verbose);
    Ok(())
}

fn describe(report: &ScenarioReport, verbose: bool) {
    println!(
        "Scenario {}: {} frames, {} events",
        report.name,
        report.frames,
        report.events.len()
    );
    for event in &report.events {
        if verbose || !matches!(event, SessionEvent::ScreenCapture { .. } | SessionEvent::Focus { .. }) {
            println!("  - {}", describe_event(event));
        }
    }
    if !verbose {
        let captures = report
            .events
            .iter()
            .filter(|event| matches!(event, SessionEvent::ScreenCapture { .. }))
            .count();
        println!("  ({captures} screen captures not listed; use --verbose)");
    }

    let status = &report.status;
    println!("\nFinal phase: {:?}", status.phase);
    println!(
        "Camera at ({:.3}, {:.3}, {:.3}) | control attached: {}",
        status.camera.position.x,
        status.camera.position.y,
        status.camera.position.z,
        status.control_attached
    );
    for screen in &status.screens {
        println!(
            "Screen {:<14} powered: {:<5} locked: {:<5} generation: {}",
            screen.id, screen.powered_on, screen.locked_on, screen.generation
        );
    }
}

fn describe_event(event: &SessionEvent) -> String {
    match event {
        SessionEvent::Focus { at_ms, mesh } => {
            format!("{at_ms:>6} ms focus {}", mesh.as_deref().unwrap_or("-"))
        }
        SessionEvent::LockOnBegin {
            at_ms,
            machine,
            target,
        } => format!(
            "{at_ms:>6} ms lock-on begin {} -> ({:.2}, {:.2}, {:.2})",
            machine.as_deref().unwrap_or("-"),
            target.position.x,
            target.position.y,
            target.position.z
        ),
        SessionEvent::ElementAction {
            at_ms,
            machine,
            element,
            action,
            value,
        } => format!("{at_ms:>6} ms {machine}.{element} {} {value:?}", action.name()),
        SessionEvent::ScreenPower {
            at_ms,
            screen,
            powered_on,
        } => format!(
            "{at_ms:>6} ms screen {screen} {}",
            if *powered_on { "on" } else { "off" }
        ),
        SessionEvent::ScreenCapture {
            at_ms,
            screen,
            generation,
            reason,
        } => format!("{at_ms:>6} ms screen {screen} capture #{generation} ({reason:?})"),
        SessionEvent::CaptureFailed {
            at_ms,
            screen,
            reason,
            error,
        } => format!("{at_ms:>6} ms screen {screen} capture failed ({reason:?}): {error}"),
        other => format!("{:>6} ms {}", other.at_ms(), other.name()),
    }
}

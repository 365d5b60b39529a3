use std::time::Duration;

use deskside_engine::actions::dial_level;
use deskside_engine::demo::demo_session;
use deskside_engine::events::{CaptureReason, SessionEvent};
use deskside_engine::hud::Prompt;
use deskside_engine::scenario::{run_scenario, Scenario, FRAME_STEP};
use deskside_engine::{CameraPose, InteractionConfig, Phase};

fn frames(session: &mut deskside_engine::InteractionSystem<deskside_engine::MemoryScene>, ms: u64) {
    for _ in 0..ms.div_ceil(FRAME_STEP.as_millis() as u64) {
        session.update(FRAME_STEP);
    }
}

fn position_of(names: &[&str], wanted: &str) -> usize {
    names
        .iter()
        .position(|name| *name == wanted)
        .unwrap_or_else(|| panic!("event {wanted} missing from {names:?}"))
}

#[test]
fn monitor_power_round_trip() {
    let mut session = demo_session();
    let start = session.camera().pose();
    let scenario = Scenario::builtin("monitor_power").expect("built-in");
    let report = run_scenario(&mut session, &scenario);
    let names = report.event_names();

    let begin = position_of(&names, "lock_on.begin");
    let arrived = position_of(&names, "lock_on.arrived");
    let action = position_of(&names, "element.action");
    let power = position_of(&names, "screen.power");
    let capture = position_of(&names, "screen.capture");
    let exit = position_of(&names, "lock_on.exit");
    let returned = position_of(&names, "lock_on.returned");
    let released = position_of(&names, "lock_on.released");
    assert!(begin < arrived && arrived < action && action < power);
    assert!(power < capture && capture < exit);
    assert!(exit < returned && returned < released);

    let first_capture = report
        .events
        .iter()
        .find_map(|event| match event {
            SessionEvent::ScreenCapture { reason, screen, .. } => Some((screen.clone(), *reason)),
            _ => None,
        })
        .expect("a capture");
    assert_eq!(first_capture, ("monitor".to_string(), CaptureReason::PowerOn));

    let status = &report.status;
    assert_eq!(status.phase, Phase::Focused);
    assert!(status.control_attached);
    assert!(status.pointer.locked);
    assert!(status.render.fxaa);
    assert!(status.camera.approx_eq(&start, 1e-5));
    let monitor = status.screen("monitor").expect("monitor status");
    assert!(monitor.powered_on);
    assert!(!monitor.locked_on);
    assert!(monitor.generation >= 1);
}

#[test]
fn captures_stop_once_the_camera_leaves() {
    let mut session = demo_session();
    let scenario = Scenario::builtin("monitor_power").expect("built-in");
    run_scenario(&mut session, &scenario);
    let screen = session.screen("computer_monitor").expect("monitor").clone();
    let before = screen.generation();

    frames(&mut session, 2_000);
    assert_eq!(screen.generation(), before);
    assert!(!session
        .take_events()
        .iter()
        .any(|event| matches!(event, SessionEvent::ScreenCapture { .. })));
}

#[test]
fn escape_during_entry_returns_to_exact_start() {
    let mut session = demo_session();
    let start = session.camera().pose();
    frames(&mut session, 100);
    assert_eq!(session.focused(), Some("computer_monitor_screen"));

    assert!(session.key_down("KeyF"));
    frames(&mut session, 400);
    assert!(session.key_down("Escape"));
    assert_eq!(session.phase(), Phase::Transitioning(deskside_engine::lockon::Direction::Exit));

    // Re-entering mid-exit keeps the original pose to return to.
    assert!(session.key_down("KeyF"));
    frames(&mut session, 300);
    assert!(session.key_down("Escape"));
    frames(&mut session, 1_200);

    assert!(session.camera().pose().approx_eq(&start, 1e-5));
    assert!(session.camera().is_control_attached());
    assert_eq!(session.camera().limits, InteractionConfig::default().start_limits);
    assert_eq!(session.hud().prompt, Prompt::Interact);
}

#[test]
fn pose_override_wins_over_machine_pose() {
    let mut session = demo_session();
    let target = CameraPose::new(glam::Vec3::new(0.1, 1.25, -0.4), glam::Vec3::ZERO);
    session
        .registry_mut()
        .set_pose_override("computer_monitor", target);
    frames(&mut session, 100);
    assert!(session.key_down("KeyF"));
    frames(&mut session, 1_100);
    assert_eq!(session.phase(), Phase::LockedOn);
    assert!(session.camera().pose().approx_eq(&target, 1e-4));
}

#[test]
fn chat_terminal_keeps_refreshing_while_locked_on() {
    let mut session = demo_session();
    let scenario = Scenario::builtin("chat_terminal").expect("built-in");
    let report = run_scenario(&mut session, &scenario);

    let reasons: Vec<CaptureReason> = report
        .events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::ScreenCapture { screen, reason, .. } if screen == "chat_terminal" => {
                Some(*reason)
            }
            _ => None,
        })
        .collect();
    assert_eq!(reasons.first(), Some(&CaptureReason::PowerOn));
    assert!(reasons.contains(&CaptureReason::Interval));

    let chat = report.status.screen("chat_terminal").expect("chat status");
    assert!(chat.powered_on);
    assert!(!chat.locked_on);
    assert!(!chat.interval_suspended);
    assert_eq!(chat.frame.as_deref(), Some("chat"));
}

#[test]
fn radio_controls_feed_device_settings() {
    let mut session = demo_session();
    let scenario = Scenario::builtin("radio_tuning").expect("built-in");
    let report = run_scenario(&mut session, &scenario);

    // 60 px right on a 0.012 rad/px dial turns it back; the lever starts
    // centred and moves 0.005 per px.
    let volume = report.status.settings.volume.get("radio").copied().expect("volume set");
    let band = report.status.settings.band.get("radio").copied().expect("band set");
    assert!((volume - dial_level(-60.0 * 0.012)).abs() < 1e-4, "volume {volume}");
    assert!((band - 0.8).abs() < 1e-4, "band {band}");
    assert_eq!(report.status.phase, Phase::Focused);
    assert!(report.status.render.fxaa);
    assert!(report.status.control_attached);
}

#[test]
fn both_monitor_meshes_lock_onto_the_same_pose() {
    let registry = deskside_engine::MachineRegistry::builtin();
    let body = registry
        .lookup_by_mesh_id("computer_monitor")
        .expect("body mesh");
    let screen = registry
        .lookup_by_mesh_id("computer_monitor_screen")
        .expect("screen mesh");
    assert_eq!(body.id, screen.id);
    assert_eq!(
        registry.resolve_lock_on_pose(&body.id, false),
        registry.resolve_lock_on_pose(&screen.id, false)
    );
}

#[test]
fn session_clock_is_virtual() {
    let mut session = demo_session();
    session.update(Duration::from_millis(250));
    assert_eq!(session.now(), Duration::from_millis(250));
    assert_eq!(session.status().time_ms, 250);
}

#[test]
fn missed_pointer_up_still_reports_the_dial() {
    let mut session = demo_session();
    let scenario = Scenario {
        name: "radio_missed_release".to_string(),
        steps: serde_json::from_str(
            r#"[
                { "step": "look", "dx": 250.0, "dy": 60.0 },
                { "step": "wait", "ms": 100 },
                { "step": "key", "key": "KeyF" },
                { "step": "wait", "ms": 1100 },
                { "step": "pointer_down", "mesh": "radio_volume_dial", "x": 100.0 },
                { "step": "pointer_move", "mesh": "radio_volume_dial", "x": 160.0 },
                { "step": "pointer_down", "mesh": "radio_band_lever", "x": 0.0 },
                { "step": "pointer_move", "mesh": "radio_band_lever", "x": 60.0 },
                { "step": "pointer_up" },
                { "step": "wait", "ms": 200 }
            ]"#,
        )
        .expect("steps parse"),
    };
    let report = run_scenario(&mut session, &scenario);

    let actions = report
        .event_names()
        .iter()
        .filter(|name| **name == "element.action")
        .count();
    assert_eq!(actions, 2);
    let volume = report.status.settings.volume.get("radio").copied().expect("volume set");
    let band = report.status.settings.band.get("radio").copied().expect("band set");
    assert!((volume - dial_level(-60.0 * 0.012)).abs() < 1e-4, "volume {volume}");
    assert!((band - 0.8).abs() < 1e-4, "band {band}");
    assert_eq!(report.status.phase, Phase::LockedOn);
}

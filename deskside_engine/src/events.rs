use serde::Serialize;

use crate::actions::{ActionKind, ActionValue};
use crate::camera::CameraPose;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureReason {
    PowerOn,
    Activation,
    FollowUp,
    Mutation,
    Interval,
    Manual,
}

/// Observable milestones, in the order they happened. The headless host
/// writes these as its JSON event log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum SessionEvent {
    #[serde(rename = "focus")]
    Focus { at_ms: u64, mesh: Option<String> },
    #[serde(rename = "lock_on.begin")]
    LockOnBegin {
        at_ms: u64,
        machine: Option<String>,
        target: CameraPose,
    },
    #[serde(rename = "lock_on.arrived")]
    LockOnArrived { at_ms: u64, machine: Option<String> },
    #[serde(rename = "lock_on.exit")]
    LockOnExit { at_ms: u64, machine: Option<String> },
    #[serde(rename = "lock_on.returned")]
    LockOnReturned { at_ms: u64 },
    #[serde(rename = "lock_on.released")]
    LockOnReleased { at_ms: u64 },
    #[serde(rename = "element.action")]
    ElementAction {
        at_ms: u64,
        machine: String,
        element: String,
        action: ActionKind,
        value: ActionValue,
    },
    #[serde(rename = "screen.power")]
    ScreenPower {
        at_ms: u64,
        screen: String,
        powered_on: bool,
    },
    #[serde(rename = "screen.capture")]
    ScreenCapture {
        at_ms: u64,
        screen: String,
        generation: u64,
        reason: CaptureReason,
    },
    #[serde(rename = "screen.capture_failed")]
    CaptureFailed {
        at_ms: u64,
        screen: String,
        reason: CaptureReason,
        error: String,
    },
}

impl SessionEvent {
    pub fn at_ms(&self) -> u64 {
        match self {
            SessionEvent::Focus { at_ms, .. }
            | SessionEvent::LockOnBegin { at_ms, .. }
            | SessionEvent::LockOnArrived { at_ms, .. }
            | SessionEvent::LockOnExit { at_ms, .. }
            | SessionEvent::LockOnReturned { at_ms }
            | SessionEvent::LockOnReleased { at_ms }
            | SessionEvent::ElementAction { at_ms, .. }
            | SessionEvent::ScreenPower { at_ms, .. }
            | SessionEvent::ScreenCapture { at_ms, .. }
            | SessionEvent::CaptureFailed { at_ms, .. } => *at_ms,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Focus { .. } => "focus",
            SessionEvent::LockOnBegin { .. } => "lock_on.begin",
            SessionEvent::LockOnArrived { .. } => "lock_on.arrived",
            SessionEvent::LockOnExit { .. } => "lock_on.exit",
            SessionEvent::LockOnReturned { .. } => "lock_on.returned",
            SessionEvent::LockOnReleased { .. } => "lock_on.released",
            SessionEvent::ElementAction { .. } => "element.action",
            SessionEvent::ScreenPower { .. } => "screen.power",
            SessionEvent::ScreenCapture { .. } => "screen.capture",
            SessionEvent::CaptureFailed { .. } => "screen.capture_failed",
        }
    }
}

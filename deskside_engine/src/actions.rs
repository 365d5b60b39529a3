//! Typed element actions and the table that routes them to handlers.

use std::collections::{BTreeMap, HashMap};
use std::f32::consts::TAU;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::events::SessionEvent;
use crate::millis;
use crate::screen::ScreenHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    TogglePower,
    AdjustBrightness,
    SetVolume,
    TuneBand,
    SetEqualizerGain,
}

impl ActionKind {
    pub const ALL: [ActionKind; 5] = [
        ActionKind::TogglePower,
        ActionKind::AdjustBrightness,
        ActionKind::SetVolume,
        ActionKind::TuneBand,
        ActionKind::SetEqualizerGain,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ActionKind::TogglePower => "togglePower",
            ActionKind::AdjustBrightness => "adjustBrightness",
            ActionKind::SetVolume => "setVolume",
            ActionKind::TuneBand => "tuneBand",
            ActionKind::SetEqualizerGain => "setEqualizerGain",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ActionValue {
    /// Button completed a full press/release cycle.
    Press,
    /// Final dial angle in radians.
    Angle(f32),
    /// Final lever position in [0, 1].
    Progress(f32),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementEvent {
    pub machine_id: String,
    pub element_id: String,
    pub action: ActionKind,
    pub value: ActionValue,
}

/// Device-level values the machines' controls feed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeviceSettings {
    pub brightness: BTreeMap<String, f32>,
    pub volume: BTreeMap<String, f32>,
    pub band: BTreeMap<String, f32>,
    pub equalizer: BTreeMap<String, f32>,
}

pub struct ActionContext<'a> {
    pub now: Duration,
    pub screens: &'a HashMap<String, ScreenHandle>,
    pub settings: &'a mut DeviceSettings,
    pub events: &'a mut Vec<SessionEvent>,
}

pub type ActionHandler = fn(&mut ActionContext<'_>, &ElementEvent);

pub struct ActionTable {
    handlers: BTreeMap<ActionKind, ActionHandler>,
}

impl Default for ActionTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl ActionTable {
    pub fn empty() -> Self {
        ActionTable {
            handlers: BTreeMap::new(),
        }
    }

    pub fn standard() -> Self {
        let mut table = Self::empty();
        table.register(ActionKind::TogglePower, toggle_power);
        table.register(ActionKind::AdjustBrightness, adjust_brightness);
        table.register(ActionKind::SetVolume, set_volume);
        table.register(ActionKind::TuneBand, tune_band);
        table.register(ActionKind::SetEqualizerGain, set_equalizer_gain);
        table
    }

    pub fn register(&mut self, kind: ActionKind, handler: ActionHandler) -> Option<ActionHandler> {
        self.handlers.insert(kind, handler)
    }

    /// Runs the handler bound to the event's action. Returns `false` when no
    /// handler is registered.
    pub fn dispatch(&self, context: &mut ActionContext<'_>, event: &ElementEvent) -> bool {
        context.events.push(SessionEvent::ElementAction {
            at_ms: millis(context.now),
            machine: event.machine_id.clone(),
            element: event.element_id.clone(),
            action: event.action,
            value: event.value,
        });
        match self.handlers.get(&event.action) {
            Some(handler) => {
                handler(context, event);
                true
            }
            None => {
                log::warn!(
                    "no handler bound for action {} ({}.{})",
                    event.action.name(),
                    event.machine_id,
                    event.element_id
                );
                false
            }
        }
    }
}

fn toggle_power(context: &mut ActionContext<'_>, event: &ElementEvent) {
    let Some(screen) = context.screens.get(&event.machine_id) else {
        log::warn!("togglePower on {} has no screen to drive", event.machine_id);
        return;
    };
    let powered_on = if screen.is_powered_on() {
        screen.power_off();
        false
    } else {
        screen.power_on(context.now);
        true
    };
    context.events.push(SessionEvent::ScreenPower {
        at_ms: millis(context.now),
        screen: screen.id(),
        powered_on,
    });
}

/// Maps an unbounded dial angle onto [0, 1], one full turn spanning the range.
pub fn dial_level(angle: f32) -> f32 {
    (0.5 + angle / TAU).clamp(0.0, 1.0)
}

fn adjust_brightness(context: &mut ActionContext<'_>, event: &ElementEvent) {
    if let ActionValue::Angle(angle) = event.value {
        context
            .settings
            .brightness
            .insert(event.machine_id.clone(), dial_level(angle));
    }
}

fn set_volume(context: &mut ActionContext<'_>, event: &ElementEvent) {
    if let ActionValue::Angle(angle) = event.value {
        context
            .settings
            .volume
            .insert(event.machine_id.clone(), dial_level(angle));
    }
}

fn tune_band(context: &mut ActionContext<'_>, event: &ElementEvent) {
    if let ActionValue::Progress(progress) = event.value {
        context
            .settings
            .band
            .insert(event.machine_id.clone(), progress);
    }
}

fn set_equalizer_gain(context: &mut ActionContext<'_>, event: &ElementEvent) {
    if let ActionValue::Progress(progress) = event.value {
        context
            .settings
            .equalizer
            .insert(event.element_id.clone(), progress);
    }
}

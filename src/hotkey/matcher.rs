//! Hotkey combination matching and debounce
//!
//! The hotkey is Ctrl+Shift+<calibrated key>. Because left/right modifiers
//! are reported inconsistently, six combinations are accepted:
//! {ctrl_l, ctrl_r} x {shift, shift_l, shift_r}, each with the calibrated key.
//! A press event matches when at least one combination is a subset of the
//! pressed set. There is no separate exact-key path: the subset test covers it.

use std::time::{Duration, Instant};

use tracing::debug;

use super::keys::{KeyIdentifier, ModifierFamily};
use super::listener::HotkeyError;
use super::tracker::PressedKeySet;

/// Minimum interval between two accepted triggers
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// One physical rendering of Ctrl+Shift+<key>
///
/// Always holds exactly one Ctrl variant, one Shift variant and one
/// non-modifier key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combination {
    ctrl: KeyIdentifier,
    shift: KeyIdentifier,
    key: KeyIdentifier,
}

impl Combination {
    /// Build the six accepted combinations for `key`
    pub fn all_for(key: &KeyIdentifier) -> Result<Vec<Self>, HotkeyError> {
        if key.is_modifier() {
            return Err(HotkeyError::ModifierAsHotkey(key.clone()));
        }

        let shifts = ModifierFamily::Shift.members();
        let combinations = ModifierFamily::Ctrl
            .sides()
            .into_iter()
            .flat_map(|ctrl| {
                shifts.iter().map(move |shift| Self {
                    ctrl: ctrl.clone(),
                    shift: shift.clone(),
                    key: key.clone(),
                })
            })
            .collect();

        Ok(combinations)
    }

    /// Members of the combination
    pub fn members(&self) -> [&KeyIdentifier; 3] {
        [&self.ctrl, &self.shift, &self.key]
    }

    /// Check if every member is currently held
    pub fn is_subset_of(&self, pressed: &PressedKeySet) -> bool {
        self.members().iter().all(|key| pressed.contains(key))
    }
}

/// Drop-on-floor debounce
///
/// A trigger within the window of the previous accepted one is discarded,
/// never queued.
#[derive(Debug, Clone)]
pub struct Debounce {
    window: Duration,
    last_trigger: Option<Instant>,
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_trigger: None,
        }
    }

    /// Accept the trigger at `now` if the window has elapsed
    pub fn try_trigger(&mut self, now: Instant) -> bool {
        let accepted = match self.last_trigger {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.window,
        };
        if accepted {
            self.last_trigger = Some(now);
        }
        accepted
    }
}

/// Evaluates press events against the accepted combinations
#[derive(Debug, Clone)]
pub struct CombinationMatcher {
    hotkey: KeyIdentifier,
    combinations: Vec<Combination>,
    debounce: Debounce,
}

impl CombinationMatcher {
    pub fn new(hotkey: KeyIdentifier, debounce_window: Duration) -> Result<Self, HotkeyError> {
        let combinations = Combination::all_for(&hotkey)?;
        Ok(Self {
            hotkey,
            combinations,
            debounce: Debounce::new(debounce_window),
        })
    }

    /// The calibrated key this matcher listens for
    pub fn hotkey(&self) -> &KeyIdentifier {
        &self.hotkey
    }

    /// Check if any combination is fully held (no debounce)
    pub fn is_match(&self, pressed: &PressedKeySet) -> bool {
        self.combinations.iter().any(|combo| combo.is_subset_of(pressed))
    }

    /// Evaluate a press event that was just applied to `pressed`
    ///
    /// Returns true when the action should be dispatched.
    pub fn on_press(&mut self, pressed: &PressedKeySet, now: Instant) -> bool {
        if !self.is_match(pressed) {
            return false;
        }
        if self.debounce.try_trigger(now) {
            true
        } else {
            debug!(hotkey = %self.hotkey, "hotkey match dropped by debounce");
            false
        }
    }
}

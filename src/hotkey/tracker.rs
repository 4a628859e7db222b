//! Pressed-key tracking
//!
//! Maintains the set of keys currently held down from the raw press/release
//! stream. Ctrl and Shift variants also insert their canonical alias, and
//! releasing any member of a modifier family clears the whole family because
//! the OS does not reliably report which side went up.

use std::collections::HashSet;

use super::keys::{KeyIdentifier, ModifierFamily};

/// Direction of a raw key event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Pressed,
    Released,
}

/// A single raw key event from the input hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: KeyIdentifier,
    pub action: KeyAction,
}

impl KeyEvent {
    pub fn pressed(key: KeyIdentifier) -> Self {
        Self {
            key,
            action: KeyAction::Pressed,
        }
    }

    pub fn released(key: KeyIdentifier) -> Self {
        Self {
            key,
            action: KeyAction::Released,
        }
    }
}

/// Set of keys currently held down
///
/// Set semantics: a repeated press of a held key is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PressedKeySet {
    keys: HashSet<KeyIdentifier>,
}

impl PressedKeySet {
    pub fn contains(&self, key: &KeyIdentifier) -> bool {
        self.keys.contains(key)
    }

    /// Check if any variant of the family (alias or side) is held
    pub fn has_family(&self, family: ModifierFamily) -> bool {
        family.members().iter().any(|key| self.keys.contains(key))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &KeyIdentifier> {
        self.keys.iter()
    }

    fn insert(&mut self, key: KeyIdentifier) {
        self.keys.insert(key);
    }

    fn remove(&mut self, key: &KeyIdentifier) {
        self.keys.remove(key);
    }
}

/// Applies raw key events to a `PressedKeySet`
///
/// Single producer: only the thread delivering OS events may call `apply`.
#[derive(Debug, Default)]
pub struct KeyTracker {
    pressed: PressedKeySet,
}

impl KeyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current view of held keys
    pub fn pressed(&self) -> &PressedKeySet {
        &self.pressed
    }

    /// Apply one event to the pressed set
    pub fn apply(&mut self, event: &KeyEvent) {
        match event.action {
            KeyAction::Pressed => self.press(&event.key),
            KeyAction::Released => self.release(&event.key),
        }
    }

    fn press(&mut self, key: &KeyIdentifier) {
        if let Some(family) = key.modifier_family() {
            self.pressed.insert(family.canonical());
        }
        self.pressed.insert(key.clone());
    }

    fn release(&mut self, key: &KeyIdentifier) {
        self.pressed.remove(key);
        if let Some(family) = key.modifier_family() {
            for member in family.members() {
                self.pressed.remove(&member);
            }
        }
    }
}

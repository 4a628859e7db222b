//! Key identifiers and modifier families
//!
//! A `KeyIdentifier` is the opaque token the input hook reports for one
//! physical or logical key. Ctrl and Shift come in side-specific variants
//! plus a canonical alias that the tracker inserts alongside them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::calibration::escape;

/// Raw identifier names for the modifier variants
pub mod names {
    /// Canonical Ctrl alias (never reported by the OS directly)
    pub const CTRL: &str = "ctrl";
    pub const CTRL_LEFT: &str = "ctrl_l";
    pub const CTRL_RIGHT: &str = "ctrl_r";
    /// Canonical Shift alias (never reported by the OS directly)
    pub const SHIFT: &str = "shift";
    pub const SHIFT_LEFT: &str = "shift_l";
    pub const SHIFT_RIGHT: &str = "shift_r";
}

/// Identifier used when no calibration could be performed.
///
/// This is what the rdev backend reports for the key labelled "L" on a
/// US QWERTY layout.
pub const DEFAULT_HOTKEY: &str = "KeyL";

/// Opaque identifier for a single key as reported by the OS
///
/// Equality is identifier equality: `shift_l` and `shift_r` are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyIdentifier(String);

impl KeyIdentifier {
    /// Wrap a raw identifier
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The identifier used when calibration produced nothing
    pub fn default_hotkey() -> Self {
        Self::new(DEFAULT_HOTKEY)
    }

    /// Raw identifier text (may contain non-printable characters)
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Escaped form, safe to write to a file or a log line
    pub fn escaped(&self) -> String {
        escape::encode(&self.0)
    }

    /// Which modifier family this key belongs to, if any
    pub fn modifier_family(&self) -> Option<ModifierFamily> {
        match self.0.as_str() {
            names::CTRL | names::CTRL_LEFT | names::CTRL_RIGHT => Some(ModifierFamily::Ctrl),
            names::SHIFT | names::SHIFT_LEFT | names::SHIFT_RIGHT => Some(ModifierFamily::Shift),
            _ => None,
        }
    }

    /// Check if this key is a Ctrl or Shift variant
    pub fn is_modifier(&self) -> bool {
        self.modifier_family().is_some()
    }

    /// Check if the input backend can ever report this identifier
    ///
    /// Side-specific modifiers use the names in `names`; every other key is
    /// an `rdev::Key` name such as `KeyL`, `F5` or `Unknown(46)`.
    pub fn is_backend_name(&self) -> bool {
        if self.is_modifier() {
            return ModifierFamily::Ctrl.sides().contains(self)
                || ModifierFamily::Shift.sides().contains(self);
        }
        let mut chars = self.0.chars();
        chars.next().is_some_and(|first| first.is_ascii_uppercase())
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '(' || c == ')')
    }

    /// Translate an identifier into one the backend reports
    ///
    /// Backend names pass through. Single characters saved by older
    /// versions map to the key that types them: `l` and `L` to `KeyL`, the
    /// Ctrl+L control character `\u{c}` to `KeyL`, `7` to `Num7`. Anything
    /// else has no backend equivalent.
    pub fn to_backend(&self) -> Option<KeyIdentifier> {
        if self.is_backend_name() {
            return Some(self.clone());
        }

        let mut chars = self.0.chars();
        let (Some(c), None) = (chars.next(), chars.next()) else {
            return None;
        };
        let letter = match c {
            'a'..='z' | 'A'..='Z' => c.to_ascii_uppercase(),
            // Ctrl+<letter> arrives as the control code of that letter
            '\u{1}'..='\u{1a}' => char::from(b'A' + (c as u8) - 1),
            '0'..='9' => return Some(Self::new(format!("Num{c}"))),
            _ => return None,
        };
        Some(Self::new(format!("Key{letter}")))
    }
}

impl fmt::Display for KeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.escaped())
    }
}

impl From<rdev::Key> for KeyIdentifier {
    fn from(key: rdev::Key) -> Self {
        match key {
            rdev::Key::ControlLeft => Self::new(names::CTRL_LEFT),
            rdev::Key::ControlRight => Self::new(names::CTRL_RIGHT),
            rdev::Key::ShiftLeft => Self::new(names::SHIFT_LEFT),
            rdev::Key::ShiftRight => Self::new(names::SHIFT_RIGHT),
            // Layout-dependent keys keep the backend's own name, e.g. "KeyL"
            // or "Unknown(46)", so press and release map to the same token.
            other => Self::new(format!("{:?}", other)),
        }
    }
}

/// The two modifier families that make up the hotkey chord
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierFamily {
    Ctrl,
    Shift,
}

impl ModifierFamily {
    /// Canonical alias inserted next to any side-specific variant
    pub fn canonical(self) -> KeyIdentifier {
        match self {
            ModifierFamily::Ctrl => KeyIdentifier::new(names::CTRL),
            ModifierFamily::Shift => KeyIdentifier::new(names::SHIFT),
        }
    }

    /// Left and right variants
    pub fn sides(self) -> [KeyIdentifier; 2] {
        match self {
            ModifierFamily::Ctrl => [
                KeyIdentifier::new(names::CTRL_LEFT),
                KeyIdentifier::new(names::CTRL_RIGHT),
            ],
            ModifierFamily::Shift => [
                KeyIdentifier::new(names::SHIFT_LEFT),
                KeyIdentifier::new(names::SHIFT_RIGHT),
            ],
        }
    }

    /// Every identifier of the family: canonical alias first, then sides
    pub fn members(self) -> [KeyIdentifier; 3] {
        let [left, right] = self.sides();
        [self.canonical(), left, right]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_families() {
        assert_eq!(
            KeyIdentifier::new("ctrl_l").modifier_family(),
            Some(ModifierFamily::Ctrl)
        );
        assert_eq!(
            KeyIdentifier::new("shift").modifier_family(),
            Some(ModifierFamily::Shift)
        );
        assert!(!KeyIdentifier::new("KeyL").is_modifier());
        assert!(!KeyIdentifier::new("\u{c}").is_modifier());
    }

    #[test]
    fn test_sides_are_distinct_identifiers() {
        let [left, right] = ModifierFamily::Shift.sides();
        assert_ne!(left, right);
        assert_ne!(left, ModifierFamily::Shift.canonical());
    }

    #[test]
    fn test_rdev_conversion() {
        assert_eq!(KeyIdentifier::from(rdev::Key::ControlLeft).as_str(), "ctrl_l");
        assert_eq!(KeyIdentifier::from(rdev::Key::ShiftRight).as_str(), "shift_r");
        assert_eq!(KeyIdentifier::from(rdev::Key::KeyL), KeyIdentifier::default_hotkey());
        assert_eq!(KeyIdentifier::from(rdev::Key::Unknown(46)).as_str(), "Unknown(46)");
    }

    #[test]
    fn test_backend_names() {
        assert!(KeyIdentifier::new("KeyL").is_backend_name());
        assert!(KeyIdentifier::new("Unknown(46)").is_backend_name());
        assert!(KeyIdentifier::new("ctrl_l").is_backend_name());
        assert!(KeyIdentifier::from(rdev::Key::F5).is_backend_name());
        assert!(!KeyIdentifier::new("ctrl").is_backend_name());
        assert!(!KeyIdentifier::new("l").is_backend_name());
        assert!(!KeyIdentifier::new("\u{c}").is_backend_name());
        assert!(!KeyIdentifier::new("").is_backend_name());
    }

    #[test]
    fn test_legacy_characters_map_to_backend_names() {
        let backend = |raw: &str| KeyIdentifier::new(raw).to_backend();
        assert_eq!(backend("KeyL"), Some(KeyIdentifier::new("KeyL")));
        assert_eq!(backend("l"), Some(KeyIdentifier::new("KeyL")));
        assert_eq!(backend("L"), Some(KeyIdentifier::new("KeyL")));
        assert_eq!(backend("\u{c}"), Some(KeyIdentifier::new("KeyL")));
        assert_eq!(backend("\u{1}"), Some(KeyIdentifier::new("KeyA")));
        assert_eq!(backend("7"), Some(KeyIdentifier::new("Num7")));
        assert_eq!(backend("é"), None);
        assert_eq!(backend("\u{0}"), None);
        assert_eq!(backend("ll"), None);
    }

    #[test]
    fn test_display_escapes_control_characters() {
        assert_eq!(KeyIdentifier::new("\u{c}").to_string(), "\\u{c}");
        assert_eq!(KeyIdentifier::new("KeyL").to_string(), "KeyL");
    }
}

//! Symbolic Linux key names accepted by `key code` entries.
//!
//! Names are resolved through `evdev::Key`, limited to the keyboard block
//! from `KEY_ESC` up to `KEY_KPLEFTPAREN`.

use std::ops::RangeInclusive;

use evdev::Key;

/// Key codes a button region may name symbolically, and that the virtual
/// output device registers.
pub fn named_key_codes() -> RangeInclusive<u16> {
    Key::KEY_RESERVED.code()..=Key::KEY_KPLEFTPAREN.code()
}

/// Look up a symbolic key name such as `KEY_ENTER`.
pub fn key_code_by_name(name: &str) -> Option<u32> {
    if !name.starts_with("KEY_") {
        return None;
    }
    name.parse::<Key>()
        .ok()
        .map(Key::code)
        .filter(|code| named_key_codes().contains(code))
        .map(u32::from)
}

/// Accept either a decimal key code or a symbolic name.
pub fn parse_key_code(value: &str) -> Option<u32> {
    value
        .parse::<u32>()
        .ok()
        .or_else(|| key_code_by_name(value))
}

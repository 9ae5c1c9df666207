//! Screen regions ("subdivisions"), contact slots and per-slot press state.
use std::collections::HashMap;

use strum::EnumString;

/// Axis-aligned rectangle in calibrated screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub top_left_x: u32,
    pub top_left_y: u32,
    pub bottom_right_x: u32,
    pub bottom_right_y: u32,
}

impl Rect {
    pub fn new(top_left_x: u32, top_left_y: u32, bottom_right_x: u32, bottom_right_y: u32) -> Self {
        Self {
            top_left_x,
            top_left_y,
            bottom_right_x,
            bottom_right_y,
        }
    }

    pub fn width(&self) -> u32 {
        self.bottom_right_x - self.top_left_x
    }

    pub fn height(&self) -> u32 {
        self.bottom_right_y - self.top_left_y
    }

    /// Half-open containment: the top-left edge is inside, the bottom-right
    /// edge is not.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.top_left_x as f32
            && x < self.bottom_right_x as f32
            && y >= self.top_left_y as f32
            && y < self.bottom_right_y as f32
    }
}

/// Direction in which a slider grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
    #[default]
    #[strum(disabled)]
    Unknown,
}

/// Region that remaps contacts to a key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ButtonRegion {
    pub key_code: u32,
    /// Milliseconds between accepted transitions.
    pub minimum_repetition_interval: f32,
    /// Time (µs) of the last forwarded release.
    pub last_release_time: Option<u64>,
}

/// Region that turns the contact position into an axis value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SliderRegion {
    pub orientation: Orientation,
    pub minimum_value: f32,
    pub maximum_value: f32,
}

/// Region that passes contacts through.
///
/// The display offsets are parsed but not applied to forwarded coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TouchRegion {
    pub display_offset_x: u32,
    pub display_offset_y: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegionKind {
    Touch(TouchRegion),
    Button(ButtonRegion),
    Slider(SliderRegion),
}

impl RegionKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            RegionKind::Touch(_) => "touch",
            RegionKind::Button(_) => "button",
            RegionKind::Slider(_) => "slider",
        }
    }
}

/// Independent contact identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// The seat's pointer.
    Pointer,
    /// A touch point or button contact id.
    Contact(i32),
}

/// Pressed state per slot. Slots never seen are released.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PressTracker {
    pressed: HashMap<Slot, bool>,
}

impl PressTracker {
    pub fn is_pressed(&self, slot: Slot) -> bool {
        self.pressed.get(&slot).copied().unwrap_or(false)
    }

    /// Mark `slot` pressed. Returns `false` if it already was.
    pub fn press(&mut self, slot: Slot) -> bool {
        !std::mem::replace(self.pressed.entry(slot).or_insert(false), true)
    }

    /// Mark `slot` released. Returns `false` if it was not pressed.
    pub fn release(&mut self, slot: Slot) -> bool {
        self.pressed
            .get_mut(&slot)
            .is_some_and(|pressed| std::mem::replace(pressed, false))
    }

    /// Slots currently pressed.
    pub fn pressed_slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.pressed
            .iter()
            .filter(|(_, pressed)| **pressed)
            .map(|(slot, _)| *slot)
    }
}

/// A named rectangle with one behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub name: String,
    pub id: u32,
    pub rect: Rect,
    pub kind: RegionKind,
    pub presses: PressTracker,
}

impl Region {
    pub fn new(name: impl Into<String>, id: u32, rect: Rect, kind: RegionKind) -> Self {
        Self {
            name: name.into(),
            id,
            rect,
            kind,
            presses: PressTracker::default(),
        }
    }
}

/// Index of the first region, in declaration order, containing `(x, y)`.
pub fn find_region_index(regions: &[Region], x: f32, y: f32) -> Option<usize> {
    regions.iter().position(|r| r.rect.contains(x, y))
}

/// First region, in declaration order, containing `(x, y)`.
pub fn find_region(regions: &[Region], x: f32, y: f32) -> Option<&Region> {
    find_region_index(regions, x, y).map(|i| &regions[i])
}

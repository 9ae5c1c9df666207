//! Per-region contact state machines - no I/O, fully testable.
//!
//! Each region turns a contact transition into zero or more [`Action`]s
//! for the host. Press state is tracked per [`Slot`] in the region's
//! [`PressTracker`](crate::region::PressTracker).

use log::{debug, warn};

use crate::region::{ButtonRegion, Orientation, Region, RegionKind, Rect, SliderRegion, Slot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Pressed,
    Released,
}

/// Output for the host. Times are in microseconds.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Key {
        time: u64,
        code: u32,
        state: KeyState,
    },
    PointerButton {
        time: u64,
        button: u32,
        state: KeyState,
    },
    PointerMotion {
        time: u64,
        x: f32,
        y: f32,
    },
    /// Synthetic button identified by the region id.
    Button {
        time: u64,
        id: u32,
        state: KeyState,
    },
    /// Axis value identified by the region id.
    Axis {
        time: u64,
        id: u32,
        value: f32,
    },
    TouchDown {
        time: u64,
        id: i32,
        x: f32,
        y: f32,
    },
    TouchUp {
        time: u64,
        id: i32,
    },
    TouchMotion {
        time: u64,
        id: i32,
        x: f32,
        y: f32,
    },
}

/// One contact transition in calibrated coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactEvent {
    pub slot: Slot,
    /// Pointer button code; ignored for touch contacts.
    pub button: u32,
    /// Microseconds.
    pub time: u64,
    pub x: f32,
    pub y: f32,
}

impl ContactEvent {
    pub fn touch(id: i32, time: u64, x: f32, y: f32) -> Self {
        Self {
            slot: Slot::Contact(id),
            button: 0,
            time,
            x,
            y,
        }
    }

    pub fn pointer(button: u32, time: u64, x: f32, y: f32) -> Self {
        Self {
            slot: Slot::Pointer,
            button,
            time,
            x,
            y,
        }
    }
}

impl Region {
    pub fn on_down(&mut self, ev: &ContactEvent) -> Vec<Action> {
        if !self.presses.press(ev.slot) {
            return Vec::new();
        }
        let id = self.id;
        match &self.kind {
            RegionKind::Touch(_) => vec![forward_down(ev)],
            RegionKind::Button(button) => button_press(button, &self.name, ev),
            RegionKind::Slider(slider) => {
                let mut actions = vec![Action::Button {
                    time: ev.time,
                    id,
                    state: KeyState::Pressed,
                }];
                actions.extend(slider_axis(slider, &self.rect, id, &self.name, ev));
                actions
            }
        }
    }

    pub fn on_up(&mut self, ev: &ContactEvent) -> Vec<Action> {
        if !self.presses.release(ev.slot) {
            return Vec::new();
        }
        self.released(ev)
    }

    pub fn on_motion(&mut self, ev: &ContactEvent) -> Vec<Action> {
        match &self.kind {
            RegionKind::Touch(_) => vec![forward_motion(ev)],
            RegionKind::Button(_) => Vec::new(),
            RegionKind::Slider(slider) => slider_axis(slider, &self.rect, self.id, &self.name, ev)
                .into_iter()
                .collect(),
        }
    }

    /// A contact crossed into this region while down.
    pub fn on_enter(&mut self, ev: &ContactEvent) -> Vec<Action> {
        self.on_down(ev)
    }

    /// A pressed contact left this region or its grab went away.
    pub fn on_leave(&mut self, ev: &ContactEvent) -> Vec<Action> {
        if !self.presses.release(ev.slot) {
            return Vec::new();
        }
        // Pressing again tells the host the key was cancelled, not released.
        if let RegionKind::Button(button) = &self.kind {
            return vec![Action::Key {
                time: ev.time,
                code: button.key_code,
                state: KeyState::Pressed,
            }];
        }
        self.released(ev)
    }

    /// Output for a Pressed -> Released transition that already happened.
    fn released(&mut self, ev: &ContactEvent) -> Vec<Action> {
        match &mut self.kind {
            RegionKind::Touch(_) => vec![forward_up(ev)],
            RegionKind::Button(button) => button_release(button, &self.name, ev),
            RegionKind::Slider(_) => vec![Action::Button {
                time: ev.time,
                id: self.id,
                state: KeyState::Released,
            }],
        }
    }
}

// -- Touch ----------------------------------------------------

fn forward_down(ev: &ContactEvent) -> Action {
    match ev.slot {
        Slot::Pointer => Action::PointerButton {
            time: ev.time,
            button: ev.button,
            state: KeyState::Pressed,
        },
        Slot::Contact(id) => Action::TouchDown {
            time: ev.time,
            id,
            x: ev.x,
            y: ev.y,
        },
    }
}

fn forward_up(ev: &ContactEvent) -> Action {
    match ev.slot {
        Slot::Pointer => Action::PointerButton {
            time: ev.time,
            button: ev.button,
            state: KeyState::Released,
        },
        Slot::Contact(id) => Action::TouchUp { time: ev.time, id },
    }
}

fn forward_motion(ev: &ContactEvent) -> Action {
    match ev.slot {
        Slot::Pointer => Action::PointerMotion {
            time: ev.time,
            x: ev.x,
            y: ev.y,
        },
        Slot::Contact(id) => Action::TouchMotion {
            time: ev.time,
            id,
            x: ev.x,
            y: ev.y,
        },
    }
}

// -- Button ---------------------------------------------------

impl ButtonRegion {
    /// Whether the repetition window since the last release has passed.
    pub fn interval_elapsed(&self, now: u64) -> bool {
        self.last_release_time.is_none_or(|last| {
            now as f64 >= last as f64 + f64::from(self.minimum_repetition_interval) * 1000.0
        })
    }
}

/// Presses are gated by the same window as releases (DESIGN.md, decision 1);
/// the slot is marked pressed either way.
fn button_press(button: &ButtonRegion, name: &str, ev: &ContactEvent) -> Vec<Action> {
    if !button.interval_elapsed(ev.time) {
        debug!("Button '{name}': press within repetition interval suppressed");
        return Vec::new();
    }
    vec![Action::Key {
        time: ev.time,
        code: button.key_code,
        state: KeyState::Pressed,
    }]
}

fn button_release(button: &mut ButtonRegion, name: &str, ev: &ContactEvent) -> Vec<Action> {
    if !button.interval_elapsed(ev.time) {
        debug!("Button '{name}': release within repetition interval suppressed");
        return Vec::new();
    }
    button.last_release_time = Some(ev.time);
    vec![Action::Key {
        time: ev.time,
        code: button.key_code,
        state: KeyState::Released,
    }]
}

// -- Slider ---------------------------------------------------

/// Axis value for a position inside `rect`.
///
/// The range is `[0, maximum - minimum]`; the minimum is not added back.
pub fn slider_value(slider: &SliderRegion, rect: &Rect, x: f32, y: f32) -> Option<f32> {
    let position = match slider.orientation {
        Orientation::Horizontal => {
            (x - rect.top_left_x as f32) / (rect.bottom_right_x as f32 - rect.top_left_x as f32)
        }
        Orientation::Vertical => {
            1.0 - (y - rect.top_left_y as f32)
                / (rect.bottom_right_y as f32 - rect.top_left_y as f32)
        }
        Orientation::Unknown => return None,
    };
    Some(position * (slider.maximum_value - slider.minimum_value))
}

fn slider_axis(
    slider: &SliderRegion,
    rect: &Rect,
    id: u32,
    name: &str,
    ev: &ContactEvent,
) -> Option<Action> {
    let Some(value) = slider_value(slider, rect, ev.x, ev.y) else {
        warn!("Slider '{name}' has no orientation, not emitting an axis value");
        return None;
    };
    Some(Action::Axis {
        time: ev.time,
        id,
        value,
    })
}

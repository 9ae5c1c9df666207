//! evdev event classification and frame assembly - no I/O, fully testable.
//!
//! Raw kernel events are classified into [`DeviceEvent`]s and buffered by a
//! [`FrameAssembler`] until `SYN_REPORT`, which turns each complete frame
//! into the pointer, key and touch [`HostEvent`]s the router consumes.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use evdev::Key;

use crate::behavior::KeyState;

// -- DeviceEvent ----------------------------------------------

/// Intermediate representation of a relevant evdev event,
/// decoupled from `evdev` types for testability.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Slot(i32),
    TrackingId(i32),
    FingerUp,
    MtPositionX(i32),
    MtPositionY(i32),
    PositionX(i32),
    PositionY(i32),
    /// `BTN_TOUCH`, the contact state of single-touch devices.
    Touch(KeyState),
    Button { code: u32, state: KeyState },
    Key { code: u32, state: KeyState },
    SynReport,
}

/// Event for the router, in raw device coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    PointerMotion { x: f32, y: f32 },
    PointerButton { button: u32, state: KeyState },
    Key { code: u32, state: KeyState },
    TouchDown { id: i32, x: f32, y: f32 },
    TouchMotion { id: i32, x: f32, y: f32 },
    TouchUp { id: i32 },
}

/// Classify a single `evdev::InputEvent`. Returns `None` for irrelevant
/// events, including key auto-repeat.
pub fn classify_event(event: &evdev::InputEvent) -> Option<DeviceEvent> {
    use evdev::{AbsoluteAxisType, InputEventKind};

    match event.kind() {
        InputEventKind::AbsAxis(axis) => match axis {
            AbsoluteAxisType::ABS_MT_SLOT => Some(DeviceEvent::Slot(event.value())),
            AbsoluteAxisType::ABS_MT_TRACKING_ID => {
                if event.value() == -1 {
                    Some(DeviceEvent::FingerUp)
                } else {
                    Some(DeviceEvent::TrackingId(event.value()))
                }
            }
            AbsoluteAxisType::ABS_MT_POSITION_X => Some(DeviceEvent::MtPositionX(event.value())),
            AbsoluteAxisType::ABS_MT_POSITION_Y => Some(DeviceEvent::MtPositionY(event.value())),
            AbsoluteAxisType::ABS_X => Some(DeviceEvent::PositionX(event.value())),
            AbsoluteAxisType::ABS_Y => Some(DeviceEvent::PositionY(event.value())),
            _ => None,
        },
        InputEventKind::Key(key) => {
            let state = match event.value() {
                0 => KeyState::Released,
                1 => KeyState::Pressed,
                _ => return None,
            };
            let code = key.code();
            match key {
                Key::BTN_TOUCH => Some(DeviceEvent::Touch(state)),
                _ if (Key::BTN_LEFT.code()..=Key::BTN_TASK.code()).contains(&code) => {
                    Some(DeviceEvent::Button {
                        code: code.into(),
                        state,
                    })
                }
                _ if code < Key::BTN_0.code() => Some(DeviceEvent::Key {
                    code: code.into(),
                    state,
                }),
                _ => None,
            }
        }
        InputEventKind::Synchronization(evdev::Synchronization::SYN_REPORT) => {
            Some(DeviceEvent::SynReport)
        }
        _ => None,
    }
}

/// Event timestamp in microseconds since the epoch.
pub fn timestamp_micros(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or_default()
}

// -- FrameAssembler -------------------------------------------

#[derive(Debug, Default)]
struct MtSlot {
    active: bool,
    x: i32,
    y: i32,
    moved: bool,
    /// The contact that was down at the start of the frame ended.
    up_pending: bool,
    down_pending: bool,
    /// The contact that began in this frame also ended in it.
    up_after_down: bool,
}

/// Buffers one device's events until `SYN_REPORT`.
///
/// Multi-touch devices report contacts through type-B slots; the slot index
/// is used as the touch id. Single-touch devices (`ABS_X`/`ABS_Y` with
/// `BTN_TOUCH`) are reported as a pointer with `BTN_LEFT`.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    multitouch: bool,
    current_slot: i32,
    slots: BTreeMap<i32, MtSlot>,
    pointer: (i32, i32),
    pointer_moved: bool,
    pending: Vec<HostEvent>,
}

impl FrameAssembler {
    pub fn new(multitouch: bool) -> Self {
        Self {
            multitouch,
            ..Default::default()
        }
    }

    fn slot(&mut self) -> &mut MtSlot {
        self.slots.entry(self.current_slot).or_default()
    }

    /// Feed one event. Returns the frame's events on `SYN_REPORT`, otherwise
    /// nothing.
    pub fn feed(&mut self, event: DeviceEvent) -> Vec<HostEvent> {
        match event {
            DeviceEvent::Slot(slot) => self.current_slot = slot,
            DeviceEvent::TrackingId(_) => {
                let slot = self.slot();
                if !slot.active {
                    slot.active = true;
                    slot.down_pending = true;
                    slot.up_after_down = false;
                }
            }
            DeviceEvent::FingerUp => {
                let slot = self.slot();
                if slot.active {
                    slot.active = false;
                    if slot.down_pending {
                        slot.up_after_down = true;
                    } else {
                        slot.up_pending = true;
                    }
                }
            }
            DeviceEvent::MtPositionX(x) => {
                let slot = self.slot();
                slot.x = x;
                slot.moved = true;
            }
            DeviceEvent::MtPositionY(y) => {
                let slot = self.slot();
                slot.y = y;
                slot.moved = true;
            }
            DeviceEvent::PositionX(x) if !self.multitouch => {
                self.pointer.0 = x;
                self.pointer_moved = true;
            }
            DeviceEvent::PositionY(y) if !self.multitouch => {
                self.pointer.1 = y;
                self.pointer_moved = true;
            }
            DeviceEvent::PositionX(_) | DeviceEvent::PositionY(_) => {}
            DeviceEvent::Touch(state) => {
                if !self.multitouch {
                    self.pending.push(HostEvent::PointerButton {
                        button: Key::BTN_LEFT.code().into(),
                        state,
                    });
                }
            }
            DeviceEvent::Button { code, state } => {
                self.pending.push(HostEvent::PointerButton {
                    button: code,
                    state,
                });
            }
            DeviceEvent::Key { code, state } => {
                self.pending.push(HostEvent::Key { code, state });
            }
            DeviceEvent::SynReport => return self.flush(),
        }
        Vec::new()
    }

    fn flush(&mut self) -> Vec<HostEvent> {
        let mut frame = Vec::new();

        // Motion first so a button in the same frame sees the new position.
        if std::mem::take(&mut self.pointer_moved) {
            frame.push(HostEvent::PointerMotion {
                x: self.pointer.0 as f32,
                y: self.pointer.1 as f32,
            });
        }
        frame.append(&mut self.pending);

        // A slot lifted and reused in one frame ends the old contact first.
        for (&id, slot) in &mut self.slots {
            let (x, y) = (slot.x as f32, slot.y as f32);
            if std::mem::take(&mut slot.up_pending) {
                frame.push(HostEvent::TouchUp { id });
            }
            if std::mem::take(&mut slot.down_pending) {
                frame.push(HostEvent::TouchDown { id, x, y });
            } else if slot.active && slot.moved {
                frame.push(HostEvent::TouchMotion { id, x, y });
            }
            slot.moved = false;
            if std::mem::take(&mut slot.up_after_down) {
                frame.push(HostEvent::TouchUp { id });
            }
        }
        frame
    }

    /// Number of contacts currently down.
    pub fn active_contacts(&self) -> usize {
        self.slots.values().filter(|s| s.active).count()
    }
}

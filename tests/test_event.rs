//! Integration tests for the event-processing logic in `event`.
//!
//! Frames are assembled from `DeviceEvent`s directly (no hardware), and
//! `classify_event` is checked with synthetic `evdev::InputEvent`s.
use std::time::{Duration, UNIX_EPOCH};

use evdev::{AbsoluteAxisType, EventType, InputEvent, Key, Synchronization};

use inputcal::behavior::KeyState;
use inputcal::event::{DeviceEvent, FrameAssembler, HostEvent, classify_event, timestamp_micros};

// -- Helpers --------------------------------------------------

fn abs(axis: AbsoluteAxisType, value: i32) -> InputEvent {
    InputEvent::new(EventType::ABSOLUTE, axis.0, value)
}

fn key(code: Key, value: i32) -> InputEvent {
    InputEvent::new(EventType::KEY, code.code(), value)
}

/// Feed events, returning everything emitted along the way.
fn feed(assembler: &mut FrameAssembler, events: &[DeviceEvent]) -> Vec<HostEvent> {
    events
        .iter()
        .flat_map(|e| assembler.feed(e.clone()))
        .collect()
}

fn finger_down(slot: i32, x: i32, y: i32) -> Vec<DeviceEvent> {
    vec![
        DeviceEvent::Slot(slot),
        DeviceEvent::TrackingId(100 + slot),
        DeviceEvent::MtPositionX(x),
        DeviceEvent::MtPositionY(y),
    ]
}

// -- classify_event -------------------------------------------

#[test]
fn test_classify_multitouch_axes() {
    assert_eq!(
        classify_event(&abs(AbsoluteAxisType::ABS_MT_SLOT, 2)),
        Some(DeviceEvent::Slot(2))
    );
    assert_eq!(
        classify_event(&abs(AbsoluteAxisType::ABS_MT_TRACKING_ID, 17)),
        Some(DeviceEvent::TrackingId(17))
    );
    assert_eq!(
        classify_event(&abs(AbsoluteAxisType::ABS_MT_TRACKING_ID, -1)),
        Some(DeviceEvent::FingerUp)
    );
    assert_eq!(
        classify_event(&abs(AbsoluteAxisType::ABS_MT_POSITION_X, 320)),
        Some(DeviceEvent::MtPositionX(320))
    );
    assert_eq!(
        classify_event(&abs(AbsoluteAxisType::ABS_MT_POSITION_Y, 240)),
        Some(DeviceEvent::MtPositionY(240))
    );
}

#[test]
fn test_classify_single_touch_axes() {
    assert_eq!(
        classify_event(&abs(AbsoluteAxisType::ABS_X, 5)),
        Some(DeviceEvent::PositionX(5))
    );
    assert_eq!(
        classify_event(&abs(AbsoluteAxisType::ABS_Y, 6)),
        Some(DeviceEvent::PositionY(6))
    );
}

#[test]
fn test_classify_ignores_other_axes() {
    assert_eq!(classify_event(&abs(AbsoluteAxisType::ABS_PRESSURE, 80)), None);
    assert_eq!(
        classify_event(&abs(AbsoluteAxisType::ABS_MT_TOUCH_MAJOR, 3)),
        None
    );
}

#[test]
fn test_classify_touch_button() {
    assert_eq!(
        classify_event(&key(Key::BTN_TOUCH, 1)),
        Some(DeviceEvent::Touch(KeyState::Pressed))
    );
    assert_eq!(
        classify_event(&key(Key::BTN_TOUCH, 0)),
        Some(DeviceEvent::Touch(KeyState::Released))
    );
}

#[test]
fn test_classify_pointer_buttons() {
    assert_eq!(
        classify_event(&key(Key::BTN_LEFT, 1)),
        Some(DeviceEvent::Button {
            code: 0x110,
            state: KeyState::Pressed
        })
    );
    assert_eq!(
        classify_event(&key(Key::BTN_RIGHT, 0)),
        Some(DeviceEvent::Button {
            code: 0x111,
            state: KeyState::Released
        })
    );
}

#[test]
fn test_classify_pointer_button_range_edges() {
    assert_eq!(
        classify_event(&key(Key::BTN_TASK, 1)),
        Some(DeviceEvent::Button {
            code: 0x117,
            state: KeyState::Pressed
        })
    );
    assert_eq!(classify_event(&key(Key::BTN_0, 1)), None);
    assert_eq!(classify_event(&key(Key::BTN_TRIGGER_HAPPY1, 1)), None);
}

#[test]
fn test_classify_keys() {
    assert_eq!(
        classify_event(&key(Key::KEY_A, 1)),
        Some(DeviceEvent::Key {
            code: 30,
            state: KeyState::Pressed
        })
    );
}

#[test]
fn test_classify_ignores_autorepeat() {
    assert_eq!(classify_event(&key(Key::KEY_A, 2)), None);
}

#[test]
fn test_classify_ignores_tool_buttons() {
    assert_eq!(classify_event(&key(Key::BTN_TOOL_FINGER, 1)), None);
    assert_eq!(classify_event(&key(Key::BTN_STYLUS, 1)), None);
}

#[test]
fn test_classify_syn_report() {
    let syn = InputEvent::new(EventType::SYNCHRONIZATION, Synchronization::SYN_REPORT.0, 0);
    assert_eq!(classify_event(&syn), Some(DeviceEvent::SynReport));

    let dropped = InputEvent::new(
        EventType::SYNCHRONIZATION,
        Synchronization::SYN_DROPPED.0,
        0,
    );
    assert_eq!(classify_event(&dropped), None);
}

#[test]
fn test_classify_ignores_relative_motion() {
    let rel = InputEvent::new(EventType::RELATIVE, 0, 4);
    assert_eq!(classify_event(&rel), None);
}

#[test]
fn test_timestamp_micros() {
    let t = UNIX_EPOCH + Duration::from_micros(1_234_567);
    assert_eq!(timestamp_micros(t), 1_234_567);
    assert_eq!(timestamp_micros(UNIX_EPOCH - Duration::from_secs(1)), 0);
}

// -- FrameAssembler: multi-touch ------------------------------

#[test]
fn test_nothing_before_syn_report() {
    let mut asm = FrameAssembler::new(true);
    assert!(feed(&mut asm, &finger_down(0, 10, 20)).is_empty());
    assert_eq!(asm.active_contacts(), 1);
}

#[test]
fn test_finger_down_move_up() {
    let mut asm = FrameAssembler::new(true);
    let mut events = finger_down(0, 10, 20);
    events.push(DeviceEvent::SynReport);
    events.extend([DeviceEvent::MtPositionX(15), DeviceEvent::SynReport]);
    events.extend([DeviceEvent::FingerUp, DeviceEvent::SynReport]);

    assert_eq!(
        feed(&mut asm, &events),
        vec![
            HostEvent::TouchDown {
                id: 0,
                x: 10.0,
                y: 20.0
            },
            HostEvent::TouchMotion {
                id: 0,
                x: 15.0,
                y: 20.0
            },
            HostEvent::TouchUp { id: 0 },
        ]
    );
    assert_eq!(asm.active_contacts(), 0);
}

#[test]
fn test_two_fingers_in_slot_order() {
    let mut asm = FrameAssembler::new(true);
    let mut events = finger_down(1, 300, 300);
    events.extend(finger_down(0, 100, 100));
    events.push(DeviceEvent::SynReport);

    assert_eq!(
        feed(&mut asm, &events),
        vec![
            HostEvent::TouchDown {
                id: 0,
                x: 100.0,
                y: 100.0
            },
            HostEvent::TouchDown {
                id: 1,
                x: 300.0,
                y: 300.0
            },
        ]
    );
    assert_eq!(asm.active_contacts(), 2);
}

#[test]
fn test_only_moved_slots_report_motion() {
    let mut asm = FrameAssembler::new(true);
    let mut events = finger_down(0, 0, 0);
    events.extend(finger_down(1, 50, 50));
    events.push(DeviceEvent::SynReport);
    feed(&mut asm, &events);

    let frame = feed(
        &mut asm,
        &[
            DeviceEvent::Slot(1),
            DeviceEvent::MtPositionY(60),
            DeviceEvent::SynReport,
        ],
    );
    assert_eq!(
        frame,
        vec![HostEvent::TouchMotion {
            id: 1,
            x: 50.0,
            y: 60.0
        }]
    );
}

#[test]
fn test_tap_within_one_frame() {
    let mut asm = FrameAssembler::new(true);
    let mut events = finger_down(0, 7, 8);
    events.extend([DeviceEvent::FingerUp, DeviceEvent::SynReport]);

    assert_eq!(
        feed(&mut asm, &events),
        vec![
            HostEvent::TouchDown {
                id: 0,
                x: 7.0,
                y: 8.0
            },
            HostEvent::TouchUp { id: 0 },
        ]
    );
}

#[test]
fn test_slot_reused_within_one_frame_lifts_first() {
    let mut asm = FrameAssembler::new(true);
    let mut events = finger_down(0, 1, 1);
    events.push(DeviceEvent::SynReport);
    feed(&mut asm, &events);

    let frame = feed(
        &mut asm,
        &[
            DeviceEvent::FingerUp,
            DeviceEvent::TrackingId(2),
            DeviceEvent::MtPositionX(5),
            DeviceEvent::MtPositionY(5),
            DeviceEvent::SynReport,
        ],
    );
    assert_eq!(
        frame,
        vec![
            HostEvent::TouchUp { id: 0 },
            HostEvent::TouchDown {
                id: 0,
                x: 5.0,
                y: 5.0
            },
        ]
    );
    assert_eq!(asm.active_contacts(), 1);
}

#[test]
fn test_tap_then_reuse_within_one_frame_stays_down() {
    let mut asm = FrameAssembler::new(true);
    let mut events = finger_down(0, 3, 4);
    events.extend([
        DeviceEvent::FingerUp,
        DeviceEvent::TrackingId(9),
        DeviceEvent::SynReport,
    ]);

    assert_eq!(
        feed(&mut asm, &events),
        vec![HostEvent::TouchDown {
            id: 0,
            x: 3.0,
            y: 4.0
        }]
    );
    assert_eq!(asm.active_contacts(), 1);
}

#[test]
fn test_finger_up_without_contact_is_ignored() {
    let mut asm = FrameAssembler::new(true);
    assert!(feed(&mut asm, &[DeviceEvent::FingerUp, DeviceEvent::SynReport]).is_empty());
}

#[test]
fn test_multitouch_ignores_legacy_axes() {
    let mut asm = FrameAssembler::new(true);
    let frame = feed(
        &mut asm,
        &[
            DeviceEvent::PositionX(5),
            DeviceEvent::PositionY(6),
            DeviceEvent::Touch(KeyState::Pressed),
            DeviceEvent::SynReport,
        ],
    );
    assert!(frame.is_empty());
}

// -- FrameAssembler: single-touch and buttons -----------------

#[test]
fn test_single_touch_is_pointer() {
    let mut asm = FrameAssembler::new(false);
    let frame = feed(
        &mut asm,
        &[
            DeviceEvent::Touch(KeyState::Pressed),
            DeviceEvent::PositionX(40),
            DeviceEvent::PositionY(50),
            DeviceEvent::SynReport,
        ],
    );
    assert_eq!(
        frame,
        vec![
            HostEvent::PointerMotion { x: 40.0, y: 50.0 },
            HostEvent::PointerButton {
                button: u32::from(Key::BTN_LEFT.code()),
                state: KeyState::Pressed
            },
        ]
    );

    let frame = feed(
        &mut asm,
        &[DeviceEvent::Touch(KeyState::Released), DeviceEvent::SynReport],
    );
    assert_eq!(
        frame,
        vec![HostEvent::PointerButton {
            button: u32::from(Key::BTN_LEFT.code()),
            state: KeyState::Released
        }]
    );
}

#[test]
fn test_single_axis_update_keeps_other_coordinate() {
    let mut asm = FrameAssembler::new(false);
    feed(
        &mut asm,
        &[
            DeviceEvent::PositionX(1),
            DeviceEvent::PositionY(2),
            DeviceEvent::SynReport,
        ],
    );
    let frame = feed(&mut asm, &[DeviceEvent::PositionY(9), DeviceEvent::SynReport]);
    assert_eq!(frame, vec![HostEvent::PointerMotion { x: 1.0, y: 9.0 }]);
}

#[test]
fn test_keys_and_buttons_keep_order() {
    let mut asm = FrameAssembler::new(true);
    let frame = feed(
        &mut asm,
        &[
            DeviceEvent::Key {
                code: 30,
                state: KeyState::Pressed,
            },
            DeviceEvent::Button {
                code: 0x111,
                state: KeyState::Pressed,
            },
            DeviceEvent::SynReport,
        ],
    );
    assert_eq!(
        frame,
        vec![
            HostEvent::Key {
                code: 30,
                state: KeyState::Pressed
            },
            HostEvent::PointerButton {
                button: 0x111,
                state: KeyState::Pressed
            },
        ]
    );
}

#[test]
fn test_empty_frame() {
    let mut asm = FrameAssembler::new(true);
    assert!(asm.feed(DeviceEvent::SynReport).is_empty());
}

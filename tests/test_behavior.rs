//! Tests for `inputcal::behavior` - the touch, button and slider state
//! machines, driven directly with `ContactEvent`s.

use inputcal::behavior::{Action, ContactEvent, KeyState, slider_value};
use inputcal::region::{
    ButtonRegion, Orientation, Rect, Region, RegionKind, SliderRegion, Slot, TouchRegion,
};

// ── Helpers ──────────────────────────────────────────────────

const BTN_LEFT: u32 = 0x110;
const KEY_A: u32 = 30;
/// 250 ms in microseconds.
const WINDOW: u64 = 250_000;

fn touch_region() -> Region {
    Region::new(
        "display",
        3,
        Rect::new(0, 0, 800, 480),
        RegionKind::Touch(TouchRegion::default()),
    )
}

fn button_region(interval_ms: f32) -> Region {
    Region::new(
        "a",
        1,
        Rect::new(0, 0, 100, 100),
        RegionKind::Button(ButtonRegion {
            key_code: KEY_A,
            minimum_repetition_interval: interval_ms,
            last_release_time: None,
        }),
    )
}

fn slider_region(orientation: Orientation, rect: Rect, min: f32, max: f32) -> Region {
    Region::new(
        "fan",
        2,
        rect,
        RegionKind::Slider(SliderRegion {
            orientation,
            minimum_value: min,
            maximum_value: max,
        }),
    )
}

fn key(time: u64, state: KeyState) -> Action {
    Action::Key {
        time,
        code: KEY_A,
        state,
    }
}

fn at(time: u64) -> ContactEvent {
    ContactEvent::touch(0, time, 50.0, 50.0)
}

fn last_release(region: &Region) -> Option<u64> {
    match &region.kind {
        RegionKind::Button(b) => b.last_release_time,
        _ => None,
    }
}

// ── Touch ────────────────────────────────────────────────────

#[test]
fn test_touch_contact_is_forwarded() {
    let mut region = touch_region();
    let down = ContactEvent::touch(4, 10, 12.5, 30.0);
    let moved = ContactEvent::touch(4, 20, 14.0, 31.0);

    assert_eq!(
        region.on_down(&down),
        vec![Action::TouchDown {
            time: 10,
            id: 4,
            x: 12.5,
            y: 30.0
        }]
    );
    assert_eq!(
        region.on_motion(&moved),
        vec![Action::TouchMotion {
            time: 20,
            id: 4,
            x: 14.0,
            y: 31.0
        }]
    );
    assert_eq!(
        region.on_up(&ContactEvent::touch(4, 30, 14.0, 31.0)),
        vec![Action::TouchUp { time: 30, id: 4 }]
    );
}

#[test]
fn test_touch_pointer_is_forwarded_as_pointer() {
    let mut region = touch_region();
    let ev = ContactEvent::pointer(BTN_LEFT, 5, 1.0, 2.0);

    assert_eq!(
        region.on_down(&ev),
        vec![Action::PointerButton {
            time: 5,
            button: BTN_LEFT,
            state: KeyState::Pressed
        }]
    );
    assert_eq!(
        region.on_motion(&ev),
        vec![Action::PointerMotion {
            time: 5,
            x: 1.0,
            y: 2.0
        }]
    );
    assert_eq!(
        region.on_up(&ev),
        vec![Action::PointerButton {
            time: 5,
            button: BTN_LEFT,
            state: KeyState::Released
        }]
    );
}

#[test]
fn test_touch_motion_while_released_is_forwarded() {
    let mut region = touch_region();
    assert_eq!(region.on_motion(&at(1)).len(), 1);
}

#[test]
fn test_touch_leave_releases() {
    let mut region = touch_region();
    region.on_down(&at(1));
    assert_eq!(
        region.on_leave(&at(2)),
        vec![Action::TouchUp { time: 2, id: 0 }]
    );
    assert!(!region.presses.is_pressed(Slot::Contact(0)));
}

#[test]
fn test_enter_behaves_like_down() {
    let mut region = touch_region();
    let actions = region.on_enter(&at(7));
    assert!(matches!(
        actions.as_slice(),
        [Action::TouchDown { time: 7, .. }]
    ));
    assert!(region.presses.is_pressed(Slot::Contact(0)));
}

// ── Press state ──────────────────────────────────────────────

#[test]
fn test_down_is_idempotent() {
    let mut region = touch_region();
    assert_eq!(region.on_down(&at(1)).len(), 1);
    assert!(region.on_down(&at(2)).is_empty());
}

#[test]
fn test_up_without_down_is_ignored() {
    let mut region = button_region(0.0);
    assert!(region.on_up(&at(1)).is_empty());
    assert_eq!(last_release(&region), None);
}

#[test]
fn test_leave_without_down_is_ignored() {
    let mut region = button_region(0.0);
    assert!(region.on_leave(&at(1)).is_empty());
}

#[test]
fn test_slots_are_tracked_independently() {
    let mut region = touch_region();
    region.on_down(&ContactEvent::touch(0, 1, 1.0, 1.0));
    assert_eq!(region.on_down(&ContactEvent::touch(1, 2, 2.0, 2.0)).len(), 1);
    assert_eq!(region.on_down(&ContactEvent::pointer(BTN_LEFT, 3, 3.0, 3.0)).len(), 1);
    assert_eq!(region.on_up(&ContactEvent::touch(0, 4, 1.0, 1.0)).len(), 1);
    assert!(region.presses.is_pressed(Slot::Contact(1)));
    assert!(region.presses.is_pressed(Slot::Pointer));
}

// ── Button ───────────────────────────────────────────────────

#[test]
fn test_button_press_and_release() {
    let mut region = button_region(0.0);
    assert_eq!(region.on_down(&at(100)), vec![key(100, KeyState::Pressed)]);
    assert_eq!(region.on_up(&at(200)), vec![key(200, KeyState::Released)]);
    assert_eq!(last_release(&region), Some(200));
}

#[test]
fn test_button_ignores_motion() {
    let mut region = button_region(0.0);
    region.on_down(&at(1));
    assert!(region.on_motion(&at(2)).is_empty());
}

#[test]
fn test_button_debounce_window() {
    let mut region = button_region(250.0);

    assert_eq!(region.on_down(&at(0)), vec![key(0, KeyState::Pressed)]);
    assert_eq!(region.on_up(&at(100_000)), vec![key(100_000, KeyState::Released)]);

    // Inside the window both edges are swallowed.
    assert!(region.on_down(&at(200_000)).is_empty());
    assert!(region.on_up(&at(300_000)).is_empty());
    assert_eq!(last_release(&region), Some(100_000));
    assert!(!region.presses.is_pressed(Slot::Contact(0)));

    // Exactly at the window boundary the press goes through.
    let boundary = 100_000 + WINDOW;
    assert_eq!(
        region.on_down(&at(boundary)),
        vec![key(boundary, KeyState::Pressed)]
    );
}

#[test]
fn test_suppressed_press_still_marks_slot_pressed() {
    let mut region = button_region(250.0);
    region.on_down(&at(0));
    region.on_up(&at(10));
    assert!(region.on_down(&at(20)).is_empty());
    assert!(region.presses.is_pressed(Slot::Contact(0)));
}

#[test]
fn test_interval_elapsed() {
    let mut button = ButtonRegion {
        key_code: KEY_A,
        minimum_repetition_interval: 1.5,
        last_release_time: None,
    };
    assert!(button.interval_elapsed(0));

    button.last_release_time = Some(1_000);
    assert!(!button.interval_elapsed(2_499));
    assert!(button.interval_elapsed(2_500));
}

#[test]
fn test_button_leave_sends_cancel_press() {
    let mut region = button_region(0.0);
    region.on_down(&at(1));

    assert_eq!(region.on_leave(&at(2)), vec![key(2, KeyState::Pressed)]);
    assert!(!region.presses.is_pressed(Slot::Contact(0)));
    assert_eq!(last_release(&region), None);

    // The slot is released, so a later up does nothing.
    assert!(region.on_up(&at(3)).is_empty());
}

#[test]
fn test_button_leave_ignores_debounce() {
    let mut region = button_region(1000.0);
    region.on_down(&at(0));
    region.on_up(&at(1));
    region.on_down(&at(2));
    assert_eq!(region.on_leave(&at(3)), vec![key(3, KeyState::Pressed)]);
}

// ── Slider ───────────────────────────────────────────────────

#[test]
fn test_slider_down_presses_and_reports_value() {
    let mut region = slider_region(
        Orientation::Horizontal,
        Rect::new(100, 0, 300, 100),
        0.0,
        10.0,
    );
    let ev = ContactEvent::touch(0, 9, 200.0, 50.0);
    assert_eq!(
        region.on_down(&ev),
        vec![
            Action::Button {
                time: 9,
                id: 2,
                state: KeyState::Pressed
            },
            Action::Axis {
                time: 9,
                id: 2,
                value: 5.0
            },
        ]
    );
}

#[test]
fn test_slider_motion_reports_value() {
    let mut region = slider_region(
        Orientation::Horizontal,
        Rect::new(100, 0, 300, 100),
        0.0,
        10.0,
    );
    region.on_down(&ContactEvent::touch(0, 1, 100.0, 50.0));
    assert_eq!(
        region.on_motion(&ContactEvent::touch(0, 2, 150.0, 50.0)),
        vec![Action::Axis {
            time: 2,
            id: 2,
            value: 2.5
        }]
    );
}

#[test]
fn test_slider_up_and_leave_release_button() {
    let mut region = slider_region(
        Orientation::Horizontal,
        Rect::new(0, 0, 100, 10),
        0.0,
        1.0,
    );
    let released = |time| {
        vec![Action::Button {
            time,
            id: 2,
            state: KeyState::Released,
        }]
    };

    region.on_down(&at(1));
    assert_eq!(region.on_up(&at(2)), released(2));
    region.on_down(&at(3));
    assert_eq!(region.on_leave(&at(4)), released(4));
}

#[test]
fn test_vertical_slider_grows_upwards() {
    let slider = SliderRegion {
        orientation: Orientation::Vertical,
        minimum_value: 0.0,
        maximum_value: 100.0,
    };
    let rect = Rect::new(0, 0, 20, 100);
    assert_eq!(slider_value(&slider, &rect, 10.0, 25.0), Some(75.0));
    assert_eq!(slider_value(&slider, &rect, 10.0, 0.0), Some(100.0));
    assert_eq!(slider_value(&slider, &rect, 10.0, 100.0), Some(0.0));
}

#[test]
fn test_slider_value_omits_minimum_offset() {
    let slider = SliderRegion {
        orientation: Orientation::Horizontal,
        minimum_value: 10.0,
        maximum_value: 20.0,
    };
    let rect = Rect::new(0, 0, 100, 10);
    assert_eq!(slider_value(&slider, &rect, 50.0, 5.0), Some(5.0));
}

#[test]
fn test_unknown_orientation_emits_no_axis() {
    let mut region = slider_region(Orientation::Unknown, Rect::new(0, 0, 100, 100), 0.0, 1.0);
    assert_eq!(
        region.on_down(&at(1)),
        vec![Action::Button {
            time: 1,
            id: 2,
            state: KeyState::Pressed
        }]
    );
    assert!(region.on_motion(&at(2)).is_empty());
}

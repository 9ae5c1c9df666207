//! Routing of host input events through calibration, region lookup and
//! region behavior.
//!
//! [`RoutingHandle`] is created once and passed to every host callback. It
//! owns the parsed [`ConfigModel`] and one [`SeatRoutingContext`] per seat.
//! Without a config, or for devices that have no grab installed, events are
//! forwarded unchanged.

use std::collections::HashMap;
use std::path::Path;

use log::{debug, error, info, trace, warn};
use thiserror::Error;

use crate::behavior::{Action, ContactEvent, KeyState};
use crate::config::{ConfigModel, parse_config_file};
use crate::event::HostEvent;
use crate::region::find_region_index;

pub type SeatId = u32;

/// What the routing core needs from the host.
pub trait InputHost {
    /// Convert global coordinates to the focused surface's coordinates.
    fn to_surface_local(&self, x: f32, y: f32) -> (f32, f32) {
        (x, y)
    }

    fn emit(&mut self, action: Action);
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoutingError {
    #[error("no region contains ({x}, {y})")]
    NoRegion { x: f32, y: f32 },
}

/// Input devices currently present on a seat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeatCapabilities {
    pub pointer: bool,
    pub keyboard: bool,
    pub touch: bool,
}

#[derive(Debug, Default)]
struct PointerGrab {
    x: f32,
    y: f32,
    origin: (f32, f32),
    buttons_down: u32,
    button: u32,
    last_time: u64,
    pressed_region: Option<usize>,
}

#[derive(Debug)]
struct TouchContact {
    x: f32,
    y: f32,
    last_time: u64,
    region: Option<usize>,
}

#[derive(Debug, Default)]
struct TouchGrab {
    contacts: HashMap<i32, TouchContact>,
}

/// Per-seat grab state.
#[derive(Debug, Default)]
pub struct SeatRoutingContext {
    pointer: Option<PointerGrab>,
    keyboard: bool,
    touch: Option<TouchGrab>,
}

impl SeatRoutingContext {
    pub fn capabilities(&self) -> SeatCapabilities {
        SeatCapabilities {
            pointer: self.pointer.is_some(),
            keyboard: self.keyboard,
            touch: self.touch.is_some(),
        }
    }

    /// Number of touch points currently held on this seat.
    pub fn active_touches(&self) -> usize {
        self.touch.as_ref().map_or(0, |t| t.contacts.len())
    }
}

/// Transform raw coordinates and find the region containing them.
///
/// Returns the region index together with the calibrated coordinates.
pub fn locate(config: &ConfigModel, x: f32, y: f32) -> Result<(usize, f32, f32), RoutingError> {
    let (cx, cy) = config.calibration.apply(x, y);
    find_region_index(&config.regions, cx, cy)
        .map(|index| (index, cx, cy))
        .ok_or(RoutingError::NoRegion { x: cx, y: cy })
}

fn to_surface_local(host: &dyn InputHost, action: Action) -> Action {
    match action {
        Action::PointerMotion { time, x, y } => {
            let (x, y) = host.to_surface_local(x, y);
            Action::PointerMotion { time, x, y }
        }
        Action::TouchDown { time, id, x, y } => {
            let (x, y) = host.to_surface_local(x, y);
            Action::TouchDown { time, id, x, y }
        }
        Action::TouchMotion { time, id, x, y } => {
            let (x, y) = host.to_surface_local(x, y);
            Action::TouchMotion { time, id, x, y }
        }
        other => other,
    }
}

fn forward(host: &mut dyn InputHost, actions: Vec<Action>) {
    for action in actions {
        let action = to_surface_local(host, action);
        trace!("Emitting {action:?}");
        host.emit(action);
    }
}

fn cancel_pointer(config: &mut ConfigModel, grab: PointerGrab, host: &mut dyn InputHost) {
    let Some(index) = grab.pressed_region else {
        return;
    };
    let (cx, cy) = config.calibration.apply(grab.origin.0, grab.origin.1);
    let ev = ContactEvent::pointer(grab.button, grab.last_time, cx, cy);
    forward(host, config.regions[index].on_leave(&ev));
}

fn cancel_touch(config: &mut ConfigModel, grab: TouchGrab, host: &mut dyn InputHost) {
    for (id, contact) in grab.contacts {
        let Some(index) = contact.region else {
            continue;
        };
        let (cx, cy) = config.calibration.apply(contact.x, contact.y);
        let ev = ContactEvent::touch(id, contact.last_time, cx, cy);
        forward(host, config.regions[index].on_leave(&ev));
    }
}

/// Entry point for all host callbacks.
#[derive(Debug, Default)]
pub struct RoutingHandle {
    config: Option<ConfigModel>,
    seats: HashMap<SeatId, SeatRoutingContext>,
}

impl RoutingHandle {
    pub fn new(config: Option<ConfigModel>) -> Self {
        Self {
            config,
            seats: HashMap::new(),
        }
    }

    /// Load the region config. A missing or broken config leaves routing
    /// disabled and every event is passed through.
    pub fn init(config_path: Option<&Path>) -> Self {
        let Some(path) = config_path else {
            info!("No input configuration given, passing input through");
            return Self::new(None);
        };
        match parse_config_file(path) {
            Ok(config) => Self::new(Some(config)),
            Err(e) => {
                error!("{e}");
                warn!("Input calibration disabled, passing input through");
                Self::new(None)
            }
        }
    }

    pub fn config(&self) -> Option<&ConfigModel> {
        self.config.as_ref()
    }

    pub fn seat(&self, seat: SeatId) -> Option<&SeatRoutingContext> {
        self.seats.get(&seat)
    }

    /// Route one assembled device event to the matching handler.
    pub fn handle_host_event(
        &mut self,
        seat: SeatId,
        time: u64,
        event: HostEvent,
        host: &mut dyn InputHost,
    ) {
        match event {
            HostEvent::PointerMotion { x, y } => self.handle_pointer_motion(seat, time, x, y, host),
            HostEvent::PointerButton { button, state } => {
                self.handle_pointer_button(seat, time, button, state, host);
            }
            HostEvent::Key { code, state } => self.handle_key(seat, time, code, state, host),
            HostEvent::TouchDown { id, x, y } => self.handle_touch_down(seat, time, id, x, y, host),
            HostEvent::TouchMotion { id, x, y } => {
                self.handle_touch_motion(seat, time, id, x, y, host);
            }
            HostEvent::TouchUp { id } => self.handle_touch_up(seat, time, id, host),
        }
    }

    // -- Seat lifecycle -------------------------------------------

    pub fn on_seat_created(&mut self, seat: SeatId) {
        if self.seats.contains_key(&seat) {
            warn!("Seat {seat} created twice, keeping existing context");
            return;
        }
        debug!("Seat {seat} created");
        self.seats.insert(seat, SeatRoutingContext::default());
    }

    /// Install grabs for devices that appeared and cancel those whose
    /// device went away.
    pub fn on_seat_capabilities_changed(
        &mut self,
        seat: SeatId,
        caps: SeatCapabilities,
        host: &mut dyn InputHost,
    ) {
        let Some(ctx) = self.seats.get_mut(&seat) else {
            warn!("Capabilities changed for unknown seat {seat}");
            return;
        };

        if caps.pointer && ctx.pointer.is_none() {
            debug!("Seat {seat}: grabbing pointer");
            ctx.pointer = Some(PointerGrab::default());
        } else if !caps.pointer {
            if let Some(grab) = ctx.pointer.take() {
                debug!("Seat {seat}: pointer removed");
                if let Some(config) = self.config.as_mut() {
                    cancel_pointer(config, grab, host);
                }
            }
        }

        if caps.keyboard != ctx.keyboard {
            debug!("Seat {seat}: keyboard grab {}", caps.keyboard);
            ctx.keyboard = caps.keyboard;
        }

        if caps.touch && ctx.touch.is_none() {
            debug!("Seat {seat}: grabbing touch");
            ctx.touch = Some(TouchGrab::default());
        } else if !caps.touch {
            if let Some(grab) = ctx.touch.take() {
                debug!("Seat {seat}: touch removed");
                if let Some(config) = self.config.as_mut() {
                    cancel_touch(config, grab, host);
                }
            }
        }
    }

    /// Drop a seat, cancelling every contact it still holds.
    pub fn on_seat_destroyed(&mut self, seat: SeatId, host: &mut dyn InputHost) {
        let Some(ctx) = self.seats.remove(&seat) else {
            warn!("Destroying unknown seat {seat}");
            return;
        };
        if let Some(config) = self.config.as_mut() {
            if let Some(grab) = ctx.pointer {
                cancel_pointer(config, grab, host);
            }
            if let Some(grab) = ctx.touch {
                cancel_touch(config, grab, host);
            }
        }
        debug!("Seat {seat} destroyed");
    }

    // -- Pointer --------------------------------------------------

    /// Leaving every region by pointer motion is not a leave; only motion
    /// inside a region is routed.
    pub fn handle_pointer_motion(
        &mut self,
        seat: SeatId,
        time: u64,
        x: f32,
        y: f32,
        host: &mut dyn InputHost,
    ) {
        let (Some(config), Some(grab)) = (
            self.config.as_mut(),
            self.seats.get_mut(&seat).and_then(|c| c.pointer.as_mut()),
        ) else {
            return forward(host, vec![Action::PointerMotion { time, x, y }]);
        };

        grab.x = x;
        grab.y = y;
        grab.last_time = time;

        match locate(config, x, y) {
            Ok((index, cx, cy)) => {
                let ev = ContactEvent::pointer(grab.button, time, cx, cy);
                forward(host, config.regions[index].on_motion(&ev));
            }
            Err(e) => trace!("Seat {seat}: pointer motion dropped, {e}"),
        }
    }

    /// Only the first button down is routed, by the position it went down
    /// at. It is released once every held button is up; buttons pressed in
    /// between are dropped so the host always sees matching pairs.
    pub fn handle_pointer_button(
        &mut self,
        seat: SeatId,
        time: u64,
        button: u32,
        state: KeyState,
        host: &mut dyn InputHost,
    ) {
        let (Some(config), Some(grab)) = (
            self.config.as_mut(),
            self.seats.get_mut(&seat).and_then(|c| c.pointer.as_mut()),
        ) else {
            return forward(host, vec![Action::PointerButton { time, button, state }]);
        };

        grab.last_time = time;
        match state {
            KeyState::Pressed => {
                grab.buttons_down += 1;
                if grab.buttons_down > 1 {
                    trace!("Seat {seat}: button {button} pressed while another is held, dropped");
                    return;
                }
                grab.origin = (grab.x, grab.y);
                let (index, cx, cy) = match locate(config, grab.x, grab.y) {
                    Ok(located) => located,
                    Err(e) => {
                        trace!("Seat {seat}: pointer button dropped, {e}");
                        return;
                    }
                };
                grab.button = button;
                grab.pressed_region = Some(index);
                let ev = ContactEvent::pointer(button, time, cx, cy);
                forward(host, config.regions[index].on_down(&ev));
            }
            KeyState::Released => {
                grab.buttons_down = grab.buttons_down.saturating_sub(1);
                if grab.buttons_down > 0 {
                    trace!("Seat {seat}: button {button} released while another is held, dropped");
                    return;
                }
                let Some(index) = grab.pressed_region.take() else {
                    trace!("Seat {seat}: pointer release without a routed press");
                    return;
                };
                let (cx, cy) = config.calibration.apply(grab.origin.0, grab.origin.1);
                let ev = ContactEvent::pointer(grab.button, time, cx, cy);
                forward(host, config.regions[index].on_up(&ev));
            }
        }
    }

    // -- Keyboard -------------------------------------------------

    /// Keys from real keyboards are never remapped.
    pub fn handle_key(
        &mut self,
        seat: SeatId,
        time: u64,
        code: u32,
        state: KeyState,
        host: &mut dyn InputHost,
    ) {
        trace!("Seat {seat}: key {code} {state:?}");
        forward(host, vec![Action::Key { time, code, state }]);
    }

    // -- Touch ----------------------------------------------------

    pub fn handle_touch_down(
        &mut self,
        seat: SeatId,
        time: u64,
        id: i32,
        x: f32,
        y: f32,
        host: &mut dyn InputHost,
    ) {
        let (Some(config), Some(grab)) = (
            self.config.as_mut(),
            self.seats.get_mut(&seat).and_then(|c| c.touch.as_mut()),
        ) else {
            return forward(host, vec![Action::TouchDown { time, id, x, y }]);
        };

        // A repeated down for a held id replaces the old contact.
        if let Some(old) = grab.contacts.remove(&id) {
            if let Some(index) = old.region {
                let (cx, cy) = config.calibration.apply(old.x, old.y);
                let ev = ContactEvent::touch(id, time, cx, cy);
                forward(host, config.regions[index].on_leave(&ev));
            }
        }

        let located = locate(config, x, y);
        grab.contacts.insert(
            id,
            TouchContact {
                x,
                y,
                last_time: time,
                region: located.as_ref().ok().map(|(index, _, _)| *index),
            },
        );

        match located {
            Ok((index, cx, cy)) => {
                let ev = ContactEvent::touch(id, time, cx, cy);
                forward(host, config.regions[index].on_down(&ev));
            }
            Err(e) => trace!("Seat {seat}: touch {id} down dropped, {e}"),
        }
    }

    /// Crossing into another region leaves the old one and enters the new.
    pub fn handle_touch_motion(
        &mut self,
        seat: SeatId,
        time: u64,
        id: i32,
        x: f32,
        y: f32,
        host: &mut dyn InputHost,
    ) {
        let (Some(config), Some(grab)) = (
            self.config.as_mut(),
            self.seats.get_mut(&seat).and_then(|c| c.touch.as_mut()),
        ) else {
            return forward(host, vec![Action::TouchMotion { time, id, x, y }]);
        };

        let contact = grab.contacts.entry(id).or_insert(TouchContact {
            x,
            y,
            last_time: time,
            region: None,
        });
        contact.x = x;
        contact.y = y;
        contact.last_time = time;

        let (cx, cy) = config.calibration.apply(x, y);
        let ev = ContactEvent::touch(id, time, cx, cy);
        let current = find_region_index(&config.regions, cx, cy);
        let mut actions = Vec::new();

        if current != contact.region {
            if let Some(old) = contact.region {
                trace!("Seat {seat}: touch {id} left '{}'", config.regions[old].name);
                actions.extend(config.regions[old].on_leave(&ev));
            }
            if let Some(new) = current {
                trace!("Seat {seat}: touch {id} entered '{}'", config.regions[new].name);
                actions.extend(config.regions[new].on_enter(&ev));
            }
            contact.region = current;
        }

        match current {
            Some(index) => actions.extend(config.regions[index].on_motion(&ev)),
            None => trace!("Seat {seat}: touch {id} motion outside all regions"),
        }
        forward(host, actions);
    }

    pub fn handle_touch_up(&mut self, seat: SeatId, time: u64, id: i32, host: &mut dyn InputHost) {
        let (Some(config), Some(grab)) = (
            self.config.as_mut(),
            self.seats.get_mut(&seat).and_then(|c| c.touch.as_mut()),
        ) else {
            return forward(host, vec![Action::TouchUp { time, id }]);
        };

        let Some(contact) = grab.contacts.remove(&id) else {
            trace!("Seat {seat}: up for unknown touch {id}");
            return;
        };
        let Some(index) = contact.region else {
            trace!("Seat {seat}: touch {id} up outside all regions");
            return;
        };
        let (cx, cy) = config.calibration.apply(contact.x, contact.y);
        let ev = ContactEvent::touch(id, time, cx, cy);
        forward(host, config.regions[index].on_up(&ev));
    }
}

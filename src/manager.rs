//! Device discovery, reader threads and the uinput output host (I/O layer).
//!
//! Pure routing logic lives in [`crate::dispatcher`], event assembly in
//! [`crate::event`].
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AbsInfo, AbsoluteAxisType, AttributeSet, Device, EventType, InputEvent, Key, UinputAbsSetup};
use log::{debug, error, info, warn};

use crate::behavior::{Action, KeyState};
use crate::config::ConfigModel;
use crate::dispatcher::{InputHost, RoutingHandle, SeatCapabilities, SeatId};
use crate::event::{FrameAssembler, HostEvent, classify_event, timestamp_micros};
use crate::keys::named_key_codes;
use crate::region::RegionKind;
use crate::settings::{OutputSettings, Settings};

/// Synthetic slider buttons available as `BTN_TRIGGER_HAPPY1 + id`.
const SYNTHETIC_BUTTONS: u16 = 40;
const MAX_TOUCH_SLOTS: i32 = 10;
const AXIS_LIMIT: i32 = 1_000_000;

/// Absolute axes used for slider values, indexed by region id.
const SLIDER_AXES: [AbsoluteAxisType; 8] = [
    AbsoluteAxisType::ABS_RX,
    AbsoluteAxisType::ABS_RY,
    AbsoluteAxisType::ABS_RZ,
    AbsoluteAxisType::ABS_THROTTLE,
    AbsoluteAxisType::ABS_RUDDER,
    AbsoluteAxisType::ABS_WHEEL,
    AbsoluteAxisType::ABS_GAS,
    AbsoluteAxisType::ABS_BRAKE,
];

/// Message from a reader thread to the routing loop.
enum ReaderMessage {
    Input {
        seat: SeatId,
        time: u64,
        event: HostEvent,
    },
    Disconnected {
        seat: SeatId,
    },
}

// -- CalibrationManager (top-level orchestrator) --------------

/// Reads the configured devices and routes their events to a virtual device.
pub struct CalibrationManager {
    routing: RoutingHandle,
    settings: Settings,
    running: Arc<AtomicBool>,
}

impl CalibrationManager {
    pub fn new(config_path: Option<&Path>, settings: Settings) -> Self {
        Self {
            routing: RoutingHandle::init(config_path),
            settings,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Open devices and route events until the running flag is cleared or
    /// every device is gone.
    pub fn start(&mut self) -> io::Result<()> {
        let names = self
            .routing
            .config()
            .map(|c| c.device_names.clone())
            .unwrap_or_default();
        let devices = find_devices(&names);
        if devices.is_empty() {
            error!("No input devices found, exiting");
            return Ok(());
        }

        let mut host = UinputHost::new(&self.settings.output, self.routing.config())?;
        self.running.store(true, Ordering::Relaxed);
        info!("Starting input calibration on {} device(s)", devices.len());

        let (tx, rx) = mpsc::channel();
        let mut seats = Vec::new();

        for (seat, (path, mut device)) in (0..).zip(devices) {
            let caps = seat_capabilities(&device);
            info!(
                "Seat {seat}: {} ({}) {caps:?}",
                device.name().unwrap_or("unknown"),
                path.display()
            );
            if self.settings.grab_devices {
                if let Err(e) = device.grab() {
                    warn!("Seat {seat}: cannot grab {}: {e}", path.display());
                }
            }
            self.routing.on_seat_created(seat);
            self.routing
                .on_seat_capabilities_changed(seat, caps, &mut host);

            let tx = tx.clone();
            let running = Arc::clone(&self.running);
            thread::Builder::new()
                .name(format!("input-{seat}"))
                .spawn(move || read_device(seat, device, caps.touch, &tx, &running))?;
            seats.push(seat);
        }
        drop(tx);

        while self.running.load(Ordering::Relaxed) {
            match rx.recv_timeout(Duration::from_millis(200)) {
                Ok(ReaderMessage::Input { seat, time, event }) => {
                    self.routing.handle_host_event(seat, time, event, &mut host);
                }
                Ok(ReaderMessage::Disconnected { seat }) => {
                    self.routing.on_seat_destroyed(seat, &mut host);
                    seats.retain(|s| *s != seat);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    error!("All input devices are gone, exiting");
                    break;
                }
            }
        }

        for seat in seats {
            self.routing.on_seat_destroyed(seat, &mut host);
        }
        info!("Input calibration stopped");
        Ok(())
    }

    /// Get a reference to the running flag for signal handling.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }
}

// -- Device I/O -----------------------------------------------

fn has_axes(device: &Device, x: AbsoluteAxisType, y: AbsoluteAxisType) -> bool {
    device
        .supported_absolute_axes()
        .is_some_and(|axes| axes.contains(x) && axes.contains(y))
}

/// Check if a device has multi-touch capabilities.
fn is_touch_device(device: &Device) -> bool {
    has_axes(
        device,
        AbsoluteAxisType::ABS_MT_POSITION_X,
        AbsoluteAxisType::ABS_MT_POSITION_Y,
    )
}

/// Map a device to the seat capabilities it provides.
fn seat_capabilities(device: &Device) -> SeatCapabilities {
    let touch = is_touch_device(device);
    let absolute = has_axes(device, AbsoluteAxisType::ABS_X, AbsoluteAxisType::ABS_Y);
    let keyboard = device
        .supported_keys()
        .is_some_and(|keys| keys.iter().any(|k| k.code() > 0 && k.code() < Key::BTN_0.code()));
    SeatCapabilities {
        pointer: absolute && !touch,
        keyboard,
        touch,
    }
}

/// Devices whose name is listed in the config, or every touch device when
/// the config names none.
fn find_devices(names: &[String]) -> Vec<(PathBuf, Device)> {
    evdev::enumerate()
        .filter(|(path, device)| {
            let wanted = if names.is_empty() {
                is_touch_device(device)
            } else {
                device
                    .name()
                    .is_some_and(|name| names.iter().any(|n| n == name))
            };
            if wanted {
                debug!("Selected {}", path.display());
            }
            wanted
        })
        .collect()
}

/// Blocking reader loop - assembles frames and hands them to the router.
fn read_device(
    seat: SeatId,
    mut device: Device,
    multitouch: bool,
    tx: &Sender<ReaderMessage>,
    running: &Arc<AtomicBool>,
) {
    let mut assembler = FrameAssembler::new(multitouch);

    while running.load(Ordering::Relaxed) {
        let events = match device.fetch_events() {
            Ok(events) => events,
            Err(e) => {
                if running.load(Ordering::Relaxed) {
                    warn!("Seat {seat} disconnected: {e}");
                    let _ = tx.send(ReaderMessage::Disconnected { seat });
                }
                return;
            }
        };
        for event in events {
            let Some(classified) = classify_event(&event) else {
                continue;
            };
            let time = timestamp_micros(event.timestamp());
            for host_event in assembler.feed(classified) {
                let message = ReaderMessage::Input {
                    seat,
                    time,
                    event: host_event,
                };
                if tx.send(message).is_err() {
                    return;
                }
            }
        }
    }
}

// -- UinputHost -----------------------------------------------

fn key_event(code: u16, state: KeyState) -> InputEvent {
    let value = match state {
        KeyState::Pressed => 1,
        KeyState::Released => 0,
    };
    InputEvent::new(EventType::KEY, code, value)
}

fn abs_event(axis: AbsoluteAxisType, value: i32) -> InputEvent {
    InputEvent::new(EventType::ABSOLUTE, axis.0, value)
}

/// [`InputHost`] that writes actions to a uinput virtual device.
pub struct UinputHost {
    device: VirtualDevice,
    axis_scale: f32,
    touches: HashSet<i32>,
    next_tracking_id: i32,
}

impl UinputHost {
    /// Create the virtual device. Key codes used by button regions in
    /// `config` are registered in addition to the symbolic key range.
    pub fn new(output: &OutputSettings, config: Option<&ConfigModel>) -> io::Result<Self> {
        let mut keys = AttributeSet::<Key>::new();
        for code in named_key_codes() {
            keys.insert(Key::new(code));
        }
        let region_keys = config
            .into_iter()
            .flat_map(|c| &c.regions)
            .filter_map(|r| match &r.kind {
                RegionKind::Button(b) => u16::try_from(b.key_code).ok(),
                _ => None,
            });
        for code in region_keys {
            keys.insert(Key::new(code));
        }
        for code in Key::BTN_LEFT.code()..=Key::BTN_TASK.code() {
            keys.insert(Key::new(code));
        }
        for id in 0..SYNTHETIC_BUTTONS {
            keys.insert(Key::new(Key::BTN_TRIGGER_HAPPY1.code() + id));
        }
        keys.insert(Key::BTN_TOUCH);

        let width = i32::try_from(output.width).unwrap_or(i32::MAX);
        let height = i32::try_from(output.height).unwrap_or(i32::MAX);
        let mut axes = vec![
            (AbsoluteAxisType::ABS_X, AbsInfo::new(0, 0, width, 0, 0, 0)),
            (AbsoluteAxisType::ABS_Y, AbsInfo::new(0, 0, height, 0, 0, 0)),
            (
                AbsoluteAxisType::ABS_MT_SLOT,
                AbsInfo::new(0, 0, MAX_TOUCH_SLOTS - 1, 0, 0, 0),
            ),
            (
                AbsoluteAxisType::ABS_MT_TRACKING_ID,
                AbsInfo::new(0, -1, i32::MAX, 0, 0, 0),
            ),
            (
                AbsoluteAxisType::ABS_MT_POSITION_X,
                AbsInfo::new(0, 0, width, 0, 0, 0),
            ),
            (
                AbsoluteAxisType::ABS_MT_POSITION_Y,
                AbsInfo::new(0, 0, height, 0, 0, 0),
            ),
        ];
        axes.extend(
            SLIDER_AXES
                .iter()
                .map(|axis| (*axis, AbsInfo::new(0, -AXIS_LIMIT, AXIS_LIMIT, 0, 0, 0))),
        );

        let mut builder = VirtualDeviceBuilder::new()?
            .name(&output.name)
            .with_keys(&keys)?;
        for (axis, info) in axes {
            builder = builder.with_absolute_axis(&UinputAbsSetup::new(axis, info))?;
        }
        let device = builder.build()?;
        info!("Created virtual device '{}'", output.name);

        Ok(Self {
            device,
            axis_scale: output.axis_scale,
            touches: HashSet::new(),
            next_tracking_id: 0,
        })
    }

    /// Translate an action into evdev events, or `None` if the virtual device
    /// has nothing to represent it with.
    fn events_for(&mut self, action: &Action) -> Option<Vec<InputEvent>> {
        let events = match *action {
            Action::Key { code, state, .. } => vec![key_event(u16::try_from(code).ok()?, state)],
            Action::PointerButton { button, state, .. } => {
                vec![key_event(u16::try_from(button).ok()?, state)]
            }
            Action::PointerMotion { x, y, .. } => vec![
                abs_event(AbsoluteAxisType::ABS_X, x.round() as i32),
                abs_event(AbsoluteAxisType::ABS_Y, y.round() as i32),
            ],
            Action::Button { id, state, .. } => {
                let offset = u16::try_from(id).ok().filter(|id| *id < SYNTHETIC_BUTTONS)?;
                vec![key_event(Key::BTN_TRIGGER_HAPPY1.code() + offset, state)]
            }
            Action::Axis { id, value, .. } => {
                let axis = *SLIDER_AXES.get(usize::try_from(id).ok()?)?;
                let scaled = (value * self.axis_scale).round() as i32;
                vec![abs_event(axis, scaled.clamp(-AXIS_LIMIT, AXIS_LIMIT))]
            }
            Action::TouchDown { id, x, y, .. } => {
                if !(0..MAX_TOUCH_SLOTS).contains(&id) {
                    return None;
                }
                let tracking_id = self.next_tracking_id;
                self.next_tracking_id = self.next_tracking_id.wrapping_add(1) & i32::MAX;
                let (x, y) = (x.round() as i32, y.round() as i32);
                let mut events = vec![
                    abs_event(AbsoluteAxisType::ABS_MT_SLOT, id),
                    abs_event(AbsoluteAxisType::ABS_MT_TRACKING_ID, tracking_id),
                    abs_event(AbsoluteAxisType::ABS_MT_POSITION_X, x),
                    abs_event(AbsoluteAxisType::ABS_MT_POSITION_Y, y),
                ];
                if self.touches.is_empty() {
                    events.push(key_event(Key::BTN_TOUCH.code(), KeyState::Pressed));
                    events.push(abs_event(AbsoluteAxisType::ABS_X, x));
                    events.push(abs_event(AbsoluteAxisType::ABS_Y, y));
                }
                self.touches.insert(id);
                events
            }
            Action::TouchMotion { id, x, y, .. } => {
                if !self.touches.contains(&id) {
                    return None;
                }
                vec![
                    abs_event(AbsoluteAxisType::ABS_MT_SLOT, id),
                    abs_event(AbsoluteAxisType::ABS_MT_POSITION_X, x.round() as i32),
                    abs_event(AbsoluteAxisType::ABS_MT_POSITION_Y, y.round() as i32),
                ]
            }
            Action::TouchUp { id, .. } => {
                if !self.touches.remove(&id) {
                    return None;
                }
                let mut events = vec![
                    abs_event(AbsoluteAxisType::ABS_MT_SLOT, id),
                    abs_event(AbsoluteAxisType::ABS_MT_TRACKING_ID, -1),
                ];
                if self.touches.is_empty() {
                    events.push(key_event(Key::BTN_TOUCH.code(), KeyState::Released));
                }
                events
            }
        };
        Some(events)
    }
}

impl InputHost for UinputHost {
    fn emit(&mut self, action: Action) {
        let Some(events) = self.events_for(&action) else {
            warn!("Virtual device cannot represent {action:?}, dropped");
            return;
        };
        if let Err(e) = self.device.emit(&events) {
            error!("Failed to emit {action:?}: {e}");
        }
    }
}

// -- Device listing -------------------------------------------

/// List all devices that can be routed: multi-touch screens and absolute
/// pointers.
pub fn list_input_devices() -> ExitCode {
    println!("\n=== inputcal: Available Input Devices ===\n");
    let mut count = 0;

    for (path, device) in evdev::enumerate() {
        let caps = seat_capabilities(&device);
        if !caps.touch && !caps.pointer {
            continue;
        }

        count += 1;
        let kind = if caps.touch { "multi-touch" } else { "absolute pointer" };
        println!(
            "Device {count}:\n\
             \x20 Path:      {}\n\
             \x20 Name:      {}\n\
             \x20 Type:      {kind}\n\
             \x20 Phys:      {}\n",
            path.display(),
            device.name().unwrap_or("unknown"),
            device.physical_path().unwrap_or("N/A"),
        );
    }

    if count == 0 {
        println!(
            "No touch or absolute pointer devices found.\n\n\
             Troubleshooting:\n\
             \x20 - Run 'libinput list-devices' to see all devices\n\
             \x20 - Run as root if devices are not visible"
        );
        return ExitCode::FAILURE;
    }

    println!(
        "Found {count} device(s).\n\n\
         Add the device name to your input configuration:\n\
         \x20 device name: <Name>"
    );
    ExitCode::SUCCESS
}

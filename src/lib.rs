//! inputcal – touchscreen calibration and region routing.
//!
//! Raw coordinates are corrected by a [`calibration::CalibrationTransform`],
//! matched against the regions of a [`config::ConfigModel`] and turned into
//! key, button, axis or touch [`behavior::Action`]s by the region that
//! contains them.

pub mod behavior;
pub mod calibration;
pub mod config;
pub mod dispatcher;
pub mod event;
pub mod keys;
pub mod manager;
pub mod region;
pub mod settings;

//! Pedestal, noise, and common-mode calibration engine for multi-plane pixel
//! detectors.
//!
//! The engine turns a stream of raw detector frames into a per-pixel baseline
//! (pedestal), a per-pixel noise estimate, and a good/bad status table,
//! correcting every frame for the shared common-mode fluctuation of its
//! detector. Calibration runs as a sequence of passes over the same event
//! range: a raw accumulation pass, a configurable number of common-mode
//! iterations, and an optional firing-frequency refinement pass, with
//! bad-pixel masking feeding back between passes.
//!
//! Entry point: [`engine::run_calibration`] with a [`io::FrameSource`], a
//! [`domain::TelescopeGeometry`], and a [`common::config::CalibrationConfig`].

pub mod common;
pub mod domain;
pub mod engine;
pub mod io;
pub mod stats;

pub use common::config::CalibrationConfig;
pub use domain::{CalResult, CalibError, CalibrationRecord};
pub use engine::run_calibration;

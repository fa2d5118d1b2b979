pub mod common_mode;
pub mod controller;
pub mod masking;
pub mod observer;

pub use common_mode::{CommonModeCuts, CommonModeOutcome};
pub use controller::{CalibrationController, FrameFlow, LoopState, SkipReason, run_calibration};
pub use observer::{CalibrationObserver, NullObserver};

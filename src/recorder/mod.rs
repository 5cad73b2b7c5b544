//! Recording system module
//!
//! - CaptureController drives one capture session at a time
//! - DurationTimer counts recorded seconds
//! - CaptureState / StudioEvent describe where a session is

pub mod controller;
pub mod error;
pub mod state;
pub mod timer;

pub use controller::CaptureController;
pub use error::{StudioError, StudioResult};
pub use state::{CaptureState, StudioEvent};
pub use timer::DurationTimer;

//! Recording state management
//!
//! Defines the capture state machine and the events broadcast on every
//! transition.

use crate::capture::RecordingMode;
use serde::{Deserialize, Serialize};

/// Current state of the capture controller
///
/// Idle -> Recording -> (Paused <-> Recording) -> Stopped -> Idle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureState {
    /// No capture session
    #[default]
    Idle,
    /// Devices live, encoder running, timer ticking
    Recording,
    /// Encoder suspended, timer halted
    Paused,
    /// Payload being finalized and stored
    Stopped,
}

impl CaptureState {
    /// Whether a capture session currently exists
    pub fn is_active(&self) -> bool {
        !matches!(self, CaptureState::Idle)
    }

    /// Whether the session is recording or paused
    pub fn is_capturing(&self) -> bool {
        matches!(self, CaptureState::Recording | CaptureState::Paused)
    }
}

/// Events emitted by the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StudioEvent {
    /// Mode selection changed
    ModeChanged { mode: RecordingMode },
    /// Capture started
    Started { mode: RecordingMode },
    /// Capture paused at `seconds`
    Paused { seconds: u64 },
    /// Capture resumed at `seconds`
    Resumed { seconds: u64 },
    /// One second of recording elapsed
    Tick { seconds: u64 },
    /// Recording stored at list position `index` (0-based)
    Stopped { index: usize, duration: u64 },
    /// User-visible error message
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_states() {
        assert!(!CaptureState::Idle.is_active());
        assert!(CaptureState::Paused.is_active());
        assert!(CaptureState::Stopped.is_active());
        assert!(!CaptureState::Stopped.is_capturing());
    }

    #[test]
    fn test_event_wire_shape() {
        let json = serde_json::to_value(StudioEvent::Stopped {
            index: 2,
            duration: 7,
        })
        .unwrap();
        assert_eq!(json["kind"], "stopped");
        assert_eq!(json["index"], 2);
    }
}

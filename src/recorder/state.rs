// SPDX-License-Identifier: GPL-3.0-only

//! Recording state machine
//!
//! [`transition`] is a pure function from the current state and a trigger to
//! the next state plus the side effects to perform, in order. The
//! orchestrator executes the effects; nothing here touches hardware.
//!
//! ```text
//!            start                 session configured
//!   Idle ───────────▶ Opening ─────────────────────────▶ Active
//!    ▲                 │  ▲                                │
//!    │ stop / cancel / │  └──────── Switching ◀────────────┤ toggleCamera
//!    │ fault           ▼                                   │
//!    └──────────── Stopping ◀──────────────────────────────┘ stop / cancel
//! ```

use crate::errors::{CaptureError, CaptureResult};
use serde::Serialize;
use std::fmt;

/// Where the recorder is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// Nothing open, permit free
    #[default]
    Idle,
    /// Permit held; waiting for the device and session callbacks
    Opening,
    /// Session streaming into the encoder
    Active,
    /// Closing one camera before opening the other
    Switching,
    /// Tearing down after stop or cancel
    Stopping,
}

impl RecordingState {
    pub const ALL: [RecordingState; 5] = [
        RecordingState::Idle,
        RecordingState::Opening,
        RecordingState::Active,
        RecordingState::Switching,
        RecordingState::Stopping,
    ];
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordingState::Idle => "idle",
            RecordingState::Opening => "opening",
            RecordingState::Active => "active",
            RecordingState::Switching => "switching",
            RecordingState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// A command or callback fed into the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Start,
    Stop,
    Cancel,
    ToggleCamera,
    ToggleFlash,
    DeviceOpened,
    /// Open error, error after open, or disconnect
    DeviceFailed,
    SessionConfigured,
    SessionConfigureFailed,
    SurfaceAvailable,
    SurfaceDestroyed,
}

impl Trigger {
    pub const ALL: [Trigger; 11] = [
        Trigger::Start,
        Trigger::Stop,
        Trigger::Cancel,
        Trigger::ToggleCamera,
        Trigger::ToggleFlash,
        Trigger::DeviceOpened,
        Trigger::DeviceFailed,
        Trigger::SessionConfigured,
        Trigger::SessionConfigureFailed,
        Trigger::SurfaceAvailable,
        Trigger::SurfaceDestroyed,
    ];

    /// Whether the trigger comes from a caller rather than a callback
    pub fn is_command(self) -> bool {
        matches!(
            self,
            Trigger::Start
                | Trigger::Stop
                | Trigger::Cancel
                | Trigger::ToggleCamera
                | Trigger::ToggleFlash
        )
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Trigger::Start => "startRecording",
            Trigger::Stop => "stopRecording",
            Trigger::Cancel => "cancelRecording",
            Trigger::ToggleCamera => "toggleCamera",
            Trigger::ToggleFlash => "toggleFlash",
            Trigger::DeviceOpened => "device-opened",
            Trigger::DeviceFailed => "device-failed",
            Trigger::SessionConfigured => "session-configured",
            Trigger::SessionConfigureFailed => "session-configure-failed",
            Trigger::SurfaceAvailable => "surface-available",
            Trigger::SurfaceDestroyed => "surface-destroyed",
        };
        f.write_str(name)
    }
}

/// Side effect requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effect {
    ClearLedger,
    AcquireGuard,
    RequestOpen,
    /// Bind preview + encoder targets; waits if either is missing
    ConfigureSession,
    AppendSegment,
    StartEncoder,
    StartRepeating,
    /// Close session, stop and release encoder, close device
    Teardown,
    ReleaseGuard,
    FlipCamera,
    ToggleTorch,
    EmitFinished,
    DeleteSegments,
}

/// Result of feeding one trigger into the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Transient state held while the effects run
    pub via: Option<RecordingState>,
    pub next: RecordingState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: RecordingState, effects: &[Effect]) -> Self {
        Self {
            via: None,
            next,
            effects: effects.to_vec(),
        }
    }

    fn via(via: RecordingState, next: RecordingState, effects: &[Effect]) -> Self {
        Self {
            via: Some(via),
            next,
            effects: effects.to_vec(),
        }
    }

    fn stay(state: RecordingState) -> Self {
        Self::to(state, &[])
    }

    /// No state change and nothing to do
    pub fn is_noop(&self, from: RecordingState) -> bool {
        self.via.is_none() && self.next == from && self.effects.is_empty()
    }
}

/// Effects that abandon an attempt after a fault: nothing is kept
pub const ABORT_EFFECTS: [Effect; 3] = [Effect::Teardown, Effect::ReleaseGuard, Effect::DeleteSegments];

const STOP_EFFECTS: [Effect; 3] = [Effect::Teardown, Effect::ReleaseGuard, Effect::EmitFinished];

const START_EFFECTS: [Effect; 3] = [Effect::ClearLedger, Effect::AcquireGuard, Effect::RequestOpen];

const SWITCH_EFFECTS: [Effect; 5] = [
    Effect::Teardown,
    Effect::ReleaseGuard,
    Effect::FlipCamera,
    Effect::AcquireGuard,
    Effect::RequestOpen,
];

const BEGIN_SEGMENT_EFFECTS: [Effect; 3] = [
    Effect::AppendSegment,
    Effect::StartEncoder,
    Effect::StartRepeating,
];

/// The transition table
pub fn transition(state: RecordingState, trigger: Trigger) -> CaptureResult<Transition> {
    use RecordingState::*;
    use Trigger as T;

    let rejected = || CaptureError::InvalidStateTransition { state, trigger };

    let next = match (state, trigger) {
        (Idle, T::Start) => Transition::to(Opening, &START_EFFECTS),
        (Idle, T::Stop | T::Cancel | T::ToggleCamera | T::ToggleFlash) => Transition::stay(Idle),
        (Idle, T::SurfaceAvailable | T::SurfaceDestroyed) => Transition::stay(Idle),
        (Idle, T::DeviceOpened | T::DeviceFailed | T::SessionConfigured | T::SessionConfigureFailed) => {
            return Err(rejected());
        }

        (Opening, T::DeviceOpened | T::SurfaceAvailable) => {
            Transition::to(Opening, &[Effect::ConfigureSession])
        }
        (Opening, T::SessionConfigured) => Transition::to(Active, &BEGIN_SEGMENT_EFFECTS),
        (Opening, T::DeviceFailed | T::SessionConfigureFailed) => Transition::to(Idle, &ABORT_EFFECTS),
        (Opening, T::SurfaceDestroyed) => Transition::stay(Opening),

        (Active, T::ToggleCamera) => Transition::via(Switching, Opening, &SWITCH_EFFECTS),
        (Active, T::ToggleFlash) => Transition::to(Active, &[Effect::ToggleTorch]),
        (Active, T::DeviceFailed) => Transition::to(Idle, &ABORT_EFFECTS),
        (Active, T::SurfaceAvailable | T::SurfaceDestroyed) => Transition::stay(Active),

        (Opening | Active, T::Stop) => Transition::via(Stopping, Idle, &STOP_EFFECTS),
        (Opening | Active, T::Cancel) => Transition::via(Stopping, Idle, &ABORT_EFFECTS),

        (Opening, T::Start | T::ToggleCamera | T::ToggleFlash) => return Err(rejected()),
        (Active, T::Start | T::DeviceOpened | T::SessionConfigured | T::SessionConfigureFailed) => {
            return Err(rejected());
        }

        // Transient states only exist while a transition's effects run
        (Switching | Stopping, _) => return Err(rejected()),
    };

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use RecordingState::*;

    #[test]
    fn test_start_from_idle() {
        let t = transition(Idle, Trigger::Start).unwrap();
        assert_eq!(t.next, Opening);
        assert_eq!(
            t.effects,
            vec![Effect::ClearLedger, Effect::AcquireGuard, Effect::RequestOpen]
        );
    }

    #[test]
    fn test_start_rejected_unless_idle() {
        for state in [Opening, Active, Switching, Stopping] {
            assert_eq!(
                transition(state, Trigger::Start),
                Err(CaptureError::InvalidStateTransition {
                    state,
                    trigger: Trigger::Start
                })
            );
        }
    }

    #[test]
    fn test_idle_commands_are_noops() {
        for trigger in [
            Trigger::Stop,
            Trigger::Cancel,
            Trigger::ToggleCamera,
            Trigger::ToggleFlash,
        ] {
            let t = transition(Idle, trigger).unwrap();
            assert!(t.is_noop(Idle), "{} should be a no-op while idle", trigger);
        }
    }

    #[test]
    fn test_session_configured_begins_segment() {
        let t = transition(Opening, Trigger::SessionConfigured).unwrap();
        assert_eq!(t.next, Active);
        assert_eq!(t.effects.first(), Some(&Effect::AppendSegment));
        assert!(t.effects.contains(&Effect::StartEncoder));
        assert!(t.effects.contains(&Effect::StartRepeating));
    }

    #[test]
    fn test_toggle_camera_closes_before_reopening() {
        let t = transition(Active, Trigger::ToggleCamera).unwrap();
        assert_eq!(t.via, Some(Switching));
        assert_eq!(t.next, Opening);

        let pos = |e| t.effects.iter().position(|x| *x == e).unwrap();
        assert!(pos(Effect::Teardown) < pos(Effect::ReleaseGuard));
        assert!(pos(Effect::ReleaseGuard) < pos(Effect::AcquireGuard));
        assert!(pos(Effect::FlipCamera) < pos(Effect::RequestOpen));
    }

    #[test]
    fn test_stop_emits_cancel_deletes() {
        for state in [Opening, Active] {
            let stop = transition(state, Trigger::Stop).unwrap();
            assert_eq!(stop.via, Some(Stopping));
            assert_eq!(stop.next, Idle);
            assert!(stop.effects.contains(&Effect::EmitFinished));
            assert!(!stop.effects.contains(&Effect::DeleteSegments));

            let cancel = transition(state, Trigger::Cancel).unwrap();
            assert_eq!(cancel.next, Idle);
            assert!(cancel.effects.contains(&Effect::DeleteSegments));
            assert!(!cancel.effects.contains(&Effect::EmitFinished));
        }
    }

    #[test]
    fn test_faults_abort_to_idle() {
        for (state, trigger) in [
            (Opening, Trigger::DeviceFailed),
            (Opening, Trigger::SessionConfigureFailed),
            (Active, Trigger::DeviceFailed),
        ] {
            let t = transition(state, trigger).unwrap();
            assert_eq!(t.next, Idle);
            assert_eq!(t.effects, ABORT_EFFECTS.to_vec());
        }
    }

    #[test]
    fn test_toggles_rejected_while_opening() {
        assert!(transition(Opening, Trigger::ToggleCamera).is_err());
        assert!(transition(Opening, Trigger::ToggleFlash).is_err());
    }

    #[test]
    fn test_every_release_follows_teardown_and_idle_releases() {
        // Exhaustive: any path into Idle from a permit-holding state releases it
        for state in RecordingState::ALL {
            for trigger in Trigger::ALL {
                let Ok(t) = transition(state, trigger) else {
                    continue;
                };
                if t.next == Idle && state != Idle {
                    assert!(
                        t.effects.contains(&Effect::ReleaseGuard),
                        "{} + {} reaches idle without releasing",
                        state,
                        trigger
                    );
                    assert_eq!(t.effects.first(), Some(&Effect::Teardown));
                }
                if t.effects.contains(&Effect::AcquireGuard) {
                    assert_eq!(t.next, Opening);
                }
            }
        }
    }

    #[test]
    fn test_transient_states_accept_nothing() {
        for trigger in Trigger::ALL {
            assert!(transition(Switching, trigger).is_err());
            assert!(transition(Stopping, trigger).is_err());
        }
    }

    #[test]
    fn test_command_names() {
        assert_eq!(Trigger::ToggleFlash.to_string(), "toggleFlash");
        assert!(Trigger::Cancel.is_command());
        assert!(!Trigger::DeviceOpened.is_command());
    }
}

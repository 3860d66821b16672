// SPDX-License-Identifier: GPL-3.0-only

//! Torch control for the live capture session
//!
//! Flash is driven through the repeating capture request rather than a
//! separate LED device, so toggling never interrupts the stream.

use serde::{Deserialize, Serialize};

/// Flash setting carried by a capture request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashMode {
    /// Flash LED is off
    #[default]
    Off,
    /// Torch / flashlight mode (LED stays on continuously)
    Torch,
}

/// Whether the torch is requested
///
/// Survives camera switches and is reapplied to every new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TorchState {
    on: bool,
}

impl TorchState {
    pub fn is_on(self) -> bool {
        self.on
    }

    pub fn toggled(self) -> Self {
        Self { on: !self.on }
    }

    /// Flash mode to request on a camera with or without a flash unit
    pub fn flash_mode(self, has_flash: bool) -> FlashMode {
        if self.on && has_flash {
            FlashMode::Torch
        } else {
            FlashMode::Off
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_torch_defaults_off() {
        assert!(!TorchState::default().is_on());
        assert_eq!(TorchState::default().flash_mode(true), FlashMode::Off);
    }

    #[test]
    fn test_double_toggle_restores() {
        let torch = TorchState::default();
        assert_eq!(torch.toggled().toggled(), torch);
    }

    #[test]
    fn test_torch_needs_flash_unit() {
        let on = TorchState::default().toggled();
        assert_eq!(on.flash_mode(true), FlashMode::Torch);
        assert_eq!(on.flash_mode(false), FlashMode::Off);
    }
}

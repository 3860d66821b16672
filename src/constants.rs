// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Directory name used under the user's config and cache directories
pub const APP_DIR: &str = "camera-segments";

/// Config file name inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Subdirectory of the cache directory holding segment files
pub const SEGMENTS_DIR: &str = "segments";

/// Prefix of every segment file name
pub const SEGMENT_FILE_PREFIX: &str = "VID_SEGMENT_";

/// Bounded wait for the device permit, in milliseconds
pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 2500;

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Fixed encoding profile of every segment
pub mod encoder {
    pub const WIDTH: u32 = 640;
    pub const HEIGHT: u32 = 480;
    pub const FRAMERATE: u32 = 30;

    /// Target video bitrate in bits per second
    pub const VIDEO_BITRATE: u32 = 1_500_000;

    pub const VIDEO_CODEC: &str = "h264";
    pub const AUDIO_CODEC: &str = "aac";
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Default bounded wait for the device permit
    pub const ACQUIRE_TIMEOUT: Duration = Duration::from_millis(super::DEFAULT_ACQUIRE_TIMEOUT_MS);

    /// How long the worker waits for in-flight callbacks when shutting down
    pub const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

    /// Poll interval used when waiting for the recorder to reach a state
    pub const STATE_POLL_INTERVAL: Duration = Duration::from_millis(10);

    /// Pause between scripted steps of the demo session
    pub const DEMO_STEP: Duration = Duration::from_millis(200);
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

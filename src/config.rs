use std::time::Duration;

/// Tuning constants, gathered so a deterministic-test configuration can
/// be built without touching the state machine (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Maximum segment size, header included, in bytes.
    pub mss: u16,
    /// Initial locally-advertised receive window.
    pub local_recv_window: u16,
    /// Hard ceiling clamped onto the peer's advertised window; this
    /// crate has no congestion-avoidance algorithm, so this ceiling is
    /// the only brake on how much can be in flight.
    pub congestion_ceiling: u16,
    /// Fixed retransmission timeout (no RTT estimation).
    pub rto: Duration,
    /// Number of retransmissions of the same entry tolerated before the
    /// connection is abandoned.
    pub max_retries: u32,
    /// When set, the initial send sequence number is always 1 instead
    /// of drawn from `0..=255`, for reproducible tests.
    pub deterministic_iss: bool,
}

pub const HEADER_LEN: usize = 20;

/// The segmenter never builds a payload larger than this, independent
/// of what `mss` would otherwise allow (spec.md §4.2).
pub const PAYLOAD_CEILING: usize = 512;

impl Config {
    /// The largest payload a single segment can carry under this config.
    pub fn max_payload(&self) -> usize {
        (self.mss as usize - HEADER_LEN).min(PAYLOAD_CEILING)
    }

    /// A configuration with `iss` fixed at 1, for reproducible tests.
    pub fn deterministic() -> Self {
        Config {
            deterministic_iss: true,
            ..Config::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mss: 536,
            local_recv_window: 3072,
            congestion_ceiling: 3072,
            rto: Duration::from_secs(1),
            max_retries: 6,
            deterministic_iss: false,
        }
    }
}

use std::io;

/// The only error surface the core exposes.
///
/// Per-peer protocol anomalies (stale segments, bad ACKs, unacceptable
/// flag combinations) are never turned into an `Error` — they are
/// absorbed silently inside the event loop, as required by the
/// propagation policy. `Error` only carries failures bubbled up from
/// the injected [`crate::io::NetworkIo`] / [`crate::io::AppIo`]
/// implementations, which are outside the core's control.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("network I/O failed: {0}")]
    Network(#[source] io::Error),

    #[error("application I/O failed: {0}")]
    App(#[source] io::Error),
}

//! The external interfaces the core consumes (spec.md §6): the
//! datagram send/recv primitives, the application-facing byte-stream
//! API, and the event multiplexer. All three are out of scope for this
//! crate's core and are expressed as traits so the state machine never
//! knows what transport or application it is attached to.

use std::time::Instant;

use crate::error::Error;

/// The lower-layer datagram service.
pub trait NetworkIo {
    /// Emit one segment, best-effort, no ordering/delivery guarantees.
    fn send(&mut self, segment: &[u8]) -> Result<(), Error>;

    /// Receive at most one segment into `buf`. Returns `Ok(None)` when
    /// nothing is pending right now — this primitive never blocks the
    /// loop (spec.md §5).
    fn recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, Error>;
}

/// The application-facing service.
pub trait AppIo {
    /// Drain up to `buf.len()` bytes the application has queued to
    /// send, copying them into `buf`. Returns the number copied.
    fn drain_outgoing(&mut self, buf: &mut [u8]) -> Result<usize, Error>;

    /// Deliver `bytes` to the application. Returns how many bytes the
    /// application accepted; the remainder stays staged for a later
    /// attempt.
    fn deliver(&mut self, bytes: &[u8]) -> Result<usize, Error>;

    /// The connection has become ESTABLISHED; unblock a pending open.
    fn unblock(&mut self);

    /// The peer has sent FIN; signal half-close to the application.
    fn notify_half_close(&mut self);
}

/// A bitset over the four wakeup reasons in spec.md §4.7. Modeled as a
/// plain flags wrapper, the way `nix::poll::PollFlags` is used
/// elsewhere in this codebase, rather than pulling in a bitflags crate
/// for four bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventMask(u8);

impl EventMask {
    pub const NONE: EventMask = EventMask(0);
    pub const NETWORK_DATA: EventMask = EventMask(1 << 0);
    pub const APP_DATA: EventMask = EventMask(1 << 1);
    pub const APP_CLOSE_REQUESTED: EventMask = EventMask(1 << 2);
    pub const TIMEOUT: EventMask = EventMask(1 << 3);

    pub fn contains(self, other: EventMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn with(self, other: EventMask) -> EventMask {
        EventMask(self.0 | other.0)
    }
}

impl std::ops::BitOr for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: EventMask) -> EventMask {
        self.with(rhs)
    }
}

/// The event multiplexer primitive (spec.md §6): block until one or
/// more of `interest` occur or `deadline` expires.
pub trait EventMux {
    fn wait(&mut self, interest: EventMask, deadline: Option<Instant>) -> EventMask;
}

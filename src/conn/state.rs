//! Connection states (spec.md §3). Deliberately smaller than full RFC
//! 9293: no CLOSING and no TIME_WAIT, since this variant has no
//! simultaneous-close reconciliation beyond best-effort and explicitly
//! drops the 2MSL wait (spec.md §4.6, §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Listen,
    SynSent,
    SynReceived,
    Established,
    FinWait1,
    FinWait2,
    CloseWait,
    LastAck,
    Closed,
}

/// Whether this connection's handshake was driven by an active open
/// (we sent the first SYN) or a passive one (we replied to a SYN).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Active,
    Passive,
}

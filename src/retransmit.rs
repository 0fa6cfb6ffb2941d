//! The retransmit queue and the Go-Back-N scheduler (spec.md §3, §4.4,
//! §4.5): an ordered set of unacknowledged outgoing segments, each with
//! a deadline and a retry counter.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// One in-flight segment. Owns its wire bytes by value — no raw
/// pointers into shared packet buffers (spec.md §9).
#[derive(Debug, Clone)]
pub struct Entry {
    pub seq: u32,
    pub ack_expected: u32,
    pub bytes: Vec<u8>,
    pub deadline: Instant,
    pub retries: u32,
    acked: bool,
}

/// What happened when a retransmit deadline was checked (spec.md §4.5).
pub enum Expiry {
    /// No entry's deadline has passed yet.
    NotYet,
    /// Retransmit the returned segments, in order (the expired entry
    /// and every later queued entry — Go-Back-N).
    Retransmit(Vec<Vec<u8>>),
    /// The expired entry hit `max_retries`; the connection is dead.
    GiveUp { seq: u32 },
}

#[derive(Debug, Default)]
pub struct RetransmitQueue {
    entries: VecDeque<Entry>,
}

impl RetransmitQueue {
    pub fn new() -> Self {
        RetransmitQueue::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Total payload+control bytes currently in flight, for the
    /// `in_flight_bytes <= snd_wnd` invariant.
    pub fn in_flight_seq_span(&self) -> u32 {
        self.entries
            .back()
            .map(|e| e.ack_expected.wrapping_sub(self.entries.front().unwrap().seq))
            .unwrap_or(0)
    }

    /// Enqueue a freshly transmitted segment.
    pub fn push(&mut self, seq: u32, ack_expected: u32, bytes: Vec<u8>, now: Instant, rto: Duration) {
        debug_assert!(self.entries.iter().all(|e| e.seq != seq));
        self.entries.push_back(Entry {
            seq,
            ack_expected,
            bytes,
            deadline: now + rto,
            retries: 0,
            acked: false,
        });
    }

    /// The earliest deadline among entries not yet acknowledged, i.e.
    /// the next timeout the event loop should wait on.
    pub fn earliest_deadline(&self) -> Option<Instant> {
        self.entries
            .iter()
            .filter(|e| !e.acked)
            .map(|e| e.deadline)
            .min()
    }

    /// Cumulative ACK processing (spec.md §4.4): find the entry whose
    /// `ack_expected == ack`, and mark it and every earlier-seq entry as
    /// acknowledged. An ACK that matches no entry's `ack_expected` is
    /// silently ignored. Returns `true` if anything was newly marked.
    pub fn ack(&mut self, ack: u32) -> bool {
        let Some(pos) = self.entries.iter().position(|e| e.ack_expected == ack) else {
            return false;
        };

        let mut changed = false;
        for entry in self.entries.iter_mut().take(pos + 1) {
            changed |= !entry.acked;
            entry.acked = true;
        }
        changed
    }

    /// Remove every acknowledged entry from the front of the queue.
    /// Called once per event-loop iteration (spec.md §4.4: "on the next
    /// event-loop iteration, acknowledged entries are removed").
    /// Returns the entries removed, so the caller can check whether a
    /// FIN or SYN it tagged was among them.
    pub fn sweep(&mut self) -> Vec<Entry> {
        let mut removed = vec![];
        while matches!(self.entries.front(), Some(e) if e.acked) {
            removed.push(self.entries.pop_front().unwrap());
        }
        removed
    }

    /// Check the earliest deadline against `now` and apply Go-Back-N
    /// (spec.md §4.5). `max_retries` is the configured retry ceiling.
    /// `terminal_leaning` is whether the connection is currently in
    /// CLOSED, LAST_ACK, FIN_WAIT_1, or FIN_WAIT_2 — spec.md §4.5 step 1
    /// considers the connection dead on *any* timeout in one of those
    /// states, not only once `retries` hits the ceiling.
    pub fn check_timeout(&mut self, now: Instant, rto: Duration, max_retries: u32, terminal_leaning: bool) -> Expiry {
        let Some(front) = self.entries.front() else {
            return Expiry::NotYet;
        };
        if front.acked || now < front.deadline {
            return Expiry::NotYet;
        }

        if terminal_leaning || front.retries >= max_retries {
            let seq = front.seq;
            self.entries.pop_front();
            return Expiry::GiveUp { seq };
        }

        self.entries[0].retries += 1;
        let mut retransmitted = vec![];
        for entry in self.entries.iter_mut() {
            if entry.acked {
                continue;
            }
            entry.deadline = now + rto;
            retransmitted.push(entry.bytes.clone());
        }
        Expiry::Retransmit(retransmitted)
    }
}

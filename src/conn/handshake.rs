//! The handshake driver (spec.md §4.1). Active open sends the initial
//! SYN from `Connection::connect`; this module covers what happens to
//! it, and LISTEN's passive-open reply.

use std::time::Instant;

use crate::io::{AppIo, NetworkIo};
use crate::wire::Segment;

use super::state::State;
use super::Connection;

impl Connection {
    /// Send the initial SYN (or, from LISTEN, the SYN half of SYN+ACK —
    /// `Connection::send` always sets the ACK bit once `rcv_nxt` is
    /// known, so the two cases share this one send path). Enqueued on
    /// the same retransmit queue as data: the resolved Open Question in
    /// SPEC_FULL.md §4.1 is that SYN is retransmitted, not special-cased.
    pub(super) fn send_syn(&mut self, net: &mut impl NetworkIo, now: Instant) {
        let seq = self.snd_nxt;
        self.send(net, seq, true, false, vec![], true, now);
        self.snd_nxt = self.snd_nxt.wrapping_add(1);
    }

    pub(super) fn handle_listen(&mut self, seg: &Segment, net: &mut impl NetworkIo, now: Instant) {
        if !seg.syn {
            log::trace!("port {}: LISTEN ignoring non-SYN segment", self.local_port);
            return;
        }

        self.rcv_nxt = seg.seq.wrapping_add(1);
        self.rcv_wnd_initial = self.cfg.local_recv_window;
        self.state = State::SynReceived;
        log::debug!("port {}: LISTEN -> SYN_RECEIVED", self.local_port);
        self.send_syn(net, now);
    }

    pub(super) fn handle_syn_sent(
        &mut self,
        seg: &Segment,
        net: &mut impl NetworkIo,
        app: &mut impl AppIo,
        now: Instant,
    ) {
        if seg.syn && seg.ack_flag && seg.ack == self.snd_nxt {
            self.retransmit.ack(seg.ack);
            self.snd_una = seg.ack;
            self.snd_wnd = seg.window.min(self.cfg.congestion_ceiling);
            self.rcv_nxt = seg.seq.wrapping_add(1);
            self.rcv_wnd_initial = self.cfg.local_recv_window;
            self.state = State::Established;
            log::debug!("port {}: SYN_SENT -> ESTABLISHED", self.local_port);
            self.send_ack(net, now);
            app.unblock();
            return;
        }

        if seg.syn && !seg.ack_flag {
            // Simultaneous open: our own SYN is already outstanding in
            // the retransmit queue, so only the ack we advertise needs
            // bringing up to date. Best-effort only (spec.md Non-goals).
            self.snd_wnd = seg.window.min(self.cfg.congestion_ceiling);
            self.rcv_nxt = seg.seq.wrapping_add(1);
            self.rcv_wnd_initial = self.cfg.local_recv_window;
            self.state = State::SynReceived;
            log::debug!(
                "port {}: SYN_SENT -> SYN_RECEIVED (simultaneous open)",
                self.local_port
            );
            self.send_ack(net, now);
            return;
        }

        log::trace!("port {}: SYN_SENT dropping unexpected segment", self.local_port);
    }
}

//! The receiver, ACK processor, and reorder-buffer drain (spec.md §4.3,
//! §4.4): everything that happens once a segment arrives in a state
//! past the handshake.

use std::time::Instant;

use crate::io::{AppIo, NetworkIo};
use crate::seq::{in_window, wrapping_lt};
use crate::wire::Segment;

use super::state::State;
use super::Connection;

impl Connection {
    /// SYN_RECEIVED only cares about the ACK that completes the
    /// handshake; anything else is dropped. If the completing segment
    /// also happens to carry data or a FIN, it's handed on to the same
    /// path ESTABLISHED segments take once the transition has landed.
    pub(super) fn handle_syn_received(
        &mut self,
        seg: &Segment,
        net: &mut impl NetworkIo,
        app: &mut impl AppIo,
        now: Instant,
    ) {
        if !(seg.ack_flag && seg.ack == self.snd_nxt) {
            log::trace!(
                "port {}: SYN_RECEIVED dropping segment that doesn't complete the handshake",
                self.local_port
            );
            return;
        }

        self.retransmit.ack(seg.ack);
        self.snd_una = seg.ack;
        self.snd_wnd = seg.window.min(self.cfg.congestion_ceiling);
        self.state = State::Established;
        log::debug!("port {}: SYN_RECEIVED -> ESTABLISHED", self.local_port);
        app.unblock();

        if !seg.payload.is_empty() || seg.fin {
            self.handle_established_like(seg, net, app, now);
        }
    }

    /// The shared path for ESTABLISHED, FIN_WAIT_1, FIN_WAIT_2,
    /// CLOSE_WAIT and LAST_ACK: window update, ACK processing, then
    /// classification into the five cases of spec.md §4.3.
    pub(super) fn handle_established_like(
        &mut self,
        seg: &Segment,
        net: &mut impl NetworkIo,
        app: &mut impl AppIo,
        now: Instant,
    ) {
        self.snd_wnd = seg.window.min(self.cfg.congestion_ceiling);

        if seg.ack_flag {
            self.retransmit.ack(seg.ack);
        }

        if seg.is_pure_ack() {
            log::trace!("port {}: pure ack, ack={}", self.local_port, seg.ack);
            return;
        }

        if wrapping_lt(seg.seq, self.rcv_nxt) {
            // Already delivered; the peer likely missed our ack.
            log::trace!(
                "port {}: stale segment seq={} behind rcv_nxt={}",
                self.local_port,
                seg.seq,
                self.rcv_nxt
            );
            self.send_ack(net, now);
            return;
        }

        if seg.seq != self.rcv_nxt {
            if !in_window(seg.seq, self.rcv_nxt, self.rcv_wnd as u32) {
                // Beyond the right edge of the advertised window
                // (spec.md §8 boundary test: seq == rcv_nxt + rcv_wnd is
                // discarded). Re-announce our window so the peer backs off.
                log::trace!(
                    "port {}: segment seq={} outside advertised window (rcv_nxt={}, rcv_wnd={})",
                    self.local_port,
                    seg.seq,
                    self.rcv_nxt,
                    self.rcv_wnd
                );
                self.send_ack(net, now);
                return;
            }
            if self.reorder.contains(seg.seq) {
                log::trace!("port {}: duplicate out-of-order segment seq={}", self.local_port, seg.seq);
            } else {
                log::trace!("port {}: buffering out-of-order segment seq={}", self.local_port, seg.seq);
                self.reorder.insert(seg.seq, seg.payload.clone());
                self.rcv_wnd = self.inbound_window();
            }
            self.send_ack(net, now);
            return;
        }

        self.deliver_in_order(seg.payload.clone(), seg.fin, app);

        while let Some(payload) = self.reorder.pop_if_expected(self.rcv_nxt) {
            self.deliver_in_order(payload, false, app);
        }

        self.rcv_wnd = self.inbound_window();
        self.send_ack(net, now);

        if seg.fin {
            self.on_fin_received(app);
        }
    }

    fn deliver_in_order(&mut self, payload: Vec<u8>, fin: bool, app: &mut impl AppIo) {
        let advance = payload.len() as u32 + fin as u32;
        if !payload.is_empty() {
            match app.deliver(&payload) {
                Ok(n) if n == payload.len() => {}
                Ok(n) => log::warn!(
                    "port {}: application accepted only {n} of {} delivered bytes",
                    self.local_port,
                    payload.len()
                ),
                Err(err) => log::warn!("port {}: app delivery failed: {err}", self.local_port),
            }
        }
        self.rcv_nxt = self.rcv_nxt.wrapping_add(advance);
    }

    /// The advertised window: the initial allowance minus whatever the
    /// reorder buffer is currently holding back from the application
    /// (spec.md §3: `rcv_wnd` tracks space remaining in the inbound
    /// staging region).
    fn inbound_window(&self) -> u16 {
        let consumed = self.reorder.buffered_bytes().min(self.rcv_wnd_initial as usize);
        self.rcv_wnd_initial.saturating_sub(consumed as u16)
    }
}

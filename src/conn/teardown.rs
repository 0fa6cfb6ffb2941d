//! The teardown driver (spec.md §4.6): the four-way FIN close, minus
//! TIME_WAIT (documented simplification, SPEC_FULL.md §9).

use std::time::Instant;

use crate::io::{AppIo, NetworkIo};
use crate::seq::wrapping_le;

use super::state::State;
use super::Connection;

impl Connection {
    /// Application-requested close: send a FIN if we haven't already
    /// and move to the appropriate half-closed state.
    pub(super) fn try_send_fin(&mut self, net: &mut impl NetworkIo, now: Instant) {
        if self.fin_seq.is_some() {
            return;
        }

        let next_state = match self.state {
            State::Established => State::FinWait1,
            State::CloseWait => State::LastAck,
            _ => return,
        };

        let seq = self.snd_nxt;
        self.fin_seq = Some(seq);
        self.snd_nxt = self.snd_nxt.wrapping_add(1);
        self.send(net, seq, false, true, vec![], true, now);

        log::debug!("port {}: {:?} -> {:?}", self.local_port, self.state, next_state);
        self.state = next_state;
    }

    /// The peer's FIN arrived in order (its sequence number has already
    /// been folded into `rcv_nxt` by the receiver).
    pub(super) fn on_fin_received(&mut self, app: &mut impl AppIo) {
        match self.state {
            State::Established => {
                log::debug!("port {}: ESTABLISHED -> CLOSE_WAIT", self.local_port);
                self.state = State::CloseWait;
                app.notify_half_close();
            }
            State::FinWait1 | State::FinWait2 => {
                log::debug!("port {}: {:?} -> CLOSED (peer fin)", self.local_port, self.state);
                self.state = State::Closed;
                self.done = true;
            }
            _ => {}
        }
    }

    /// Called after every retransmit-queue sweep: check whether our own
    /// outstanding FIN has just been acknowledged, and if so apply the
    /// transition it triggers.
    pub(super) fn apply_fin_ack_transition(&mut self) {
        let Some(fin_seq) = self.fin_seq else { return };
        let fin_ack = fin_seq.wrapping_add(1);
        if !wrapping_le(fin_ack, self.snd_una) {
            return;
        }

        match self.state {
            State::FinWait1 => {
                log::debug!("port {}: FIN_WAIT_1 -> FIN_WAIT_2", self.local_port);
                self.state = State::FinWait2;
            }
            State::LastAck => {
                log::debug!("port {}: LAST_ACK -> CLOSED", self.local_port);
                self.state = State::Closed;
                self.done = true;
            }
            _ => {}
        }
    }
}

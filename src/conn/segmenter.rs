//! The segmenter / sender (spec.md §4.2): turns queued application
//! bytes into outbound segments respecting the send window.

use std::time::Instant;

use crate::io::NetworkIo;

use super::Connection;

impl Connection {
    /// Chop as much of `send_staging` as the window allows into
    /// `max_payload()`-sized segments and transmit them, advancing
    /// `snd_nxt` and enqueuing each for Go-Back-N.
    pub(super) fn segment_and_send(&mut self, net: &mut impl NetworkIo, now: Instant) {
        let max_payload = self.cfg.max_payload();

        loop {
            if self.send_staging.is_empty() {
                break;
            }

            let in_flight = self.retransmit.in_flight_seq_span();
            let window = self.snd_wnd as u32;
            let available = window.saturating_sub(in_flight) as usize;
            if available == 0 {
                break;
            }

            let chunk_len = max_payload.min(available).min(self.send_staging.len());
            if chunk_len == 0 {
                break;
            }

            let chunk: Vec<u8> = self.send_staging.drain(..chunk_len).collect();
            let seq = self.snd_nxt;
            self.snd_nxt = self.snd_nxt.wrapping_add(chunk_len as u32);
            self.send(net, seq, false, false, chunk, true, now);
        }
    }
}

//! The event loop (spec.md §4.7): sweep, compute the next deadline,
//! wait for one of the four wakeup reasons, dispatch, repeat.

use std::time::Instant;

use crate::conn::Connection;
use crate::io::{AppIo, EventMask, EventMux, NetworkIo};

/// Drive `conn` to completion against the three injected collaborators.
/// Returns once `conn.is_done()` — there is nothing left for the
/// connection to do, either because it reached CLOSED cleanly or
/// because it was abandoned after exhausting retries (spec.md §7).
pub fn run(
    conn: &mut Connection,
    net: &mut impl NetworkIo,
    app: &mut impl AppIo,
    mux: &mut impl EventMux,
) {
    let mut recv_buf = [0u8; 2048];

    while !conn.is_done() {
        conn.sweep();
        if conn.is_done() {
            break;
        }

        let deadline = conn.next_deadline();
        let interest = EventMask::NETWORK_DATA
            .with(EventMask::APP_DATA)
            .with(EventMask::APP_CLOSE_REQUESTED)
            .with(EventMask::TIMEOUT);

        let ready = mux.wait(interest, deadline);
        let now = Instant::now();

        if ready.contains(EventMask::NETWORK_DATA) {
            while let Some(n) = net.recv(&mut recv_buf).unwrap_or(None) {
                conn.on_segment(&recv_buf[..n], net, app, now);
            }
        }

        if ready.contains(EventMask::APP_DATA) {
            conn.on_app_data(net, app, now);
        }

        if ready.contains(EventMask::APP_CLOSE_REQUESTED) {
            conn.on_app_close(net, now);
        }

        if ready.contains(EventMask::TIMEOUT) {
            conn.on_timeout(net, now);
        }

        if ready.is_empty() && deadline.is_some_and(|d| Instant::now() >= d) {
            // The mux returned nothing pending but the deadline has
            // already passed (e.g. a zero-wait poll implementation);
            // treat it as a timeout so retransmission still makes
            // progress.
            conn.on_timeout(net, now);
        }
    }
}

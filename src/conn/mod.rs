//! The per-connection STCP state machine (spec.md §2-§5): the
//! connection context plus the handshake, segmenter, receiver,
//! retransmit, and teardown logic that operate on it.

mod handshake;
mod receiver;
mod segmenter;
mod teardown;

pub mod state;

use std::collections::VecDeque;
use std::time::Instant;

use rand::Rng;

use crate::config::Config;
use crate::reorder::ReorderBuffer;
use crate::retransmit::RetransmitQueue;

pub use state::{Kind, State};

/// The connection context (spec.md §3): every piece of state a single
/// STCP connection owns, exclusively, for its lifetime. No locks are
/// required anywhere in this type because only the owning event loop
/// ever gets a `&mut Connection` (spec.md §5).
#[derive(Debug)]
pub struct Connection {
    pub(crate) cfg: Config,
    pub(crate) kind: Kind,
    pub(crate) state: State,
    pub(crate) done: bool,

    pub(crate) local_port: u16,
    pub(crate) remote_port: u16,

    pub(crate) iss: u32,
    pub(crate) snd_una: u32,
    pub(crate) snd_nxt: u32,
    pub(crate) snd_wnd: u16,

    pub(crate) rcv_nxt: u32,
    pub(crate) rcv_wnd: u16,
    /// Set once, when LISTEN first learns the peer's initial sequence
    /// number; used only to size the reorder buffer's acceptance window
    /// (spec.md §3: "every entry has seq in (rcv_nxt, rcv_nxt +
    /// rcv_wnd_initial]").
    pub(crate) rcv_wnd_initial: u16,

    pub(crate) retransmit: RetransmitQueue,
    pub(crate) reorder: ReorderBuffer,

    /// Bytes pulled from the application, not yet segmented and sent.
    pub(crate) send_staging: VecDeque<u8>,
    /// Bytes decoded off the wire, not yet accepted by the application.
    pub(crate) recv_staging: VecDeque<u8>,

    /// Set to the seq our own FIN occupies once we've sent one, so the
    /// teardown driver can recognize when it has been acknowledged.
    pub(crate) fin_seq: Option<u32>,
    pub(crate) close_requested: bool,
}

impl Connection {
    fn initial_seq(cfg: &Config) -> u32 {
        if cfg.deterministic_iss {
            1
        } else {
            rand::thread_rng().gen_range(0..=255)
        }
    }

    /// Passive open: start in LISTEN, awaiting an incoming SYN.
    pub fn listen(cfg: Config, local_port: u16, remote_port: u16) -> Connection {
        let iss = Connection::initial_seq(&cfg);
        Connection {
            kind: Kind::Passive,
            state: State::Listen,
            done: false,
            local_port,
            remote_port,
            iss,
            snd_una: iss,
            snd_nxt: iss,
            snd_wnd: 0,
            rcv_nxt: 0,
            rcv_wnd: cfg.local_recv_window,
            rcv_wnd_initial: cfg.local_recv_window,
            retransmit: RetransmitQueue::new(),
            reorder: ReorderBuffer::new(),
            send_staging: VecDeque::new(),
            recv_staging: VecDeque::new(),
            fin_seq: None,
            close_requested: false,
            cfg,
        }
    }

    /// Active open: start in SYN_SENT and send the initial SYN.
    pub fn connect(
        cfg: Config,
        local_port: u16,
        remote_port: u16,
        net: &mut impl crate::io::NetworkIo,
        now: Instant,
    ) -> Connection {
        let iss = Connection::initial_seq(&cfg);
        let mut conn = Connection {
            kind: Kind::Active,
            state: State::SynSent,
            done: false,
            local_port,
            remote_port,
            iss,
            snd_una: iss,
            snd_nxt: iss,
            snd_wnd: 0,
            rcv_nxt: 0,
            rcv_wnd: cfg.local_recv_window,
            rcv_wnd_initial: cfg.local_recv_window,
            retransmit: RetransmitQueue::new(),
            reorder: ReorderBuffer::new(),
            send_staging: VecDeque::new(),
            recv_staging: VecDeque::new(),
            fin_seq: None,
            close_requested: false,
            cfg,
        };
        conn.send_syn(net, now);
        conn
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn is_established(&self) -> bool {
        self.state == State::Established
    }

    /// The soonest deadline the event loop should wait on, or `None` if
    /// nothing is currently in flight (spec.md §4.7 step 2).
    pub fn next_deadline(&self) -> Option<Instant> {
        self.retransmit.earliest_deadline()
    }

    /// Build a segment carrying the connection's current ack/window
    /// fields, send it, and — unless `retransmissible` is `false` (pure
    /// ACKs are never queued; spec.md's retransmit queue only ever
    /// holds segments that consume sequence space) — enqueue it for
    /// Go-Back-N.
    fn send(
        &mut self,
        net: &mut impl crate::io::NetworkIo,
        seq: u32,
        syn: bool,
        fin: bool,
        payload: Vec<u8>,
        retransmissible: bool,
        now: Instant,
    ) {
        let seg = crate::wire::Segment {
            src_port: self.local_port,
            dst_port: self.remote_port,
            seq,
            ack: self.rcv_nxt,
            syn,
            fin,
            ack_flag: true,
            window: self.rcv_wnd,
            payload,
        };
        let bytes = seg.encode();

        log::trace!(
            "port {} -> {}: seq={} ack={} syn={} fin={} len={}",
            self.local_port,
            self.remote_port,
            seq,
            self.rcv_nxt,
            syn,
            fin,
            seg.payload.len()
        );

        if let Err(err) = net.send(&bytes) {
            log::warn!("port {}: network send failed: {err}", self.local_port);
            return;
        }

        if retransmissible {
            let ack_expected = seq.wrapping_add(seg.seq_len());
            self.retransmit.push(seq, ack_expected, bytes, now, self.cfg.rto);
        }
    }

    /// Emit a bare cumulative ACK for the current `rcv_nxt` (used
    /// whenever the receiver needs to re-announce state without
    /// consuming new sequence space).
    fn send_ack(&mut self, net: &mut impl crate::io::NetworkIo, now: Instant) {
        self.send(net, self.snd_nxt, false, false, vec![], false, now);
    }

    fn abandon(&mut self) {
        log::warn!(
            "port {} <-> {}: abandoning connection in state {:?} after exhausting retries",
            self.local_port, self.remote_port, self.state
        );
        self.state = State::Closed;
        self.done = true;
    }

    /// Dispatch one inbound segment (spec.md §4.7 step 4, NETWORK_DATA
    /// branch). Decode failures are silently dropped, as required of
    /// any protocol-level anomaly (spec.md §7).
    pub fn on_segment(
        &mut self,
        bytes: &[u8],
        net: &mut impl crate::io::NetworkIo,
        app: &mut impl crate::io::AppIo,
        now: Instant,
    ) {
        let seg = match crate::wire::Segment::decode(bytes) {
            Ok(seg) => seg,
            Err(err) => {
                log::warn!("port {}: dropping unparseable segment: {err}", self.local_port);
                return;
            }
        };

        match self.state {
            State::Listen => self.handle_listen(&seg, net, now),
            State::SynSent => self.handle_syn_sent(&seg, net, app, now),
            State::SynReceived => self.handle_syn_received(&seg, net, app, now),
            State::Closed => {}
            _ => self.handle_established_like(&seg, net, app, now),
        }
    }

    /// Drive APP_DATA: pull whatever the application has queued and
    /// hand it to the segmenter (spec.md §4.7 step 4, APP_DATA branch).
    pub fn on_app_data(
        &mut self,
        net: &mut impl crate::io::NetworkIo,
        app: &mut impl crate::io::AppIo,
        now: Instant,
    ) {
        if !matches!(
            self.state,
            State::Established | State::CloseWait
        ) {
            return;
        }

        let mut buf = [0u8; 4096];
        loop {
            let available = self.send_staging_capacity();
            if available == 0 {
                break;
            }
            let to_pull = available.min(buf.len());
            let n = match app.drain_outgoing(&mut buf[..to_pull]) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) => {
                    log::warn!("port {}: app drain failed: {err}", self.local_port);
                    break;
                }
            };
            self.send_staging.extend(&buf[..n]);
        }

        self.segment_and_send(net, now);
    }

    /// Drive APP_CLOSE_REQUESTED (spec.md §4.6).
    pub fn on_app_close(&mut self, net: &mut impl crate::io::NetworkIo, now: Instant) {
        self.close_requested = true;
        self.try_send_fin(net, now);
    }

    /// Whether this connection's state is one spec.md §4.5 step 1 treats
    /// as "terminal-leaning": a timeout here abandons the connection
    /// outright, regardless of how many retries the expired entry has
    /// accumulated so far.
    fn is_terminal_leaning(&self) -> bool {
        matches!(
            self.state,
            State::Closed | State::LastAck | State::FinWait1 | State::FinWait2
        )
    }

    /// Drive TIMEOUT (spec.md §4.5).
    pub fn on_timeout(&mut self, net: &mut impl crate::io::NetworkIo, now: Instant) {
        use crate::retransmit::Expiry;

        let terminal_leaning = self.is_terminal_leaning();
        match self
            .retransmit
            .check_timeout(now, self.cfg.rto, self.cfg.max_retries, terminal_leaning)
        {
            Expiry::NotYet => {}
            Expiry::GiveUp { seq } => {
                if terminal_leaning {
                    log::warn!(
                        "port {}: giving up on seq {seq}: timeout while in terminal-leaning state {:?}",
                        self.local_port,
                        self.state
                    );
                } else {
                    log::warn!("port {}: giving up on seq {seq} after max retries", self.local_port);
                }
                self.abandon();
            }
            Expiry::Retransmit(segments) => {
                log::debug!(
                    "port {}: retransmitting {} segment(s) (go-back-n)",
                    self.local_port,
                    segments.len()
                );
                for bytes in segments {
                    if let Err(err) = net.send(&bytes) {
                        log::warn!("port {}: retransmit send failed: {err}", self.local_port);
                    }
                }
            }
        }
    }

    /// Sweep the retransmit queue and apply any state transitions the
    /// newly-removed entries trigger (spec.md §4.7 step 1). Must be
    /// called once at the top of every event loop iteration.
    pub fn sweep(&mut self) {
        let removed = self.retransmit.sweep();
        if removed.is_empty() {
            return;
        }
        self.snd_una = removed
            .last()
            .map(|e| e.ack_expected)
            .unwrap_or(self.snd_una);
        self.apply_fin_ack_transition();
    }

    fn send_staging_capacity(&self) -> usize {
        (self.cfg.local_recv_window as usize).saturating_sub(self.send_staging.len())
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use crate::config::Config;
    use crate::io::test_support::{BufferedApp, LoopbackNetwork};
    use crate::io::NetworkIo;

    use super::{Connection, State};

    fn pump(net: &mut LoopbackNetwork, conn: &mut Connection, app: &mut BufferedApp, now: Instant) {
        let mut buf = [0u8; 2048];
        loop {
            let n = match net.recv(&mut buf).unwrap() {
                Some(n) => n,
                None => break,
            };
            conn.on_segment(&buf[..n], net, app, now);
        }
    }

    fn handshake() -> (Connection, Connection, LoopbackNetwork, LoopbackNetwork, BufferedApp, BufferedApp) {
        let now = Instant::now();
        let (mut net_a, mut net_b) = LoopbackNetwork::pair();
        let mut app_a = BufferedApp::default();
        let mut app_b = BufferedApp::default();

        let mut a = Connection::connect(Config::deterministic(), 1000, 2000, &mut net_a, now);
        let mut b = Connection::listen(Config::deterministic(), 2000, 1000);

        pump(&mut net_b, &mut b, &mut app_b, now);
        pump(&mut net_a, &mut a, &mut app_a, now);
        pump(&mut net_b, &mut b, &mut app_b, now);
        a.sweep();
        b.sweep();

        (a, b, net_a, net_b, app_a, app_b)
    }

    #[test]
    fn active_and_passive_open_both_reach_established() {
        let (a, b, _net_a, _net_b, app_a, app_b) = handshake();

        assert_eq!(a.state(), State::Established);
        assert_eq!(b.state(), State::Established);
        assert!(app_a.unblocked);
        assert!(app_b.unblocked);
    }

    #[test]
    fn data_written_by_one_side_is_delivered_to_the_other_in_order() {
        let (mut a, mut b, mut net_a, mut net_b, mut app_a, mut app_b) = handshake();
        let now = Instant::now();

        app_a.to_send.extend(b"hello, stcp".iter());
        a.on_app_data(&mut net_a, &mut app_a, now);
        pump(&mut net_b, &mut b, &mut app_b, now);
        pump(&mut net_a, &mut a, &mut app_a, now);

        assert_eq!(app_b.received.iter().copied().collect::<Vec<u8>>(), b"hello, stcp");
    }

    #[test]
    fn dropped_segment_is_recovered_by_go_back_n_retransmission() {
        let (mut a, mut b, mut net_a, mut net_b, mut app_a, mut app_b) = handshake();
        let now = Instant::now();

        net_a.drop_next_sends(1);
        app_a.to_send.extend(b"lost then found".iter());
        a.on_app_data(&mut net_a, &mut app_a, now);

        // The segment never reached net_b; nothing to pump yet.
        assert_eq!(net_b.pending(), 0);

        let later = now + Duration::from_secs(2);
        a.on_timeout(&mut net_a, later);

        pump(&mut net_b, &mut b, &mut app_b, later);
        pump(&mut net_a, &mut a, &mut app_a, later);

        assert_eq!(app_b.received.iter().copied().collect::<Vec<u8>>(), b"lost then found");
    }

    #[test]
    fn application_requested_close_drives_both_sides_to_closed() {
        let (mut a, mut b, mut net_a, mut net_b, mut app_a, mut app_b) = handshake();
        let now = Instant::now();

        a.on_app_close(&mut net_a, now);
        assert_eq!(a.state(), State::FinWait1);

        pump(&mut net_b, &mut b, &mut app_b, now);
        assert_eq!(b.state(), State::CloseWait);
        assert!(app_b.half_closed);

        pump(&mut net_a, &mut a, &mut app_a, now);
        a.sweep();
        assert_eq!(a.state(), State::FinWait2);

        b.on_app_close(&mut net_b, now);
        assert_eq!(b.state(), State::LastAck);

        pump(&mut net_a, &mut a, &mut app_a, now);
        a.sweep();
        assert_eq!(a.state(), State::Closed);
        assert!(a.is_done());

        pump(&mut net_b, &mut b, &mut app_b, now);
        b.sweep();
        assert_eq!(b.state(), State::Closed);
        assert!(b.is_done());
    }

    #[test]
    fn unresponsive_peer_is_abandoned_after_max_retries() {
        let now = Instant::now();
        let (mut net_a, _net_b) = LoopbackNetwork::pair();

        let mut a = Connection::connect(Config::deterministic(), 1000, 2000, &mut net_a, now);
        assert!(!a.is_done());

        let cfg = Config::deterministic();
        let mut t = now;
        for _ in 0..=cfg.max_retries {
            t += cfg.rto + Duration::from_millis(1);
            a.on_timeout(&mut net_a, t);
        }

        assert!(a.is_done());
        assert_eq!(a.state(), State::Closed);
    }
}

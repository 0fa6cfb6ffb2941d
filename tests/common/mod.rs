//! Shared harness for the integration tests: an in-memory loopback
//! `NetworkIo` pair and a `VecDeque`-backed `AppIo`, built against the
//! crate's public trait surface the same way a real caller would.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Instant;

use stcp::{AppIo, Connection, Error, NetworkIo};

#[derive(Default)]
struct Wire {
    segments: VecDeque<Vec<u8>>,
}

pub struct LoopbackNetwork {
    outbound: Rc<RefCell<Wire>>,
    inbound: Rc<RefCell<Wire>>,
    drop_next: usize,
}

impl LoopbackNetwork {
    pub fn pair() -> (LoopbackNetwork, LoopbackNetwork) {
        let a_to_b = Rc::new(RefCell::new(Wire::default()));
        let b_to_a = Rc::new(RefCell::new(Wire::default()));

        (
            LoopbackNetwork { outbound: a_to_b.clone(), inbound: b_to_a.clone(), drop_next: 0 },
            LoopbackNetwork { outbound: b_to_a, inbound: a_to_b, drop_next: 0 },
        )
    }

    pub fn drop_next_sends(&mut self, n: usize) {
        self.drop_next = n;
    }

    pub fn pending(&self) -> usize {
        self.inbound.borrow().segments.len()
    }

    /// Push raw wire bytes directly onto this end's inbound queue, as
    /// if the peer (or a network duplicating/injecting traffic) had
    /// sent them.
    pub fn inject(&mut self, bytes: Vec<u8>) {
        self.inbound.borrow_mut().segments.push_back(bytes);
    }
}

impl NetworkIo for LoopbackNetwork {
    fn send(&mut self, segment: &[u8]) -> Result<(), Error> {
        if self.drop_next > 0 {
            self.drop_next -= 1;
            return Ok(());
        }
        self.outbound.borrow_mut().segments.push_back(segment.to_vec());
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, Error> {
        let mut wire = self.inbound.borrow_mut();
        match wire.segments.pop_front() {
            Some(bytes) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(Some(n))
            }
            None => Ok(None),
        }
    }
}

#[derive(Default)]
pub struct BufferedApp {
    pub to_send: VecDeque<u8>,
    pub received: VecDeque<u8>,
    pub unblocked: bool,
    pub half_closed: bool,
}

impl AppIo for BufferedApp {
    fn drain_outgoing(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let n = self.to_send.len().min(buf.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.to_send.pop_front().unwrap();
        }
        Ok(n)
    }

    fn deliver(&mut self, bytes: &[u8]) -> Result<usize, Error> {
        self.received.extend(bytes.iter());
        Ok(bytes.len())
    }

    fn unblock(&mut self) {
        self.unblocked = true;
    }

    fn notify_half_close(&mut self) {
        self.half_closed = true;
    }
}

/// Drain every segment currently pending on `net` into `conn`.
pub fn pump(net: &mut LoopbackNetwork, conn: &mut Connection, app: &mut BufferedApp, now: Instant) {
    let mut buf = [0u8; 2048];
    loop {
        let n = match net.recv(&mut buf).unwrap() {
            Some(n) => n,
            None => break,
        };
        conn.on_segment(&buf[..n], net, app, now);
    }
}

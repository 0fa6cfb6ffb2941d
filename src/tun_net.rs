//! A `NetworkIo`/`EventMux` pair backed by a real TUN device, for the
//! demo binaries. Not part of the protocol core: STCP's own segments
//! have no notion of IP addressing, so this module wraps each outbound
//! segment in a bare IPv4 header and strips it again on the way in,
//! the same way the prior iteration of this codebase's `ioutil`
//! helpers built headers with `etherparse`.

use std::io::{Read, Write};
use std::net::Ipv4Addr;
use std::os::fd::AsRawFd;
use std::time::Instant;

use etherparse::{Ipv4Header, Ipv4HeaderSlice};
use nix::poll::{poll, PollFd, PollFlags};
use tidy_tuntap::Tun;

use crate::error::Error;
use crate::io::{EventMask, EventMux, NetworkIo};

const TCP_PROTOCOL: u8 = 6;
const DEFAULT_TTL: u8 = 64;

/// One STCP peer's view of a TUN device: fixed local/remote IPv4
/// addresses, everything else is left to the caller (port numbers live
/// in the STCP header itself).
pub struct TunNetwork {
    tun: Tun,
    local_addr: Ipv4Addr,
    remote_addr: Ipv4Addr,
}

impl TunNetwork {
    pub fn new(device: &str, local_addr: Ipv4Addr, netmask: Ipv4Addr, remote_addr: Ipv4Addr) -> Result<Self, Error> {
        let tun = Tun::new(device, false)
            .map_err(|e| Error::Network(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        tun.set_addr(local_addr)
            .map_err(|e| Error::Network(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        tun.set_netmask(netmask)
            .map_err(|e| Error::Network(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        tun.bring_up()
            .map_err(|e| Error::Network(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;

        Ok(TunNetwork { tun, local_addr, remote_addr })
    }

    pub fn raw_fd(&self) -> std::os::fd::RawFd {
        self.tun.as_raw_fd()
    }
}

impl NetworkIo for TunNetwork {
    fn send(&mut self, segment: &[u8]) -> Result<(), Error> {
        let mut header = Ipv4Header::new(segment.len() as u16, DEFAULT_TTL, TCP_PROTOCOL, self.local_addr.octets(), self.remote_addr.octets());
        header.checksum = header.calc_checksum_ipv4().unwrap_or(0);

        let mut out = Vec::with_capacity(header.header_len() as usize + segment.len());
        header
            .write(&mut out)
            .map_err(|e| Error::Network(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        out.extend_from_slice(segment);

        self.tun
            .write(&out)
            .map_err(|e| Error::Network(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, Error> {
        let mut frame = [0u8; 2048];
        let n = match self.tun.read(&mut frame) {
            Ok(n) => n,
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) => return Err(Error::Network(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))),
        };

        let Ok(ip) = Ipv4HeaderSlice::from_slice(&frame[..n]) else {
            return Ok(None);
        };
        if ip.protocol() != TCP_PROTOCOL {
            return Ok(None);
        }

        let payload = &frame[ip.slice().len()..n];
        let copy = payload.len().min(buf.len());
        buf[..copy].copy_from_slice(&payload[..copy]);
        Ok(Some(copy))
    }
}

/// An `EventMux` driven by a single `poll(2)` call on the TUN fd, with
/// the deadline translated into poll's millisecond timeout. Application
/// wakeups arrive over the channel-backed `AppIo` used by the demo
/// binaries, so this mux always also reports `APP_DATA`/
/// `APP_CLOSE_REQUESTED` interest as ready — the connection itself
/// decides whether there's actually anything to do.
pub struct PollMux {
    fd: std::os::fd::RawFd,
}

impl PollMux {
    pub fn new(fd: std::os::fd::RawFd) -> Self {
        PollMux { fd }
    }
}

impl EventMux for PollMux {
    fn wait(&mut self, interest: EventMask, deadline: Option<Instant>) -> EventMask {
        let timeout_ms: i32 = match deadline {
            Some(d) => {
                let now = Instant::now();
                if d <= now {
                    0
                } else {
                    d.duration_since(now).as_millis().min(i32::MAX as u128) as i32
                }
            }
            None => -1,
        };

        let mut pfd = [PollFd::new(self.fd, PollFlags::POLLIN)];
        let mut ready = EventMask::NONE;

        match poll(&mut pfd, timeout_ms) {
            Ok(0) => ready = ready.with(EventMask::TIMEOUT),
            Ok(_) => {
                if pfd[0].revents().map(|f| f.contains(PollFlags::POLLIN)).unwrap_or(false) {
                    ready = ready.with(EventMask::NETWORK_DATA);
                }
            }
            Err(_) => ready = ready.with(EventMask::TIMEOUT),
        }

        if interest.contains(EventMask::APP_DATA) {
            ready = ready.with(EventMask::APP_DATA);
        }
        if interest.contains(EventMask::APP_CLOSE_REQUESTED) {
            ready = ready.with(EventMask::APP_CLOSE_REQUESTED);
        }

        ready
    }
}

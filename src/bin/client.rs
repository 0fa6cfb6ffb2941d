use std::io::{self, Write};
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use stcp::event_loop;
use stcp::io::AppIo;
use stcp::tun_net::{PollMux, TunNetwork};
use stcp::{Config, Connection, Error};

struct ConsoleApp {
    outgoing: mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
}

impl AppIo for ConsoleApp {
    fn drain_outgoing(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        while self.pending.is_empty() {
            match self.outgoing.try_recv() {
                Ok(chunk) => self.pending = chunk,
                Err(mpsc::TryRecvError::Empty) => return Ok(0),
                Err(mpsc::TryRecvError::Disconnected) => return Ok(0),
            }
        }
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }

    fn deliver(&mut self, bytes: &[u8]) -> Result<usize, Error> {
        io::stdout().write_all(bytes).map_err(Error::App)?;
        Ok(bytes.len())
    }

    fn unblock(&mut self) {
        println!(">>> connected");
    }

    fn notify_half_close(&mut self) {
        println!(">>> peer closed its half of the connection");
    }
}

fn main() {
    let mut net = TunNetwork::new(
        "tun0",
        Ipv4Addr::from_str("10.10.10.20").unwrap(),
        Ipv4Addr::from_str("255.255.255.0").unwrap(),
        Ipv4Addr::from_str("10.10.10.10").unwrap(),
    )
    .expect("failed to bring up tun0");

    let mut mux = PollMux::new(net.raw_fd());

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        loop {
            let mut line = String::new();
            if stdin.read_line(&mut line).unwrap_or(0) == 0 {
                break;
            }
            if tx.send(line.into_bytes()).is_err() {
                break;
            }
        }
    });
    let mut app = ConsoleApp { outgoing: rx, pending: vec![] };

    println!(">>> connecting to 10.10.10.10:9090...");
    let mut conn = Connection::connect(Config::default(), 34343, 9090, &mut net, Instant::now());

    event_loop::run(&mut conn, &mut net, &mut app, &mut mux);

    println!(">>> connection closed in state {:?}", conn.state());
}

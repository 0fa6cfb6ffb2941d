//! STCP: a user-space reliable byte-stream transport over an unreliable
//! datagram service. Three-way handshake, sliding-window flow control,
//! cumulative ACK, Go-Back-N retransmission on a fixed timeout, and a
//! four-way FIN teardown — a deliberately smaller RFC 9293 subset, with
//! no checksums, no options, no congestion avoidance beyond a fixed
//! ceiling.
//!
//! The core is [`conn::Connection`], a single-threaded per-connection
//! state machine. It owns no transport and no application buffer of its
//! own: those live behind the [`io::NetworkIo`] and [`io::AppIo`]
//! traits, and [`event_loop::run`] is what actually drives a connection
//! against real implementations of them.

pub mod config;
pub mod conn;
pub mod error;
pub mod event_loop;
pub mod io;
pub mod reorder;
pub mod retransmit;
pub mod seq;
pub mod tun_net;
pub mod wire;

pub use config::Config;
pub use conn::{Connection, Kind, State};
pub use error::Error;
pub use io::{AppIo, EventMask, EventMux, NetworkIo};

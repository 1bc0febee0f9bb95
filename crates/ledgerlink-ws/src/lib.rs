//! ledgerlink-ws — WebSocket event-stream socket.
//!
//! # Features
//! - Connects the push channel and subscribes to new heads
//! - Forwards typed [`ledgerlink_core::SocketEvent`]s over a channel
//! - Answers server pings
//! - Reports a dead socket exactly once and stops; it never reconnects
//!   on its own (the connection supervisor owns recovery)

pub mod socket;

pub use socket::open_event_stream;

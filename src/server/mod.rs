//! The connection-facing half of the crate: the wire codec and the
//! per-connection request loop.
//!
//! `wire` turns the byte stream into request parts and response parts back
//! into bytes; `conn` drives the read → route → dispatch → write cycle for
//! one socket, one request at a time, under a read deadline.

pub mod conn;
pub mod wire;

pub use conn::{handle_client, Socket};

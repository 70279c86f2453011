//! WebSocket relay that fans every inbound message out to all connected
//! peers, handing one randomly chosen peer per round a `"WHITE"` marker
//! instead of the relayed payload.
//!
//! Each module focuses on a concrete responsibility:
//!
//! - [`registry`] owns the set of live connections and the lock every
//!   broadcast round runs under.
//! - [`dispatcher`] runs one broadcast round: picks the marker recipient and
//!   writes to every member.
//! - [`selection`] provides the injectable index sources used to pick the
//!   marker recipient.
//! - [`session`] drives one connection's read loop from registration to
//!   cleanup.
//! - [`server`] wires the `/ws` upgrade, `/stats`, and static file serving
//!   into an axum router.
//! - [`cli`] parses the command line for the `marker_relay` binary.
//! - [`frame`] and [`error`] hold the message and error types shared by the
//!   rest of the crate.

pub mod cli;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod registry;
pub mod selection;
pub mod server;
pub mod session;

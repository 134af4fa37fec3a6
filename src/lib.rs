//! proxlink library: neighbour discovery and proximity sessions for
//! battery-powered sensor nodes.
//!
//! Two roles share one radio protocol. Providers sample a light sensor,
//! requesters collect the readings. Nodes of complementary roles find each
//! other with low duty-cycle beacons, confirm they stay close for a while
//! (RSSI over a fixed threshold), and then exchange sensor data until one of
//! them walks away.
//!
//! Everything here is `no_std`, allocation-free, and independent of the
//! hardware: the radio, clock, light sensor and report output are reached
//! through the traits in [`platform`], so the whole protocol runs on the host
//! under `cargo test`. The ESP32 firmware binary is a thin consumer that
//! implements those traits over ESP-NOW.
//!
//! - [`packet`]: fixed 60-byte wire format
//! - [`link`]: RSSI proximity gate
//! - [`neighbour`]: fixed-capacity neighbour table and its timers
//! - [`discovery`], [`negotiate`], [`session`]: one module per phase
//! - [`node`]: the orchestrator tying the phases together
//! - [`report`]: NDJSON diagnostics

#![cfg_attr(not(test), no_std)]

pub mod board;
pub mod config;
pub mod discovery;
pub mod link;
pub mod negotiate;
pub mod neighbour;
pub mod node;
pub mod packet;
pub mod platform;
pub mod report;
pub mod sensor;
pub mod session;

#[cfg(test)]
mod testkit;

pub use config::NodeConfig;
pub use node::{Node, Phase};
pub use packet::{NodeId, Role};

// Wireless driver reload daemon library
// Shared modules for the daemon binary and tests

#![warn(missing_docs)]

//! Wireless driver reload daemon library
//!
//! Some wireless drivers never reassociate after the access point
//! de-authenticates them; only removing and re-inserting the kernel module
//! brings the device back. This library watches wpa_supplicant over D-Bus
//! for such disconnects and performs that reload.
//!
//! # Main Components
//!
//! - [`bus`]: System bus facade (supplicant lookups, signal subscriptions)
//! - [`classifier`]: Decides what a property change means
//! - [`config`]: Configuration file parsing and validation
//! - [`error`]: Fatal conditions and exit codes
//! - [`executor`]: External command execution
//! - [`reactor`]: The event loop tying everything together
//! - [`rebind`]: Tracking of the supplicant interface object path
//! - [`reload`]: rmmod/modprobe/lsmod sequencing
//! - [`types`]: Shared data structures

pub mod bus;
pub mod classifier;
pub mod config;
pub mod error;
pub mod executor;
pub mod reactor;
pub mod rebind;
pub mod reload;
pub mod types;

#[cfg(test)]
mod testing;

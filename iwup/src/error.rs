//! Fatal conditions
//!
//! Everything that ends the daemon is a [`FatalError`]. Recoverable
//! failures (a failed `rmmod`, a module missing from `lsmod`) are logged
//! where they happen and never reach this type.

use thiserror::Error;

/// Exit code for a shutdown requested by SIGINT/SIGTERM
pub const EXIT_OK: u8 = 0;

/// Exit code for every fatal condition
pub const EXIT_FATAL: u8 = 1;

/// Conditions that terminate the process
#[derive(Debug, Error)]
pub enum FatalError {
    /// The daemon is not running with root privileges.
    #[error("root privileges are required to reload kernel modules")]
    NotPrivileged,

    /// SIGINT/SIGTERM handlers could not be installed.
    #[error("failed to install signal handler: {0}")]
    SignalHandler(#[source] std::io::Error),

    /// The system bus could not be reached.
    #[error("cannot connect to the system D-Bus: {0}")]
    MissingBusDependency(#[source] zbus::Error),

    /// wpa_supplicant does not manage the configured interface.
    #[error("interface '{interface}' is not registered with wpa_supplicant")]
    InterfaceNotRegistered {
        /// Interface name that was looked up
        interface: String,
    },

    /// Any other failure talking to wpa_supplicant or subscribing to signals.
    #[error("D-Bus error: {0}")]
    Bus(#[from] zbus::Error),

    /// A signal subscription ended, meaning the bus connection is gone.
    #[error("{source_name} signal stream ended")]
    BusDisconnected {
        /// Service whose stream ended
        source_name: &'static str,
    },

    /// `modprobe` failed; the device is unusable until someone intervenes.
    #[error("failed to insert module '{module}': {detail}")]
    InsertModuleFailed {
        /// Module that failed to load
        module: String,
        /// stderr of `modprobe`, or why it could not run
        detail: String,
    },
}

impl FatalError {
    /// Process exit code for this condition
    pub fn exit_code(&self) -> u8 {
        EXIT_FATAL
    }
}

// Property-change classifier

//! Classification of `PropertiesChanged` signals
//!
//! wpa_supplicant reports disconnects through its interface object's
//! `DisconnectReason` property, which carries an IEEE 802.11 reason code
//! (IEEE Std 802.11-2012, 8.4.1.7). Codes 1 and 2 are cooperative
//! teardowns; 3 and above mean the station was forced off the network,
//! which on the affected drivers only recovers after a module reload.
//! Negative codes are disconnects wpa_supplicant generated locally.
//!
//! NetworkManager's root object reports `Connectivity`; anything above
//! "none" means the link came back and the supplicant object path has
//! likely changed.

use crate::types::PropertyChange;
use std::fmt;

/// wpa_supplicant property carrying the last disconnect reason code
pub const DISCONNECT_REASON: &str = "DisconnectReason";

/// Value wpa_supplicant reports (through `State`) for a disabled interface
pub const INTERFACE_DISABLED: &str = "interface_disabled";

/// NetworkManager property carrying the connectivity level
pub const CONNECTIVITY: &str = "Connectivity";

/// Lowest reason code treated as a forced de-authentication
pub const DEAUTH_THRESHOLD: i64 = 3;

/// Actions to take in response to a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Remove and re-insert the driver module
    ReloadModule {
        /// Reason code that triggered it
        reason: i64,
    },
    /// Re-resolve the supplicant interface path and re-subscribe
    Rebind {
        /// Connectivity level NetworkManager reported
        connectivity: i64,
    },
    /// No action needed
    None,
}

/// IEEE 802.11 reason code as reported in `DisconnectReason`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReasonCode(pub i64);

impl ReasonCode {
    /// True for codes that indicate a forced disassociation
    pub fn is_deauth(self) -> bool {
        self.0 >= DEAUTH_THRESHOLD
    }

    fn description(self) -> Option<&'static str> {
        let text = match self.0.unsigned_abs() {
            1 => "unspecified reason",
            2 => "previous authentication no longer valid",
            3 => "station is leaving the ESS",
            4 => "disassociated due to inactivity",
            5 => "AP unable to handle all associated stations",
            6 => "class 2 frame from nonauthenticated station",
            7 => "class 3 frame from nonassociated station",
            8 => "station is leaving the BSS",
            9 => "station not authenticated with responder",
            10 => "power capability unacceptable",
            11 => "supported channels unacceptable",
            13 => "invalid information element",
            14 => "MIC failure",
            15 => "4-way handshake timeout",
            16 => "group key handshake timeout",
            17 => "information element in 4-way handshake differs",
            18 => "invalid group cipher",
            19 => "invalid pairwise cipher",
            20 => "invalid AKMP",
            21 => "unsupported RSN IE version",
            22 => "invalid RSN IE capabilities",
            23 => "IEEE 802.1X authentication failed",
            24 => "cipher suite rejected",
            _ => return None,
        };
        Some(text)
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = if self.0 < 0 { ", locally generated" } else { "" };
        match self.description() {
            Some(text) => write!(f, "{} ({}{})", self.0, text, origin),
            None => write!(f, "{} (unknown{})", self.0, origin),
        }
    }
}

/// NetworkManager `NMConnectivityState`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityLevel {
    /// Not checked yet, or checking is disabled
    Unknown,
    /// No network connection
    None,
    /// Behind a captive portal
    Portal,
    /// Connected, but the internet is unreachable
    Limited,
    /// Internet reachable
    Full,
}

impl From<i64> for ConnectivityLevel {
    fn from(value: i64) -> Self {
        match value {
            1 => Self::None,
            2 => Self::Portal,
            3 => Self::Limited,
            4 => Self::Full,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ConnectivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::None => write!(f, "none"),
            Self::Portal => write!(f, "portal"),
            Self::Limited => write!(f, "limited"),
            Self::Full => write!(f, "full"),
        }
    }
}

/// Classify a signal from the supplicant interface object
pub fn classify_supplicant(change: &PropertyChange) -> Action {
    let mut action = Action::None;

    for (name, value) in &change.changed {
        if value.as_str() == Some(INTERFACE_DISABLED) {
            log::warn!("Interface disabled ({} = {})", name, INTERFACE_DISABLED);
        }

        if name != DISCONNECT_REASON {
            continue;
        }

        let Some(code) = value.as_int().map(ReasonCode) else {
            log::debug!("Ignoring non-numeric {}: {:?}", DISCONNECT_REASON, value);
            continue;
        };

        log::warn!("Disconnect detected, reason {}", code);
        if code.is_deauth() {
            log::warn!("De-authentication, reloading kernel module");
            action = Action::ReloadModule { reason: code.0 };
        } else {
            log::info!("Normal disconnect, no action required");
        }
    }

    action
}

/// Classify a signal from the NetworkManager root object
pub fn classify_network_manager(change: &PropertyChange) -> Action {
    let Some(value) = change.changed.get(CONNECTIVITY) else {
        return Action::None;
    };

    let Some(level) = value.as_int() else {
        log::debug!("Ignoring non-numeric {}: {:?}", CONNECTIVITY, value);
        return Action::None;
    };

    if level > 1 {
        log::info!(
            "NetworkManager connectivity: {} ({})",
            level,
            ConnectivityLevel::from(level)
        );
        Action::Rebind {
            connectivity: level,
        }
    } else {
        log::debug!(
            "NetworkManager connectivity: {} ({})",
            level,
            ConnectivityLevel::from(level)
        );
        Action::None
    }
}

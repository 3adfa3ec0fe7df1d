// Supplicant interface path tracking

//! Supplicant object path tracking
//!
//! wpa_supplicant hands out a new object path for the interface every time
//! it starts a new session (after a module reload, for one), so the path
//! is resolved again whenever NetworkManager reports that connectivity is
//! back, and the `PropertiesChanged` subscription moves with it.

use crate::bus::{BusFacade, PropertyStream, ResolveError, SUPPLICANT_SERVICE};
use crate::error::FatalError;

/// Tracks the current supplicant object path for one interface
pub struct PathRebinder {
    interface: String,
    current_path: Option<String>,
}

impl PathRebinder {
    /// Create a rebinder for `interface`; no path is tracked until the first rebind
    pub fn new(interface: String) -> Self {
        Self {
            interface,
            current_path: None,
        }
    }

    /// Get the interface name
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Path resolved by the last successful rebind
    pub fn current_path(&self) -> Option<&str> {
        self.current_path.as_deref()
    }

    /// Resolve the interface path and subscribe to its property changes
    ///
    /// The returned stream replaces the previous subscription; dropping the
    /// old stream removes its match rule. The tracked path only changes once
    /// the new subscription is in place.
    ///
    /// # Errors
    ///
    /// [`FatalError::InterfaceNotRegistered`] when wpa_supplicant does not
    /// know the interface, [`FatalError::Bus`] for any other bus failure.
    pub async fn rebind<B>(&mut self, bus: &B) -> Result<PropertyStream, FatalError>
    where
        B: BusFacade + ?Sized,
    {
        log::info!("Updating D-Bus paths for '{}'", self.interface);

        let path = bus
            .interface_path(&self.interface)
            .await
            .map_err(|e| match e {
                ResolveError::NotRegistered(interface) => {
                    FatalError::InterfaceNotRegistered { interface }
                }
                ResolveError::Bus(e) => FatalError::Bus(e),
            })?;

        log::info!("Path: {}", path);

        // Informational only
        match bus.current_ssid(&path).await {
            Ok(Some(ssid)) => log::info!("SSID: {}", ssid),
            Ok(None) => log::debug!("No current network on {}", path),
            Err(e) => log::warn!("Failed to look up SSID: {}", e),
        }

        let stream = bus.properties_changed(&path).await?;
        log::info!("Subscribed to PropertiesChanged on {} ({})", SUPPLICANT_SERVICE, path);

        if let Some(previous) = self.current_path.as_deref() {
            if previous != path {
                log::debug!("Interface path moved from {} to {}", previous, path);
            }
        }
        self.current_path = Some(path);

        Ok(stream)
    }
}

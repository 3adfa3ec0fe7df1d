// wpa_supplicant and NetworkManager access via D-Bus

//! System bus facade
//!
//! Wraps the zbus connection behind [`BusFacade`]: resolving the
//! supplicant's object path for an interface, looking up the SSID of its
//! current network, and subscribing to `PropertiesChanged` on a path.
//! Subscriptions use a raw match rule rather than a typed proxy so they
//! accept any sender, the same way `dbus-monitor` would.

use crate::types::{PropertyChange, PropertyValue};
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use std::collections::HashMap;
use std::pin::Pin;
use thiserror::Error;
use zbus::zvariant::{OwnedObjectPath, OwnedValue};
use zbus::{proxy, Connection, MatchRule, Message, MessageStream};

/// Well-known name of wpa_supplicant
pub const SUPPLICANT_SERVICE: &str = "fi.w1.wpa_supplicant1";

/// Path of NetworkManager's root object
pub const NETWORK_MANAGER_PATH: &str = "/org/freedesktop/NetworkManager";

/// Interface that emits `PropertiesChanged`
pub const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

/// Signal member for property changes
pub const PROPERTIES_CHANGED: &str = "PropertiesChanged";

/// Error wpa_supplicant returns from `GetInterface` for an unknown name
const INTERFACE_UNKNOWN: &str = "fi.w1.wpa_supplicant1.InterfaceUnknown";

/// Stream of decoded property changes for one subscription
pub type PropertyStream = Pin<Box<dyn Stream<Item = PropertyChange> + Send>>;

/// D-Bus proxy for the wpa_supplicant root object
#[proxy(
    interface = "fi.w1.wpa_supplicant1",
    default_service = "fi.w1.wpa_supplicant1",
    default_path = "/fi/w1/wpa_supplicant1"
)]
trait Supplicant {
    /// Object path of the interface object for `ifname`
    fn get_interface(&self, ifname: &str) -> zbus::Result<OwnedObjectPath>;
}

/// D-Bus proxy for a supplicant interface object
#[proxy(
    interface = "fi.w1.wpa_supplicant1.Interface",
    default_service = "fi.w1.wpa_supplicant1"
)]
trait SupplicantInterface {
    /// Path of the network block in use ("/" if none)
    #[zbus(property)]
    fn current_network(&self) -> zbus::Result<OwnedObjectPath>;
}

/// D-Bus proxy for a supplicant network block
#[proxy(
    interface = "fi.w1.wpa_supplicant1.Network",
    default_service = "fi.w1.wpa_supplicant1"
)]
trait SupplicantNetwork {
    /// Network block configuration (ssid, key_mgmt, ...)
    #[zbus(property)]
    fn properties(&self) -> zbus::Result<HashMap<String, OwnedValue>>;
}

/// Failure resolving an interface's object path
#[derive(Debug, Error)]
pub enum ResolveError {
    /// `GetInterface` answered `InterfaceUnknown` for this name
    #[error("interface '{0}' is not registered with wpa_supplicant")]
    NotRegistered(String),

    /// Any other bus failure
    #[error(transparent)]
    Bus(#[from] zbus::Error),
}

/// Operations the daemon needs from the system bus
#[async_trait]
pub trait BusFacade: Send + Sync {
    /// Resolve the supplicant object path for `interface`
    async fn interface_path(&self, interface: &str) -> Result<String, ResolveError>;

    /// SSID of the network the interface at `path` is using, if any
    async fn current_ssid(&self, path: &str) -> zbus::Result<Option<String>>;

    /// Subscribe to `PropertiesChanged` emitted on `path` by any sender
    async fn properties_changed(&self, path: &str) -> zbus::Result<PropertyStream>;
}

/// Facade over a live system bus connection
pub struct BusSession {
    connection: Connection,
}

impl BusSession {
    /// Connect to the system bus
    pub async fn system() -> zbus::Result<Self> {
        let connection = Connection::system().await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl BusFacade for BusSession {
    async fn interface_path(&self, interface: &str) -> Result<String, ResolveError> {
        let supplicant = SupplicantProxy::new(&self.connection).await?;

        match supplicant.get_interface(interface).await {
            Ok(path) => Ok(path.to_string()),
            Err(zbus::Error::MethodError(name, _, _)) if name.as_str() == INTERFACE_UNKNOWN => {
                Err(ResolveError::NotRegistered(interface.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn current_ssid(&self, path: &str) -> zbus::Result<Option<String>> {
        let iface = SupplicantInterfaceProxy::builder(&self.connection)
            .path(path)?
            .build()
            .await?;

        let network_path = iface.current_network().await?;
        if network_path.as_str() == "/" {
            return Ok(None);
        }
        log::info!("Network: {}", network_path.as_str());

        let network = SupplicantNetworkProxy::builder(&self.connection)
            .path(&network_path)?
            .build()
            .await?;

        let properties = network.properties().await?;
        Ok(properties
            .get("ssid")
            .and_then(|v| PropertyValue::from(&**v).as_str().map(unquote_ssid)))
    }

    async fn properties_changed(&self, path: &str) -> zbus::Result<PropertyStream> {
        let rule = properties_changed_rule(path)?;
        let stream = MessageStream::for_match_rule(rule, &self.connection, None).await?;

        let changes = stream.filter_map(|message| {
            let change = match message {
                Ok(message) => match decode_properties_changed(&message) {
                    Ok(change) => Some(change),
                    Err(e) => {
                        log::warn!("Malformed PropertiesChanged signal: {}", e);
                        None
                    }
                },
                Err(e) => {
                    log::warn!("D-Bus stream error: {}", e);
                    None
                }
            };
            futures::future::ready(change)
        });

        Ok(Box::pin(changes))
    }
}

/// Match rule for `PropertiesChanged` on exactly `path`
///
/// No sender or arg0 filter: every emitter on the path is accepted, whatever
/// interface its properties belong to.
fn properties_changed_rule(path: &str) -> zbus::Result<MatchRule<'_>> {
    Ok(MatchRule::builder()
        .msg_type(zbus::message::Type::Signal)
        .interface(PROPERTIES_INTERFACE)?
        .member(PROPERTIES_CHANGED)?
        .path(path)?
        .build())
}

/// Decode a `PropertiesChanged(s, a{sv}, as)` signal
fn decode_properties_changed(message: &Message) -> zbus::Result<PropertyChange> {
    let header = message.header();
    let path = header.path().map(|p| p.to_string()).unwrap_or_default();
    let sender = header.sender().map(|s| s.to_string());

    let (interface_name, changed, invalidated): (String, HashMap<String, OwnedValue>, Vec<String>) =
        message.body().deserialize()?;

    Ok(PropertyChange {
        sender,
        path,
        interface_name,
        changed: changed
            .iter()
            .map(|(name, value)| (name.clone(), PropertyValue::from(&**value)))
            .collect(),
        invalidated,
    })
}

/// wpa_supplicant reports the configured SSID with its quotes
fn unquote_ssid(raw: &str) -> String {
    raw.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw)
        .to_string()
}

// Main event loop

//! Signal reactor
//!
//! [`Reactor`] owns everything the daemon needs (bus facade, path
//! rebinder, reload controller and both subscriptions) and runs a single
//! `select!` loop over them. Each signal is handled to completion before
//! the next one is taken, so a reload holds up delivery of everything
//! else, including the connectivity signal that follows it.

use crate::bus::{BusFacade, PropertyStream, NETWORK_MANAGER_PATH};
use crate::classifier::{classify_network_manager, classify_supplicant, Action};
use crate::error::FatalError;
use crate::executor::CommandExecutor;
use crate::rebind::PathRebinder;
use crate::reload::ReloadController;
use crate::types::{InterruptPolicy, Settings};
use futures::stream::StreamExt;
use std::fmt;
use std::future::Future;
use tokio::signal::unix::{signal, SignalKind};

/// Signal that ended the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGINT
    Interrupt,
    /// SIGTERM
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => write!(f, "SIGINT"),
            Self::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Install SIGINT/SIGTERM handlers and return a future for the first one
///
/// Must be called from within the runtime.
pub fn shutdown_signal() -> Result<impl Future<Output = ShutdownSignal>, FatalError> {
    let mut sigterm = signal(SignalKind::terminate()).map_err(FatalError::SignalHandler)?;
    let mut sigint = signal(SignalKind::interrupt()).map_err(FatalError::SignalHandler)?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => ShutdownSignal::Terminate,
            _ = sigint.recv() => ShutdownSignal::Interrupt,
        }
    })
}

/// Daemon context and event loop
pub struct Reactor<B, E> {
    bus: B,
    rebinder: PathRebinder,
    controller: ReloadController<E>,
    on_interrupt: InterruptPolicy,
    supplicant: PropertyStream,
    network_manager: PropertyStream,
}

impl<B: BusFacade, E: CommandExecutor> Reactor<B, E> {
    /// Resolve the interface and set up both subscriptions
    ///
    /// The interface is resolved first, so an unknown interface fails
    /// before any subscription exists.
    pub async fn start(bus: B, executor: E, settings: &Settings) -> Result<Self, FatalError> {
        let mut rebinder = PathRebinder::new(settings.interface.clone());
        let supplicant = rebinder.rebind(&bus).await?;

        let network_manager = bus.properties_changed(NETWORK_MANAGER_PATH).await?;
        log::info!("Subscribed to PropertiesChanged on NetworkManager");

        Ok(Self {
            bus,
            rebinder,
            controller: ReloadController::new(executor, settings.module.clone()),
            on_interrupt: settings.on_interrupt,
            supplicant,
            network_manager,
        })
    }

    /// Path the supplicant subscription is currently bound to
    pub fn current_path(&self) -> Option<&str> {
        self.rebinder.current_path()
    }

    /// Run until `shutdown` resolves or a fatal condition occurs
    pub async fn run<S>(mut self, shutdown: S) -> Result<ShutdownSignal, FatalError>
    where
        S: Future<Output = ShutdownSignal>,
    {
        tokio::pin!(shutdown);
        log::info!("Monitoring started");

        loop {
            tokio::select! {
                signal = &mut shutdown => {
                    log::info!("Received {}", signal);
                    return Ok(signal);
                }

                change = self.supplicant.next() => {
                    let change = change.ok_or(FatalError::BusDisconnected {
                        source_name: "wpa_supplicant",
                    })?;

                    if let Action::ReloadModule { reason } = classify_supplicant(&change) {
                        log::debug!(
                            "Reload of '{}' requested for reason {} on '{}'",
                            self.controller.module(),
                            reason,
                            self.rebinder.interface()
                        );
                        match self.on_interrupt {
                            InterruptPolicy::Finish => {
                                self.controller.reload().await?;
                            }
                            InterruptPolicy::Kill => {
                                tokio::select! {
                                    outcome = self.controller.reload() => {
                                        outcome?;
                                    }
                                    signal = &mut shutdown => {
                                        log::warn!(
                                            "Received {} during reload of '{}', abandoning it",
                                            signal,
                                            self.controller.module()
                                        );
                                        return Ok(signal);
                                    }
                                }
                            }
                        }
                    }
                }

                change = self.network_manager.next() => {
                    let change = change.ok_or(FatalError::BusDisconnected {
                        source_name: "NetworkManager",
                    })?;

                    if let Action::Rebind { .. } = classify_network_manager(&change) {
                        log::info!(
                            "Connectivity is back, re-resolving '{}'",
                            self.rebinder.interface()
                        );
                        self.supplicant = self.rebinder.rebind(&self.bus).await?;
                    }
                }
            }
        }
    }
}

// Kernel module reload controller

//! Kernel module reload
//!
//! A reload is remove, then insert, then verify:
//!
//! 1. `rmmod <module>`: a failure is logged and ignored, the module may
//!    not have been loaded at all.
//! 2. `modprobe <module>`: a failure is fatal. The hardware is usually in
//!    a state only a reboot fixes, so there is no retry.
//! 3. `lsmod`: the module must show up in the loaded list. Absence is a
//!    warning, not an error.

use crate::error::FatalError;
use crate::executor::{CommandError, CommandExecutor, CommandOutput};
use std::time::{Duration, Instant, SystemTime};

const RMMOD: &str = "rmmod";
const MODPROBE: &str = "modprobe";
const LSMOD: &str = "lsmod";

/// Result of one reload phase that is allowed to fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseStatus {
    /// Command exited with status 0
    Ok,
    /// Command failed; carries its error text
    Failed(String),
}

/// Result of the `lsmod` check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Module is in the loaded list
    Loaded,
    /// Module is missing from the loaded list
    Absent,
    /// `lsmod` itself failed
    Unchecked(String),
}

/// Outcome of a reload that got past the insert phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadOutcome {
    /// How `rmmod` went
    pub removal: PhaseStatus,
    /// What `lsmod` showed afterwards
    pub verification: Verification,
    /// Wall-clock time the reload finished
    pub finished_at: SystemTime,
    /// Time from `rmmod` to the end of verification
    pub elapsed: Duration,
}

/// Drives rmmod/modprobe/lsmod for one configured module
pub struct ReloadController<E> {
    executor: E,
    module: String,
}

impl<E: CommandExecutor> ReloadController<E> {
    /// Create a controller for `module`
    pub fn new(executor: E, module: String) -> Self {
        Self { executor, module }
    }

    /// Get the module name
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Remove and re-insert the module, then check it is loaded
    ///
    /// # Errors
    ///
    /// Returns [`FatalError::InsertModuleFailed`] when `modprobe` fails to
    /// run or exits non-zero. Nothing else is fatal.
    pub async fn reload(&self) -> Result<ReloadOutcome, FatalError> {
        let started = Instant::now();
        log::info!("Reloading kernel module '{}'", self.module);

        let removal = match self.executor.run(RMMOD, &[self.module.as_str()]).await {
            Ok(output) if output.success() => {
                log::info!("Phase 1: removed module '{}'", self.module);
                PhaseStatus::Ok
            }
            Ok(output) => {
                let detail = output.error_text();
                log::warn!("Phase 1: rmmod failed: {}", detail);
                PhaseStatus::Failed(detail)
            }
            Err(e) => {
                log::warn!("Phase 1: {}", e);
                PhaseStatus::Failed(e.to_string())
            }
        };

        let inserted = self.executor.run(MODPROBE, &[self.module.as_str()]).await;
        if let Some(detail) = insert_failure(&inserted) {
            log::error!("Phase 1: modprobe failed: {}", detail);
            return Err(FatalError::InsertModuleFailed {
                module: self.module.clone(),
                detail,
            });
        }
        log::info!("Phase 1: inserted module '{}'", self.module);

        log::info!("Phase 2: confirming module is loaded");
        let verification = match self.executor.run(LSMOD, &[]).await {
            Ok(output) if output.success() => {
                if module_loaded(&output.stdout, &self.module) {
                    Verification::Loaded
                } else {
                    Verification::Absent
                }
            }
            Ok(output) => Verification::Unchecked(output.error_text()),
            Err(e) => Verification::Unchecked(e.to_string()),
        };

        let elapsed = started.elapsed();
        match &verification {
            Verification::Loaded => {
                log::info!("Reload of '{}' complete in {:.1}s", self.module, elapsed.as_secs_f32());
            }
            Verification::Absent => {
                log::warn!(
                    "modprobe reported success but '{}' is not loaded, the reload appears to have failed",
                    self.module
                );
            }
            Verification::Unchecked(detail) => {
                log::warn!("Could not verify '{}' is loaded: {}", self.module, detail);
            }
        }

        Ok(ReloadOutcome {
            removal,
            verification,
            finished_at: SystemTime::now(),
            elapsed,
        })
    }
}

fn insert_failure(result: &Result<CommandOutput, CommandError>) -> Option<String> {
    match result {
        Ok(output) if output.success() => None,
        Ok(output) => Some(output.error_text()),
        Err(e) => Some(e.to_string()),
    }
}

/// Check whether `module` appears in `lsmod` output
///
/// The kernel reports module names with underscores, while modprobe accepts
/// either, so dashes and underscores compare equal.
pub fn module_loaded(lsmod_output: &str, module: &str) -> bool {
    let wanted = module.replace('-', "_");

    lsmod_output
        .lines()
        .skip(1) // "Module  Size  Used by"
        .filter_map(|line| line.split_whitespace().next())
        .any(|name| name.replace('-', "_") == wanted)
}

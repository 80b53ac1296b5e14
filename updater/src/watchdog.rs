//! Watchdog and error-action quiescing.
//!
//! Housekeeping keeps the watchdog fed right up to the last step before
//! relocation. After that nothing outside the trampoline runs, so the
//! watchdog is either kicked one final time (the ROM takes over feeding
//! it) or stopped. Error actions that could fire during the handoff are
//! silenced in the same step.

use log::{debug, error};
use thiserror::Error;

use crate::config::WatchdogPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("watchdog driver error (code {0:#x})")]
pub struct WatchdogError(pub u32);

/// Watchdog driver seen from the update path.
pub trait Watchdog {
    fn kick(&mut self) -> Result<(), WatchdogError>;

    fn stop(&mut self) -> Result<(), WatchdogError>;

    /// Re-arm from restored state in the new image.
    fn restore(&mut self) -> Result<(), WatchdogError>;
}

/// Error-action manager seen from the update path.
pub trait ErrorActions {
    /// Disable actions that would reset or interrupt the processor.
    fn quiesce(&mut self);

    /// Re-enable what `quiesce` disabled. Called when the update fails
    /// after quiescing and this image carries on.
    fn restore(&mut self);
}

/// Apply `policy` to the watchdog.
pub fn quiesce_watchdog(
    watchdog: &mut dyn Watchdog,
    policy: WatchdogPolicy,
) -> Result<(), WatchdogError> {
    let result = match policy {
        WatchdogPolicy::FinalKick => watchdog.kick(),
        WatchdogPolicy::Stop => watchdog.stop(),
    };
    match result {
        Ok(()) => debug!("watchdog quiesced ({:?})", policy),
        Err(e) => error!("watchdog quiesce failed: {}", e),
    }
    result
}

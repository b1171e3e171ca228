//! Trigger evaluation
//!
//! Decides whether a create request opts in to injection at all,
//! whether it wants device injection, and how many pooled devices it
//! asks for. Everything is driven by the configured label and
//! environment-variable names.

use devlease_config::Config;
use devlease_types::CreateRequest;
use tracing::{debug, info, warn};

/// Outcome of trigger evaluation for one create request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    /// Device-specific injection (mounts, env, pooled devices) applies.
    pub devices: bool,
    /// Number of pooled devices requested via the request variable.
    pub requested: usize,
    /// The container asked for privileged mode.
    pub privileged: bool,
}

impl Trigger {
    /// Evaluate the configured triggers against a request.
    ///
    /// Returns `None` when the request does not opt in; the injector
    /// passes such requests through untouched. An unparsable
    /// requested-count value also opts the request out, with a warning,
    /// rather than failing the container creation.
    #[must_use]
    pub fn evaluate(config: &Config, request: &CreateRequest) -> Option<Self> {
        let enabled_env = request.env_var(&config.general.enabled_env) == Some("true");
        let enabled_label = request.label(&config.general.enabled_label) == Some("true");
        let device_env = request.env_var(&config.device.trigger_env) == Some("true");
        let device_label = request.label(&config.device.trigger_label) == Some("true");
        let visible = request.env_var(&config.device.visible_env).is_some();
        let privileged = request.env_var(&config.container.privileged_env) == Some("true");

        let requested = match request.env_var(&config.device.request_env) {
            Some(value) => match value.parse::<usize>() {
                Ok(count) => Some(count),
                Err(e) => {
                    warn!(
                        container = %request.name,
                        var = %config.device.request_env,
                        value,
                        error = %e,
                        "unparsable device request count, skipping injection"
                    );
                    return None;
                }
            },
            None => None,
        };

        let opted_in = config.general.force
            || enabled_env
            || enabled_label
            || device_env
            || device_label
            || visible
            || requested.is_some()
            || privileged;

        if !opted_in {
            debug!(container = %request.name, "no trigger matched, passing request through");
            return None;
        }

        let trigger = Self {
            devices: device_env || device_label || visible || requested.is_some(),
            requested: requested.unwrap_or(0),
            privileged,
        };
        info!(
            container = %request.name,
            devices = trigger.devices,
            requested = trigger.requested,
            privileged = trigger.privileged,
            "injection triggered"
        );
        Some(trigger)
    }
}

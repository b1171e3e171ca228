//! The request injector

use crate::{devices, env, trigger::Trigger, user};
use devlease_config::{Config, UserMode};
use devlease_errors::{Error, InjectError};
use devlease_pool::DevicePool;
use devlease_types::{CreateRequest, DeviceMapping, HolderId};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Rewrites container create requests according to configuration and
/// hands out pooled devices.
///
/// Owns the [`DevicePool`] for the lifetime of the embedding service;
/// reservations do not survive a restart, so a fresh injector (and a
/// fresh discovery) is built on every startup.
#[derive(Debug)]
pub struct Injector {
    config: Config,
    pool: DevicePool,
}

impl Injector {
    /// Build an injector over an already-constructed pool.
    pub fn new(config: Config, pool: DevicePool) -> Self {
        Self { config, pool }
    }

    /// Build an injector by running device discovery as configured in
    /// `[device]`.
    ///
    /// # Errors
    ///
    /// Propagates discovery failures; the embedding service decides
    /// whether to run without pooled devices or to abort startup.
    pub async fn discover(config: Config) -> Result<Self, Error> {
        let pool = DevicePool::discover(
            &config.device.source_path,
            &config.device.name_pattern,
        )
        .await?;
        Ok(Self::new(config, pool))
    }

    #[must_use]
    pub fn pool(&self) -> &DevicePool {
        &self.pool
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Apply the configured injections to a create request.
    ///
    /// Requests that do not opt in are returned untouched. On success
    /// the returned request carries the merged environment, mounts,
    /// user, and device list; any pooled devices in it are reserved for
    /// the request's container name.
    ///
    /// # Errors
    ///
    /// Fails when the pool cannot satisfy the requested device count
    /// (`PoolError::InsufficientResources` — the caller surfaces or
    /// retries), when a pooled request arrives without a container name,
    /// or when visible-device expansion cannot list the device
    /// directory. On error no pooled reservation is left behind.
    pub async fn process(&self, mut request: CreateRequest) -> Result<CreateRequest, Error> {
        let Some(trigger) = Trigger::evaluate(&self.config, &request) else {
            return Ok(request);
        };

        if trigger.privileged {
            info!(container = %request.name, "enabling privileged mode");
            request.privileged = true;
        }
        self.apply_auto_remove(&mut request);
        self.apply_user(&mut request);

        env::merge_env(
            &mut request.env,
            &self.config.general.environment,
            self.config.general.force_environment,
        );
        for mount in &self.config.general.mounts {
            debug!(container = %request.name, bind = %mount, "adding bind mount");
            request.binds.push(mount.clone());
        }

        let mut device_set: BTreeSet<String> = BTreeSet::new();
        for device in &self.config.general.devices {
            if Path::new(device).exists() {
                device_set.insert(device.clone());
            } else {
                debug!(device = %device, "configured device not present, skipping");
            }
        }

        if trigger.devices {
            self.apply_device_injection(&mut request, &trigger, &mut device_set)
                .await?;
        }

        merge_devices(&mut request, device_set);
        Ok(request)
    }

    /// Release every pooled device held by `holder`. Idempotent.
    pub fn release(&self, holder: &HolderId) {
        self.pool.release_by_holder(holder);
    }

    /// Release the pooled devices named in a terminated container's
    /// bound-device list. Idempotent; paths the pool does not know are
    /// ignored.
    pub fn release_devices(&self, request: &CreateRequest) {
        let bound: BTreeSet<&str> = request
            .devices
            .iter()
            .map(|d| d.path_on_host.as_str())
            .collect();
        self.pool.release_by_match(|id| bound.contains(id.as_str()));
    }

    /// Drop reservations whose holder is not in `running`.
    ///
    /// Reconciles the pool against the authoritative container list
    /// after missed teardown events.
    pub fn reconcile(&self, running: &[HolderId]) {
        for snapshot in self.pool.list_reserved() {
            if !running.contains(&snapshot.holder) {
                info!(holder = %snapshot.holder, "releasing reservation for absent container");
                self.pool.release_by_holder(&snapshot.holder);
            }
        }
    }

    fn apply_auto_remove(&self, request: &mut CreateRequest) {
        // A create request without a log driver usually comes from an
        // image build; removing those containers breaks the build.
        let building = request.log_driver.as_deref() == Some("none");

        if let Some(value) = request.label(&self.config.container.remove_label) {
            if building {
                debug!(container = %request.name, "skipping auto-remove for build container");
            } else {
                let remove = value == "true";
                info!(container = %request.name, remove, "setting auto-remove from label");
                request.auto_remove = remove;
            }
        } else if self.config.container.remove {
            if building {
                debug!(container = %request.name, "skipping auto-remove for build container");
            } else {
                info!(container = %request.name, "enabling auto-remove");
                request.auto_remove = true;
            }
        }
    }

    fn apply_user(&self, request: &mut CreateRequest) {
        let user_config = &self.config.user;
        if request.label(&user_config.keep_label) == Some("true")
            || request.env_var(&user_config.keep_env) == Some("true")
        {
            debug!(container = %request.name, "keeping container user");
            return;
        }

        let candidate = match user_config.mode {
            UserMode::Static => {
                // Static mode writes the configured value verbatim,
                // without resolving it on the host.
                if let Some(user) = &user_config.default_user {
                    info!(container = %request.name, user = %user, "overwriting user");
                    request.user = Some(user.clone());
                } else {
                    warn!("user.mode is static but user.default_user is not set");
                }
                return;
            }
            UserMode::Default => user_config.default_user.clone(),
            UserMode::Env => request
                .env_var(&user_config.user_env)
                .map(ToString::to_string)
                .or_else(|| user_config.default_user.clone()),
        };

        let Some(candidate) = candidate.filter(|c| !c.is_empty()) else {
            return;
        };

        match user::resolve_user(&candidate) {
            Ok(resolved) => {
                let spec = resolved.as_user_spec();
                info!(container = %request.name, user = %spec, "overwriting user");
                request.user = Some(spec);
                if user_config.set_home_env {
                    env::merge_env(
                        &mut request.env,
                        &[format!("HOME={}", resolved.home)],
                        true,
                    );
                }
            }
            Err(e) => {
                warn!(user = %candidate, error = %e, "cannot resolve user, leaving untouched");
            }
        }
    }

    async fn apply_device_injection(
        &self,
        request: &mut CreateRequest,
        trigger: &Trigger,
        device_set: &mut BTreeSet<String>,
    ) -> Result<(), Error> {
        let device_config = &self.config.device;

        for mount in &device_config.mounts {
            debug!(container = %request.name, bind = %mount, "adding device bind mount");
            request.binds.push(mount.clone());
        }
        env::merge_env(
            &mut request.env,
            &device_config.environment,
            device_config.force_environment,
        );

        let library_binds =
            devices::library_binds(&device_config.library_paths, &device_config.library_prefixes)
                .await;
        request.binds.extend(library_binds);

        let mut granted = Vec::new();
        if trigger.requested > 0 {
            if request.name.is_empty() {
                return Err(InjectError::InvalidRequest {
                    message: "container name required to reserve pooled devices".to_string(),
                }
                .into());
            }
            let holder = HolderId::new(request.name.clone());
            granted = self.pool.request(&holder, trigger.requested)?;
            device_set.extend(granted.iter().map(ToString::to_string));
        }

        if let Some(visible) = request.env_var(&device_config.visible_env) {
            let expanded = devices::expand_visible(
                visible,
                &device_config.source_path,
                &device_config.name_pattern,
            )
            .await;
            match expanded {
                Ok(expanded) => device_set.extend(expanded),
                Err(e) => {
                    // The request fails, so hand any grant back before
                    // surfacing the error.
                    self.pool.release_by_ids(&granted);
                    return Err(e);
                }
            }
        }

        if !device_set.is_empty() {
            device_set.extend(devices::existing_companions(
                &device_config.companion_devices,
            ));
        }

        Ok(())
    }
}

fn merge_devices(request: &mut CreateRequest, device_set: BTreeSet<String>) {
    request
        .devices
        .extend(device_set.into_iter().map(DeviceMapping::same_path));
    request.devices.sort();
    request.devices.dedup();
}

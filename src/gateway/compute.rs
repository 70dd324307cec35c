use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use tracing::{debug, error, info};

use crate::backend::{ComputeEngine, ComputeSession, ComputeSessionConfig};
use crate::config::ComputeSettings;
use crate::core::{BackendError, GatewayError};

/// How a gateway obtains its distributed-compute session.
#[derive(Debug, Clone, Default)]
pub enum ComputePolicy {
    /// No compute session; distributed requests fall back to the driver.
    Disabled,
    /// Reuse a caller-supplied session. Never stopped by the gateway.
    Provided(Arc<dyn ComputeSession>),
    /// Share the registry's session for the configured app name, creating
    /// it if absent. Never stopped by the gateway.
    Persistent { force_new: bool },
    /// Create a session owned by the gateway and stop it on close.
    #[default]
    Private,
}

/// Process-wide store of persistent compute sessions, keyed by app name.
///
/// Creation happens under the registry lock so concurrent gateways never
/// create two sessions for the same name. Sessions stay alive until
/// [`ComputeSessionRegistry::shutdown`] or [`ComputeSessionRegistry::shutdown_all`].
#[derive(Debug, Default)]
pub struct ComputeSessionRegistry {
    sessions: Mutex<HashMap<String, Arc<dyn ComputeSession>>>,
}

static GLOBAL_REGISTRY: OnceLock<Arc<ComputeSessionRegistry>> = OnceLock::new();

impl ComputeSessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by every gateway that is not given its own.
    pub fn global() -> Arc<Self> {
        GLOBAL_REGISTRY.get_or_init(|| Arc::new(Self::new())).clone()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn ComputeSession>>> {
        // A panic while holding the lock cannot leave the map half-updated
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Returns the live session for `config.app_name`, or creates one.
    /// `force_new` always creates and replaces the stored session.
    pub fn get_or_create(
        &self,
        engine: &dyn ComputeEngine,
        config: &ComputeSessionConfig,
        force_new: bool,
    ) -> Result<Arc<dyn ComputeSession>, BackendError> {
        let mut sessions = self.sessions();

        if !force_new {
            if let Some(existing) = sessions.get(&config.app_name) {
                if existing.is_active() {
                    info!("Reusing existing persistent compute session");
                    return Ok(Arc::clone(existing));
                }
                debug!("Persistent compute session '{}' is stopped, replacing it", config.app_name);
            }
        }

        info!("Creating new persistent compute session");
        let session = engine.create_session(config).map_err(|e| {
            error!("Failed to create persistent compute session: {}", e);
            e
        })?;
        sessions.insert(config.app_name.clone(), Arc::clone(&session));
        Ok(session)
    }

    #[must_use]
    pub fn get(&self, app_name: &str) -> Option<Arc<dyn ComputeSession>> {
        self.sessions().get(app_name).cloned()
    }

    /// Stops and forgets the session for `app_name`. Returns whether one
    /// was registered.
    pub fn shutdown(&self, app_name: &str) -> bool {
        let removed = self.sessions().remove(app_name);
        match removed {
            Some(session) => {
                session.stop();
                info!("Persistent compute session '{}' stopped", app_name);
                true
            }
            None => false,
        }
    }

    pub fn shutdown_all(&self) {
        let drained: Vec<Arc<dyn ComputeSession>> =
            self.sessions().drain().map(|(_, session)| session).collect();
        for session in drained {
            session.stop();
        }
    }
}

/// The compute session held by one gateway, and whether the gateway owns it.
#[derive(Debug, Default)]
pub(crate) struct ComputeHandle {
    session: Option<Arc<dyn ComputeSession>>,
    owned: bool,
}

impl ComputeHandle {
    pub(crate) fn acquire(
        policy: ComputePolicy,
        engine: Option<&Arc<dyn ComputeEngine>>,
        registry: &ComputeSessionRegistry,
        settings: &ComputeSettings,
    ) -> Result<Self, GatewayError> {
        let config = ComputeSessionConfig::from_settings(settings);

        match policy {
            ComputePolicy::Disabled => Ok(Self::default()),
            ComputePolicy::Provided(session) => {
                info!("Using provided compute session");
                Ok(Self {
                    session: Some(session),
                    owned: false,
                })
            }
            ComputePolicy::Persistent { force_new } => {
                let Some(engine) = engine else {
                    debug!("No compute engine linked, persistent session not created");
                    return Ok(Self::default());
                };
                let session = registry
                    .get_or_create(engine.as_ref(), &config, force_new)
                    .map_err(|e| GatewayError::Connection(e.to_string()))?;
                Ok(Self {
                    session: Some(session),
                    owned: false,
                })
            }
            ComputePolicy::Private => {
                let Some(engine) = engine else {
                    debug!("No compute engine linked, private session not created");
                    return Ok(Self::default());
                };
                match engine.create_session(&config) {
                    Ok(session) => {
                        info!("Compute session '{}' created", session.app_name());
                        Ok(Self {
                            session: Some(session),
                            owned: true,
                        })
                    }
                    Err(e) => {
                        error!("Failed to create compute session: {}", e);
                        Ok(Self::default())
                    }
                }
            }
        }
    }

    pub(crate) fn session(&self) -> Option<&Arc<dyn ComputeSession>> {
        self.session.as_ref()
    }

    /// The session, unless it has been stopped (possibly by another holder
    /// of a persistent session).
    pub(crate) fn active_session(&self) -> Option<&Arc<dyn ComputeSession>> {
        self.session.as_ref().filter(|session| session.is_active())
    }

    /// Drops the session reference, stopping it first if it is owned.
    pub(crate) fn release(&mut self) {
        if let Some(session) = self.session.take() {
            if self.owned {
                session.stop();
                info!("Compute session '{}' stopped", session.app_name());
            }
        }
        self.owned = false;
    }
}

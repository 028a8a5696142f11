//! Live provider sessions keyed by configured server name.

use std::collections::BTreeMap;

use mcp::ServerConfig;
use tracing::{debug, info, warn};

use super::errors::CloseError;
use super::provider::{Connector, ToolProvider};

/// The set of providers that connected successfully.
///
/// Servers that fail to connect are logged and left out, so a registry may
/// be empty. Iteration order is by server name.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<String, Box<dyn ToolProvider>>,
}

impl SessionRegistry {
    /// A registry with no providers.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Connect to every configured server in turn.
    pub async fn connect<C>(configs: impl IntoIterator<Item = ServerConfig>, connector: &C) -> Self
    where
        C: Connector + ?Sized,
    {
        let mut registry = Self::empty();
        for config in configs {
            if registry.sessions.contains_key(&config.name) {
                warn!(server = %config.name, "duplicate server name, skipping");
                continue;
            }
            match connector.connect(&config).await {
                Ok(provider) => {
                    info!(server = %config.name, "connected");
                    registry.sessions.insert(config.name, provider);
                }
                Err(e) => {
                    warn!(server = %config.name, error = %e, "failed to connect, skipping");
                }
            }
        }
        registry
    }

    /// Build a registry from providers that are already connected.
    pub fn from_providers(
        providers: impl IntoIterator<Item = (String, Box<dyn ToolProvider>)>,
    ) -> Self {
        Self {
            sessions: providers.into_iter().collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn ToolProvider> {
        self.sessions.get(name).map(|provider| provider.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &dyn ToolProvider)> {
        self.sessions
            .iter()
            .map(|(name, provider)| (name.as_str(), provider.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Close every session, attempting all of them even if some fail.
    pub async fn close(self) -> Result<(), CloseError> {
        let mut failures = Vec::new();
        for (name, provider) in self.sessions {
            match provider.close().await {
                Ok(()) => debug!(server = %name, "closed"),
                Err(e) => {
                    warn!(server = %name, error = %e, "failed to close session");
                    failures.push((name, e));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CloseError { failures })
        }
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.sessions.keys()).finish()
    }
}

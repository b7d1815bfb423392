use std::collections::HashMap;

use url::Url;

/// Alternate credential set, keyed by agent name in [`ForgeConfig::agents`].
#[derive(Clone, veil::Redact)]
pub struct AgentCredentials {
    pub client_id: String,
    #[redact]
    pub client_secret: String,
}

impl AgentCredentials {
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

/// Immutable configuration injected once per process at [`crate::AuthHandler`] construction.
///
/// Uses `Arc` internally nowhere — the handler wraps the whole config in an `Arc` itself, so
/// this stays a plain value type.
#[derive(Clone, veil::Redact)]
pub struct ForgeConfig {
    client_id: Option<String>,
    #[redact]
    client_secret: Option<String>,
    agents: HashMap<String, AgentCredentials>,
    authentication_address: Url,
}

impl ForgeConfig {
    /// Start building a [`ForgeConfig`] for the given OAuth token endpoint.
    #[must_use]
    pub fn builder(authentication_address: Url) -> ForgeConfigBuilder {
        ForgeConfigBuilder::new(authentication_address)
    }

    pub(crate) fn resolve_credentials(
        &self,
        agent: &str,
    ) -> crate::error::Result<(&str, &str)> {
        if agent.is_empty() {
            let client_id = self
                .client_id
                .as_deref()
                .ok_or(crate::error::Error::InvalidConfiguration { field: "client_id" })?;
            let client_secret = self.client_secret.as_deref().ok_or(
                crate::error::Error::InvalidConfiguration {
                    field: "client_secret",
                },
            )?;
            return Ok((client_id, client_secret));
        }

        let creds = self.agents.get(agent).ok_or(crate::error::Error::InvalidConfiguration {
            field: "agents",
        })?;
        if creds.client_id.is_empty() {
            return Err(crate::error::Error::InvalidConfiguration { field: "client_id" });
        }
        if creds.client_secret.is_empty() {
            return Err(crate::error::Error::InvalidConfiguration {
                field: "client_secret",
            });
        }
        Ok((creds.client_id.as_str(), creds.client_secret.as_str()))
    }

    pub(crate) fn authentication_address(&self) -> &Url {
        &self.authentication_address
    }
}

/// Builder for [`ForgeConfig`].
///
/// The following configuration is available:
/// * `client_id`/`client_secret`: default service credentials (optional if every call
///   specifies an agent).
/// * `agent`: adds a named alternate credential set.
#[derive(Clone, veil::Redact)]
pub struct ForgeConfigBuilder {
    client_id: Option<String>,
    #[redact]
    client_secret: Option<String>,
    agents: HashMap<String, AgentCredentials>,
    authentication_address: Url,
}

impl ForgeConfigBuilder {
    fn new(authentication_address: Url) -> Self {
        Self {
            client_id: None,
            client_secret: None,
            agents: HashMap::new(),
            authentication_address,
        }
    }

    /// Set the default service client id.
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set the default service client secret.
    #[must_use]
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Add a named alternate credential set.
    #[must_use]
    pub fn agent(mut self, name: impl Into<String>, credentials: AgentCredentials) -> Self {
        self.agents.insert(name.into(), credentials);
        self
    }

    /// Build the [`ForgeConfig`].
    #[must_use]
    pub fn build(self) -> ForgeConfig {
        ForgeConfig {
            client_id: self.client_id,
            client_secret: self.client_secret,
            agents: self.agents,
            authentication_address: self.authentication_address,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_default_credentials() {
        let config = ForgeConfig::builder("https://id.example.com/token".parse().unwrap())
            .client_id("default-id")
            .client_secret("default-secret")
            .build();

        let (id, secret) = config.resolve_credentials("").unwrap();
        assert_eq!(id, "default-id");
        assert_eq!(secret, "default-secret");
    }

    #[test]
    fn resolves_agent_credentials() {
        let config = ForgeConfig::builder("https://id.example.com/token".parse().unwrap())
            .agent("data-agent", AgentCredentials::new("agent-id", "agent-secret"))
            .build();

        let (id, secret) = config.resolve_credentials("data-agent").unwrap();
        assert_eq!(id, "agent-id");
        assert_eq!(secret, "agent-secret");
    }

    #[test]
    fn missing_default_credentials_is_invalid_configuration() {
        let config = ForgeConfig::builder("https://id.example.com/token".parse().unwrap()).build();
        let err = config.resolve_credentials("").unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::InvalidConfiguration { field: "client_id" }
        ));
    }

    #[test]
    fn unknown_agent_is_invalid_configuration() {
        let config = ForgeConfig::builder("https://id.example.com/token".parse().unwrap()).build();
        let err = config.resolve_credentials("ghost").unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::InvalidConfiguration { field: "agents" }
        ));
    }
}

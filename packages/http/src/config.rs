//! Configuration for the bridge and the reqwest transport.

/// Agent string sent unless the caller overrides `User-Agent`.
pub const DEFAULT_USER_AGENT: &str = concat!("latent-http/", env!("CARGO_PKG_VERSION"));

/// Configuration for [`crate::LatentHttp`].
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Value of the default `User-Agent` header.
    pub user_agent: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Configuration for [`crate::ReqwestTransport`] when it owns its runtime.
///
/// No timeout is applied. A request that never completes leaves
/// its operation pending until cancelled.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Worker threads for the transport's tokio runtime.
    pub worker_threads: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { worker_threads: 2 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        assert!(BridgeConfig::default().user_agent.starts_with("latent-http/"));
        assert_eq!(TransportConfig::default().worker_threads, 2);
    }

    #[test]
    fn user_agent_override() {
        let config = BridgeConfig::default().with_user_agent("game-client/3");
        assert_eq!(config.user_agent, "game-client/3");
    }
}

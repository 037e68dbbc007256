//! Gateway configuration.

use std::time::Duration;

use realmsync_resources::ResourceConfig;
use realmsync_session::SessionConfig;
use realmsync_transport::TransportConfig;
use realmsync_world::WorldConfig;

/// Everything the gateway needs to know before it binds.
///
/// Each component keeps its own config struct; this one only adds the
/// gateway's own timing and bundles the rest.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,
    /// How often the consolidated `full_update` goes out.
    pub snapshot_interval: Duration,
    /// Upper bound on any single store or forwarded-service call made on
    /// behalf of a client or a background job.
    pub downstream_timeout: Duration,
    pub transport: TransportConfig,
    pub session: SessionConfig,
    pub world: WorldConfig,
    pub resources: ResourceConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            snapshot_interval: Duration::from_secs(1),
            downstream_timeout: Duration::from_secs(3),
            transport: TransportConfig::default(),
            session: SessionConfig::default(),
            world: WorldConfig::default(),
            resources: ResourceConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Keeps the map size the world and resource layers see in step, and
    /// hands the downstream limit to the resource engine, which applies it
    /// to each store call itself.
    pub(crate) fn aligned(mut self) -> Self {
        self.resources.map_size = self.world.map_size;
        self.resources.call_timeout = self.downstream_timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timings() {
        let config = ServerConfig::default();
        assert_eq!(config.snapshot_interval, Duration::from_secs(1));
        assert_eq!(config.downstream_timeout, Duration::from_secs(3));
        assert_eq!(config.session.handshake_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_aligned_copies_world_map_size() {
        let mut config = ServerConfig::default();
        config.world.map_size = 512.0;

        let config = config.aligned();

        assert_eq!(config.resources.map_size, 512.0);
    }

    #[test]
    fn test_aligned_bounds_resource_calls_by_downstream_timeout() {
        let config = ServerConfig {
            downstream_timeout: Duration::from_millis(250),
            ..ServerConfig::default()
        }
        .aligned();

        assert_eq!(config.resources.call_timeout, Duration::from_millis(250));
    }
}

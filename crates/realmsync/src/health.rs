use std::time::{Duration, SystemTime, UNIX_EPOCH};

use realmsync_protocol::HealthStatus;

/// Name the gateway reports itself under.
pub const SERVICE_NAME: &str = "gateway";

/// The answer to a `Health` probe.
pub(crate) fn status(uptime: Duration) -> HealthStatus {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    HealthStatus {
        service: SERVICE_NAME.to_string(),
        status: "ok".to_string(),
        uptime_ms: uptime.as_millis() as u64,
        timestamp,
    }
}

use realmsync_protocol::{AccountId, ResourceId, ZoneId};
use realmsync_store::ResourceNode;

/// Published on every population change. The gateway relays these to
/// clients.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEvent {
    Spawned(ResourceNode),
    Despawned {
        resource_id: ResourceId,
        zone_id: ZoneId,
        /// Learns of the despawn from its gather reply, not the event.
        gatherer: AccountId,
    },
}

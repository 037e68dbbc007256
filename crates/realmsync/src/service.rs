//! Pass-through actions.
//!
//! Combat and crafting are not part of this core. Their actions are handed
//! to an [`ActionService`] as-is, and whatever the service answers goes
//! back to the client in the usual `{success, data | error}` shape.

use std::future::Future;

use realmsync_protocol::{AccountId, ActionKind, ActionReply, ErrorClass};

/// Failures reported by an [`ActionService`].
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Nothing handles this kind of action.
    #[error("no service registered for {0}")]
    Unavailable(&'static str),

    /// The service was reached but failed.
    #[error("service failed: {0}")]
    Failed(String),
}

impl ServiceError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Downstream
    }
}

/// Handles the actions the gateway forwards rather than owns
/// (`combat.attack`, `craft.item`).
///
/// A reply with `success: false` is a normal answer and is relayed to the
/// client verbatim. Return an error only when the service itself could not
/// do its job.
pub trait ActionService: Send + Sync + 'static {
    fn forward(
        &self,
        account_id: AccountId,
        kind: ActionKind,
        data: serde_json::Value,
    ) -> impl Future<Output = Result<ActionReply, ServiceError>> + Send;
}

/// The default: no pass-through service is registered.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoActionService;

impl ActionService for NoActionService {
    async fn forward(
        &self,
        _account_id: AccountId,
        kind: ActionKind,
        _data: serde_json::Value,
    ) -> Result<ActionReply, ServiceError> {
        Err(ServiceError::Unavailable(kind.as_str()))
    }
}

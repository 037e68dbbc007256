//! Identity verification.
//!
//! Realmsync does not issue or check credentials itself. The
//! [`IdentityOracle`] trait is the seam: one async method that takes the
//! bearer credential from a handshake and answers with an [`Identity`] or
//! an error. Production deployments wrap their auth service; tests and the
//! dev binary use [`StaticTokenOracle`].

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use realmsync_protocol::AccountId;

use crate::SessionError;

/// Who a verified credential belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub account_id: AccountId,
    pub display_name: String,
}

/// Verifies bearer credentials.
///
/// # Example
///
/// ```rust
/// use realmsync_protocol::AccountId;
/// use realmsync_session::{Identity, IdentityOracle, SessionError};
///
/// /// Treats the credential as a numeric account id.
/// struct NumericOracle;
///
/// impl IdentityOracle for NumericOracle {
///     async fn verify(&self, credential: &str) -> Result<Identity, SessionError> {
///         let id: u64 = credential.parse().map_err(|_| {
///             SessionError::AuthFailed("credential must be a number".into())
///         })?;
///         Ok(Identity {
///             account_id: AccountId(id),
///             display_name: format!("player{id}"),
///         })
///     }
/// }
/// ```
pub trait IdentityOracle: Send + Sync + 'static {
    /// Verifies `credential` (already stripped of any `Bearer ` prefix).
    ///
    /// # Errors
    /// - [`SessionError::AuthFailed`] when the credential is rejected
    /// - [`SessionError::Unavailable`] when the oracle cannot be reached
    fn verify(
        &self,
        credential: &str,
    ) -> impl Future<Output = Result<Identity, SessionError>> + Send;
}

/// Extracts the token from a raw handshake credential.
///
/// Accepts both `"Bearer <token>"` and a bare `"<token>"`. Returns `None`
/// for an empty credential.
pub fn bearer_token(raw: &str) -> Option<&str> {
    let raw = raw.trim_start();
    let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
    (!token.is_empty()).then_some(token)
}

/// Runs the handshake checks in order: protocol version, credential
/// presence, then oracle verification bounded by `verify_timeout`.
///
/// # Errors
/// - [`SessionError::VersionMismatch`] if `version != expected_version`
/// - [`SessionError::AuthFailed`] for a missing or rejected credential
/// - [`SessionError::Timeout`] if the oracle is too slow
pub async fn authenticate<O: IdentityOracle>(
    oracle: &O,
    expected_version: u32,
    version: u32,
    credential: Option<&str>,
    verify_timeout: Duration,
) -> Result<Identity, SessionError> {
    if version != expected_version {
        return Err(SessionError::VersionMismatch {
            expected: expected_version,
            actual: version,
        });
    }

    let token = credential
        .and_then(bearer_token)
        .ok_or_else(|| SessionError::AuthFailed("missing credential".into()))?;

    tokio::time::timeout(verify_timeout, oracle.verify(token))
        .await
        .map_err(|_| SessionError::Timeout)?
}

/// An [`IdentityOracle`] backed by a fixed token table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenOracle {
    tokens: HashMap<String, Identity>,
}

impl StaticTokenOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a token, builder style.
    pub fn with_token(
        mut self,
        token: impl Into<String>,
        account_id: AccountId,
        display_name: impl Into<String>,
    ) -> Self {
        self.tokens.insert(
            token.into(),
            Identity {
                account_id,
                display_name: display_name.into(),
            },
        );
        self
    }

    /// Parses a table of the form `token=account_id:name,token=account_id:name`.
    ///
    /// # Errors
    /// [`SessionError::InvalidTokenTable`] naming the first bad entry.
    pub fn parse(table: &str) -> Result<Self, SessionError> {
        let mut oracle = Self::new();
        for entry in table.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let invalid = || SessionError::InvalidTokenTable(entry.to_string());
            let (token, rest) = entry.split_once('=').ok_or_else(invalid)?;
            let (account, name) = rest.split_once(':').ok_or_else(invalid)?;
            let account: u64 = account.trim().parse().map_err(|_| invalid())?;
            oracle = oracle.with_token(token.trim(), AccountId(account), name.trim());
        }
        Ok(oracle)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl IdentityOracle for StaticTokenOracle {
    async fn verify(&self, credential: &str) -> Result<Identity, SessionError> {
        self.tokens
            .get(credential)
            .cloned()
            .ok_or_else(|| SessionError::AuthFailed("unknown token".into()))
    }
}

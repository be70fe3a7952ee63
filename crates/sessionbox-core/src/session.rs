//! Conversation-scoped sandbox identity.
//!
//! Every sandbox call made on behalf of one conversation carries the same
//! `SessionId`, which is what keeps interpreter state (variables, imports,
//! files) alive between turns. The id and the credential used to reach the
//! pool travel together in a `SessionContext` that callers pass explicitly.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::auth::CredentialProvider;

pub const DEFAULT_SESSION_PREFIX: &str = "gpt-demo";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// `<prefix>-<8 hex chars>`, e.g. `gpt-demo-1a2b3c4d`.
    pub fn generate(prefix: &str) -> Self {
        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
        Self(format!("{}-{}", prefix, suffix))
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone)]
pub struct SessionContext {
    id: SessionId,
    credential: Arc<dyn CredentialProvider>,
}

impl SessionContext {
    pub fn new(id: SessionId, credential: Arc<dyn CredentialProvider>) -> Self {
        Self { id, credential }
    }

    pub fn generate(prefix: &str, credential: Arc<dyn CredentialProvider>) -> Self {
        Self::new(SessionId::generate(prefix), credential)
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn credential(&self) -> &dyn CredentialProvider {
        self.credential.as_ref()
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

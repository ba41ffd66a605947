//! Identity provider collaborator.
//!
//! Authentication itself happens elsewhere; this crate only needs to turn a
//! presented token into the identity of the current user.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// The authenticated user behind a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
pub trait IdentityProvider: Send + Sync {
    /// Resolve the user owning `token`, or `None` if the token is unknown.
    fn current_user(&self, token: &str) -> Option<UserIdentity>;
}

/// Identity provider backed by a fixed token table, loaded from configuration.
pub struct StaticTokenIdentityProvider {
    users_by_token: HashMap<String, UserIdentity>,
}

impl StaticTokenIdentityProvider {
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, UserIdentity)>,
    {
        let mut users_by_token = HashMap::new();
        for (token, user) in entries {
            if token.trim().is_empty() {
                warn!("Ignoring empty token configured for user {}", user.id);
                continue;
            }
            if users_by_token.insert(token, user.clone()).is_some() {
                warn!("Duplicate token configured, user {} wins", user.id);
            }
        }
        Self { users_by_token }
    }

    pub fn users_count(&self) -> usize {
        self.users_by_token.len()
    }
}

impl IdentityProvider for StaticTokenIdentityProvider {
    fn current_user(&self, token: &str) -> Option<UserIdentity> {
        self.users_by_token.get(token.trim()).cloned()
    }
}

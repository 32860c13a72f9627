use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use xpchat_types::ChatError;
use xpchat_types::api::InviteOutcome;
use xpchat_types::collab::{MembershipStore, normalize_invite_code};
use xpchat_types::models::Identity;

use crate::Database;
use crate::models::Redemption;

/// [`MembershipStore`] over the SQLite members and invites tables.
#[derive(Clone)]
pub struct SqliteMembership {
    db: Arc<Database>,
}

impl SqliteMembership {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, ChatError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ChatError::NetworkUnavailable("STORE_UNAVAILABLE".into())
            })?
            .map_err(|e| {
                error!("Membership query failed: {:#}", e);
                ChatError::NetworkUnavailable("STORE_UNAVAILABLE".into())
            })
    }
}

#[async_trait]
impl MembershipStore for SqliteMembership {
    async fn is_member(&self, space_id: &str, identity_id: &str) -> Result<bool, ChatError> {
        let (space_id, identity_id) = (space_id.to_string(), identity_id.to_string());
        self.blocking(move |db| db.is_member(&space_id, &identity_id))
            .await
    }

    async fn redeem_invite(
        &self,
        space_id: &str,
        code: &str,
        identity: Option<&Identity>,
    ) -> Result<InviteOutcome, ChatError> {
        let code = normalize_invite_code(code)?;
        let identity = identity.ok_or(ChatError::AuthRequired)?.clone();
        let space = space_id.to_string();

        let redemption = {
            let (code, identity, space) = (code.clone(), identity.clone(), space.clone());
            self.blocking(move |db| db.redeem_invite(&code, &space, &identity.id, &identity.display_name))
                .await?
        };

        match redemption {
            Redemption::Joined => {
                info!("{} joined {} with invite {}", identity.id, space, code);
                Ok(InviteOutcome { already: false })
            }
            Redemption::AlreadyMember => Ok(InviteOutcome { already: true }),
            Redemption::Invalid => Err(ChatError::InviteInvalid),
            Redemption::Disabled => Err(ChatError::backend("INVITE_DISABLED", "invite is disabled")),
        }
    }
}

#[cfg(test)]
mod tests {
    use xpchat_types::ValidationError;

    use super::*;

    fn store() -> SqliteMembership {
        let db = Database::open_in_memory().unwrap();
        db.upsert_invite("WELCOME-1", "europe", "member", true).unwrap();
        SqliteMembership::new(Arc::new(db))
    }

    #[tokio::test]
    async fn codes_are_normalized_before_lookup() {
        let store = store();
        let ana = Identity::new("u1", "ana");

        let outcome = store.redeem_invite("europe", "  welcome-1 ", Some(&ana)).await.unwrap();
        assert_eq!(outcome, InviteOutcome { already: false });
        assert!(store.is_member("europe", "u1").await.unwrap());

        let outcome = store.redeem_invite("europe", "WELCOME-1", Some(&ana)).await.unwrap();
        assert!(outcome.already);
    }

    #[tokio::test]
    async fn failures_map_to_chat_errors() {
        let store = store();
        let ana = Identity::new("u1", "ana");

        assert_eq!(
            store.redeem_invite("europe", " ", Some(&ana)).await.unwrap_err(),
            ChatError::ValidationFailed(ValidationError::CodeRequired)
        );
        assert_eq!(
            store.redeem_invite("europe", "WELCOME-1", None).await.unwrap_err(),
            ChatError::AuthRequired
        );
        assert_eq!(
            store.redeem_invite("europe", "BOGUS", Some(&ana)).await.unwrap_err(),
            ChatError::InviteInvalid
        );
        assert!(!store.is_member("europe", "u1").await.unwrap());
    }
}

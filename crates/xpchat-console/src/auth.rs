use async_trait::async_trait;
use tokio::sync::watch;
use tracing::info;

use xpchat_types::ChatError;
use xpchat_types::collab::AuthProvider;
use xpchat_types::models::Identity;

/// Auth provider for a single local user. Signing in always yields the same
/// identity for the same name.
pub struct LocalAuth {
    name: String,
    tx: watch::Sender<Option<Identity>>,
}

impl LocalAuth {
    pub fn new(name: impl Into<String>) -> Self {
        let (tx, _) = watch::channel(None);
        Self { name: name.into(), tx }
    }

    pub fn current(&self) -> Option<Identity> {
        self.tx.borrow().clone()
    }

    fn identity(&self) -> Option<Identity> {
        let slug: String = self
            .name
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        if slug.is_empty() {
            return None;
        }
        Some(Identity::new(format!("local-{slug}"), &self.name))
    }
}

#[async_trait]
impl AuthProvider for LocalAuth {
    async fn sign_in(&self) -> Result<Identity, ChatError> {
        let identity = self
            .identity()
            .ok_or_else(|| ChatError::backend("AUTH_FAILED", "no usable user name"))?;
        info!("Signed in as {} ({})", identity.display_name, identity.id);
        self.tx.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), ChatError> {
        if self.tx.send_replace(None).is_some() {
            info!("Signed out");
        }
        Ok(())
    }

    fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.tx.subscribe()
    }
}

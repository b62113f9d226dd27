//! Adapters from [`Storage`] onto the form controller's collaborator traits.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Duration;
use form_step::{FlashStore, StepContext, ValuesProvider, ValuesStore};
use shared::{
    domain::SessionId,
    protocol::{FlashKey, ValuesPayload},
};

use crate::Storage;

/// Flash storage bound to one session. Built per request.
#[derive(Clone)]
pub struct SessionFlash {
    storage: Storage,
    session_id: SessionId,
    max_age: Option<Duration>,
}

impl SessionFlash {
    pub fn new(storage: Storage, session_id: SessionId) -> Self {
        Self {
            storage,
            session_id,
            max_age: None,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }
}

#[async_trait]
impl FlashStore for SessionFlash {
    async fn read(&self, key: FlashKey) -> anyhow::Result<Vec<serde_json::Value>> {
        self.storage
            .take_flash(&self.session_id, key, self.max_age)
            .await
    }

    async fn write(&self, key: FlashKey, payload: serde_json::Value) -> anyhow::Result<()> {
        self.storage.push_flash(&self.session_id, key, &payload).await
    }
}

/// Step values keyed by session and step path. Shared by every step.
#[derive(Clone)]
pub struct SessionValues {
    storage: Storage,
}

impl SessionValues {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl ValuesProvider for SessionValues {
    async fn get_values(&self, ctx: &StepContext) -> anyhow::Result<ValuesPayload> {
        let Some(session_id) = &ctx.session_id else {
            return Ok(ValuesPayload::default());
        };
        let values = self
            .storage
            .load_step_values(session_id, &ctx.request.path)
            .await?
            .unwrap_or_default();
        Ok(ValuesPayload {
            values,
            action: None,
        })
    }
}

#[async_trait]
impl ValuesStore for SessionValues {
    async fn save_values(&self, ctx: &StepContext) -> anyhow::Result<()> {
        let session_id = ctx
            .session_id
            .as_ref()
            .ok_or_else(|| anyhow!("no session to save values for '{}'", ctx.request.path))?;
        self.storage
            .save_step_values(session_id, &ctx.request.path, &ctx.values)
            .await
    }
}

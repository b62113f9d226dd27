//! Seams to the surrounding application: flash storage, stored values,
//! persistence and cross-field validation.

use std::{collections::HashMap, sync::Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use shared::{error::ErrorsMap, protocol::{FlashKey, ValuesPayload}};

use crate::context::StepContext;

/// Session-scoped storage that survives exactly one redirect. `read`
/// consumes everything stored under the key.
#[async_trait]
pub trait FlashStore: Send + Sync {
    async fn read(&self, key: FlashKey) -> anyhow::Result<Vec<serde_json::Value>>;
    async fn write(&self, key: FlashKey, payload: serde_json::Value) -> anyhow::Result<()>;
}

/// Supplies previously stored values (and optionally a form action) on GET.
#[async_trait]
pub trait ValuesProvider: Send + Sync {
    async fn get_values(&self, ctx: &StepContext) -> anyhow::Result<ValuesPayload>;
}

/// Persists `ctx.values` after a successful validation.
#[async_trait]
pub trait ValuesStore: Send + Sync {
    async fn save_values(&self, ctx: &StepContext) -> anyhow::Result<()>;
}

/// Cross-field failure from a [`FormValidator`].
#[derive(Debug, Clone, PartialEq)]
pub enum FormRejection {
    /// Field-shaped errors, routed exactly like per-field failures.
    Fields(ErrorsMap),
    /// Anything else. Not classifiable as a validation error.
    Opaque(serde_json::Value),
}

/// Runs once per POST, and only when every field passed its own checks.
#[async_trait]
pub trait FormValidator: Send + Sync {
    async fn validate_form(&self, ctx: &StepContext) -> anyhow::Result<Option<FormRejection>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoStoredValues;

#[async_trait]
impl ValuesProvider for NoStoredValues {
    async fn get_values(&self, _ctx: &StepContext) -> anyhow::Result<ValuesPayload> {
        Ok(ValuesPayload::default())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardValues;

#[async_trait]
impl ValuesStore for DiscardValues {
    async fn save_values(&self, _ctx: &StepContext) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptForm;

#[async_trait]
impl FormValidator for AcceptForm {
    async fn validate_form(&self, _ctx: &StepContext) -> anyhow::Result<Option<FormRejection>> {
        Ok(None)
    }
}

/// Process-local flash storage for a single session.
#[derive(Debug, Default)]
pub struct MemoryFlash {
    entries: Mutex<HashMap<FlashKey, Vec<serde_json::Value>>>,
}

impl MemoryFlash {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries stored under `key`, without consuming them.
    pub fn peek(&self, key: FlashKey) -> Vec<serde_json::Value> {
        self.entries
            .lock()
            .map(|entries| entries.get(&key).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

#[async_trait]
impl FlashStore for MemoryFlash {
    async fn read(&self, key: FlashKey) -> anyhow::Result<Vec<serde_json::Value>> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("flash lock poisoned"))?;
        Ok(entries.remove(&key).unwrap_or_default())
    }

    async fn write(&self, key: FlashKey, payload: serde_json::Value) -> anyhow::Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("flash lock poisoned"))?;
        entries.entry(key).or_default().push(payload);
        Ok(())
    }
}

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use anyhow::Context;
use serde::Serialize;
use shared::{
    domain::{FieldValue, ValuesMap},
    error::ErrorsMap,
    protocol::FlashKey,
};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{
    collaborators::{
        AcceptForm, DiscardValues, FormRejection, FormValidator, NoStoredValues, ValuesProvider,
        ValuesStore,
    },
    config::ControllerConfig,
    context::{Method, StepContext},
    error::{ConfigError, FormError},
    events::{StepEvent, StepEvents},
    registry::{default_registry, Registry},
    schema::FieldSchema,
};

/// What the template receives on GET.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderPayload {
    pub next_page: Option<String>,
    pub errors: BTreeMap<String, serde_json::Value>,
    pub values: ValuesMap,
    pub action: String,
    pub options: ControllerConfig,
}

/// The single terminal action of a request. Failures that are not resolved
/// locally come back as `Err(FormError)` instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Render {
        template: String,
        payload: RenderPayload,
    },
    Redirect {
        target: String,
    },
    MethodNotAllowed,
}

/// One step of a form wizard.
///
/// Immutable once built; share it as `Arc<FormController>` between
/// concurrent requests. All per-request state lives in [`StepContext`].
pub struct FormController {
    config: ControllerConfig,
    template: String,
    fields: Vec<FieldSchema>,
    allowed_errors: BTreeSet<String>,
    values_provider: Arc<dyn ValuesProvider>,
    values_store: Arc<dyn ValuesStore>,
    form_validator: Arc<dyn FormValidator>,
    events: StepEvents,
}

impl FormController {
    pub fn new(config: ControllerConfig) -> Result<Self, ConfigError> {
        Self::with_registry(config, default_registry())
    }

    pub fn with_registry(config: ControllerConfig, registry: &Registry) -> Result<Self, ConfigError> {
        let template = config
            .template
            .clone()
            .filter(|template| !template.trim().is_empty())
            .ok_or(ConfigError::MissingTemplate)?;
        let fields = config
            .fields
            .iter()
            .map(|(name, field)| {
                FieldSchema::build(name, field, &config.default_formatters, registry)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let allowed_errors = config.allowed_errors.iter().cloned().collect();

        Ok(Self {
            config,
            template,
            fields,
            allowed_errors,
            values_provider: Arc::new(NoStoredValues),
            values_store: Arc::new(DiscardValues),
            form_validator: Arc::new(AcceptForm),
            events: StepEvents::new(),
        })
    }

    pub fn with_values_provider(mut self, provider: Arc<dyn ValuesProvider>) -> Self {
        self.values_provider = provider;
        self
    }

    pub fn with_values_store(mut self, store: Arc<dyn ValuesStore>) -> Self {
        self.values_store = store;
        self
    }

    pub fn with_form_validator(mut self, validator: Arc<dyn FormValidator>) -> Self {
        self.form_validator = validator;
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn next(&self) -> Option<&str> {
        self.config.next.as_deref()
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    pub fn events(&self) -> &StepEvents {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StepEvent> {
        self.events.subscribe()
    }

    /// Dispatches on method. Validation failures are resolved here through
    /// [`Self::error_handler`]; anything else is returned to the caller.
    pub async fn handle(&self, ctx: &mut StepContext) -> Result<Outcome, FormError> {
        let result = match ctx.request.method.clone() {
            Method::Get => self.get(ctx).await,
            Method::Post => self.post(ctx).await,
            Method::Other(method) => {
                debug!(%method, path = %ctx.request.path, "method not allowed");
                return Ok(Outcome::MethodNotAllowed);
            }
        };
        match result {
            Ok(outcome) => Ok(outcome),
            Err(err) => self.error_handler(err, ctx).await,
        }
    }

    /// Builds the render outcome. A fieldless step with `next` emits
    /// `complete` here, before the caller renders; listeners see the step as
    /// complete even if rendering then fails.
    pub async fn get(&self, ctx: &StepContext) -> Result<Outcome, FormError> {
        let provided = self.values_provider.get_values(ctx).await.map_err(|err| {
            error!(path = %ctx.request.path, error = %err, "values provider failed");
            err
        })?;

        let errors = self.filter_errors(latest_object(ctx.flash.read(FlashKey::Errors).await?));
        let mut values = provided.values;
        values.extend(latest_object(ctx.flash.read(FlashKey::Values).await?));
        let action = provided
            .action
            .unwrap_or_else(|| ctx.request.prefixed(&ctx.request.path));

        let outcome = Outcome::Render {
            template: self.template.clone(),
            payload: RenderPayload {
                next_page: self.config.next.clone(),
                errors,
                values,
                action,
                options: self.config.clone(),
            },
        };

        if self.fields.is_empty() && self.config.next.is_some() {
            debug!(path = %ctx.request.path, "step has no fields, completing on view");
            self.emit_complete(ctx, &outcome);
        }
        Ok(outcome)
    }

    pub async fn post(&self, ctx: &mut StepContext) -> Result<Outcome, FormError> {
        ctx.values = self.format(&ctx.request.body);
        debug!(path = %ctx.request.path, fields = ctx.values.len(), "formatted submission");

        self.validate(ctx).await?;

        self.values_store.save_values(ctx).await.map_err(|err| {
            error!(path = %ctx.request.path, error = %err, "saving values failed");
            err
        })?;
        Ok(self.success_handler(ctx))
    }

    /// Formats every declared field present in `body`. Undeclared keys are
    /// dropped; absent fields are not defaulted.
    pub fn format(&self, body: &BTreeMap<String, String>) -> ValuesMap {
        self.fields
            .iter()
            .filter_map(|field| {
                body.get(&field.name)
                    .map(|raw| (field.name.clone(), field.format(raw)))
            })
            .collect()
    }

    /// Checks every field with validators exactly once. Each field stops at
    /// its first failure; other fields are still checked.
    pub fn validate_fields(&self, values: &ValuesMap) -> ErrorsMap {
        let missing = FieldValue::Null;
        self.fields
            .iter()
            .filter(|field| field.has_validators())
            .filter_map(|field| field.validate(values.get(&field.name).unwrap_or(&missing)))
            .map(|err| (err.key.clone(), err))
            .collect()
    }

    /// Per-field validation, then the form-level hook if nothing failed.
    pub async fn validate(&self, ctx: &StepContext) -> Result<(), FormError> {
        let errors = self.validate_fields(&ctx.values);
        if !errors.is_empty() {
            warn!(
                path = %ctx.request.path,
                fields = ?errors.keys().collect::<Vec<_>>(),
                "field validation failed"
            );
            return Err(FormError::Validation(errors));
        }

        match self.form_validator.validate_form(ctx).await? {
            None => Ok(()),
            Some(FormRejection::Fields(errors)) => {
                warn!(path = %ctx.request.path, "form-level validation failed");
                Err(FormError::Validation(errors))
            }
            Some(FormRejection::Opaque(reason)) => {
                warn!(path = %ctx.request.path, %reason, "form rejected");
                Err(FormError::Rejected(reason))
            }
        }
    }

    /// Redirects to `next` behind the base URL and announces completion. A
    /// step without `next` redirects back to itself.
    pub fn success_handler(&self, ctx: &StepContext) -> Outcome {
        let next = self.config.next.as_deref().unwrap_or(&ctx.request.path);
        let target = ctx.request.prefixed(next);
        info!(path = %ctx.request.path, %target, "step complete");
        let outcome = Outcome::Redirect { target };
        self.emit_complete(ctx, &outcome);
        outcome
    }

    /// Flashes validation errors (and the submitted values) and redirects,
    /// preferring any error's own redirect over the request path. Other
    /// errors are returned unchanged.
    pub async fn error_handler(
        &self,
        err: FormError,
        ctx: &StepContext,
    ) -> Result<Outcome, FormError> {
        let FormError::Validation(errors) = err else {
            return Err(err);
        };

        let payload =
            serde_json::to_value(&errors).context("failed to serialize validation errors")?;
        ctx.flash.write(FlashKey::Errors, payload).await?;
        let values =
            serde_json::to_value(&ctx.values).context("failed to serialize submitted values")?;
        ctx.flash.write(FlashKey::Values, values).await?;

        let target = errors
            .values()
            .find_map(|err| err.redirect.as_deref())
            .unwrap_or(&ctx.request.path);
        let target = ctx.request.prefixed(target);
        info!(path = %ctx.request.path, %target, "redirecting after validation errors");
        Ok(Outcome::Redirect { target })
    }

    /// Keeps only errors keyed by a declared field or an allowed key.
    pub fn filter_errors(
        &self,
        errors: BTreeMap<String, serde_json::Value>,
    ) -> BTreeMap<String, serde_json::Value> {
        errors
            .into_iter()
            .filter(|(key, _)| {
                self.config.fields.contains_key(key) || self.allowed_errors.contains(key)
            })
            .collect()
    }

    fn emit_complete(&self, ctx: &StepContext, outcome: &Outcome) {
        self.events.emit(StepEvent::Complete {
            request: ctx.request.clone(),
            session_id: ctx.session_id.clone(),
            outcome: outcome.clone(),
        });
    }
}

impl std::fmt::Debug for FormController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormController")
            .field("template", &self.template)
            .field("next", &self.config.next)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

fn latest_object(entries: Vec<serde_json::Value>) -> BTreeMap<String, serde_json::Value> {
    entries
        .into_iter()
        .rev()
        .find_map(|entry| match entry {
            serde_json::Value::Object(map) => Some(map.into_iter().collect()),
            _ => None,
        })
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;

//! Form-step controller.
//!
//! A [`FormController`] renders a declaratively described form on GET and,
//! on POST, formats, validates and persists the submission before routing
//! the user to the next step or back to the form with flashed errors.

pub mod collaborators;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod events;
pub mod registry;
pub mod schema;
pub mod wizard;

pub use collaborators::{FlashStore, FormRejection, FormValidator, MemoryFlash, ValuesProvider, ValuesStore};
pub use config::ControllerConfig;
pub use context::{FormRequest, Method, StepContext};
pub use controller::{FormController, Outcome, RenderPayload};
pub use error::{ConfigError, FormError};
pub use events::{StepEvent, StepEvents};
pub use registry::{default_registry, Registry};
pub use schema::{FieldConfig, FieldSchema};
pub use wizard::{final_step_paths, StepDefinition, WizardDefinition, WizardError};

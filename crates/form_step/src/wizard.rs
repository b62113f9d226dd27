//! Multi-step wizard definitions loaded from TOML.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::ControllerConfig,
    controller::FormController,
    error::ConfigError,
    registry::Registry,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub path: String,
    #[serde(flatten)]
    pub config: ControllerConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WizardDefinition {
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("failed to parse wizard definition: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("wizard step '{path}' is invalid: {source}")]
    Step {
        path: String,
        #[source]
        source: ConfigError,
    },
    #[error("wizard step path '{0}' is declared more than once")]
    DuplicatePath(String),
    #[error("wizard step path '{0}' must start with '/'")]
    RelativePath(String),
}

impl WizardDefinition {
    pub fn from_toml_str(raw: &str) -> Result<Self, WizardError> {
        Ok(toml::from_str(raw)?)
    }

    /// Builds one controller per step, in declaration order.
    pub fn build(&self, registry: &Registry) -> Result<Vec<(String, FormController)>, WizardError> {
        let mut seen = BTreeSet::new();
        self.steps
            .iter()
            .map(|step| {
                if !step.path.starts_with('/') {
                    return Err(WizardError::RelativePath(step.path.clone()));
                }
                if !seen.insert(step.path.as_str()) {
                    return Err(WizardError::DuplicatePath(step.path.clone()));
                }
                let controller = FormController::with_registry(step.config.clone(), registry)
                    .map_err(|source| WizardError::Step {
                        path: step.path.clone(),
                        source,
                    })?;
                Ok((step.path.clone(), controller))
            })
            .collect()
    }

    /// Steps whose `next` does not name another step in this wizard. Not an
    /// error: a step may hand off to a page outside the wizard.
    pub fn external_next_pages(&self) -> Vec<(&str, &str)> {
        let paths: BTreeSet<&str> = self.steps.iter().map(|step| step.path.as_str()).collect();
        self.steps
            .iter()
            .filter_map(|step| {
                let next = step.config.next.as_deref()?;
                (!paths.contains(next)).then_some((step.path.as_str(), next))
            })
            .collect()
    }
}

/// Paths whose completion ends a wizard run: steps without `next`, and steps
/// whose `next` is a fieldless step without `next` of its own (a closing
/// page that never completes itself).
pub fn final_step_paths(steps: &[(String, FormController)]) -> BTreeSet<String> {
    let closing: BTreeSet<&str> = steps
        .iter()
        .filter(|(_, controller)| controller.fields().is_empty() && controller.next().is_none())
        .map(|(path, _)| path.as_str())
        .collect();
    steps
        .iter()
        .filter(|(_, controller)| controller.next().map_or(true, |next| closing.contains(next)))
        .map(|(path, _)| path.clone())
        .collect()
}

use std::{collections::BTreeMap, fmt, sync::Arc};

use serde::Serialize;
use shared::domain::{with_base_url, SessionId, ValuesMap};

use crate::collaborators::FlashStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub enum Method {
    #[default]
    Get,
    Post,
    Other(String),
}

impl From<&str> for Method {
    fn from(value: &str) -> Self {
        if value.eq_ignore_ascii_case("GET") {
            Method::Get
        } else if value.eq_ignore_ascii_case("POST") {
            Method::Post
        } else {
            Method::Other(value.to_ascii_uppercase())
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
            Method::Other(method) => f.write_str(method),
        }
    }
}

/// The inbound request as the controller sees it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormRequest {
    pub method: Method,
    pub path: String,
    pub base_url: Option<String>,
    pub body: BTreeMap<String, String>,
    pub params: BTreeMap<String, String>,
}

impl FormRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn post<I, K, V>(path: impl Into<String>, body: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            method: Method::Post,
            path: path.into(),
            body: body
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: impl Into<Method>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// `target` behind this request's base URL, if it has one.
    pub fn prefixed(&self, target: &str) -> String {
        with_base_url(self.base_url.as_deref(), target)
    }
}

/// Per-request state threaded through the pipeline. Owned by exactly one
/// request; never shared.
pub struct StepContext {
    pub request: FormRequest,
    pub session_id: Option<SessionId>,
    pub flash: Arc<dyn FlashStore>,
    /// Formatted values, filled in by the POST pipeline.
    pub values: ValuesMap,
}

impl StepContext {
    pub fn new(request: FormRequest, flash: Arc<dyn FlashStore>) -> Self {
        Self {
            request,
            session_id: None,
            flash,
            values: ValuesMap::new(),
        }
    }

    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }
}

impl fmt::Debug for StepContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepContext")
            .field("request", &self.request)
            .field("session_id", &self.session_id)
            .field("values", &self.values)
            .finish_non_exhaustive()
    }
}

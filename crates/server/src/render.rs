use form_step::RenderPayload;
use tera::Tera;
use thiserror::Error;

const TEMPLATE_EXTENSION: &str = "html";

/// Renders step templates. A step's `template` name maps to
/// `<name>.html` in the loaded set.
pub struct Renderer {
    tera: Tera,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template not found: {0}")]
    NotFound(String),

    #[error("failed to load templates: {0}")]
    Load(String),

    #[error("template rendering error: {0}")]
    Render(String),
}

impl Renderer {
    pub fn from_glob(glob: &str) -> Result<Self, RenderError> {
        let tera = Tera::new(glob).map_err(|e| RenderError::Load(e.to_string()))?;
        Ok(Self { tera })
    }

    pub fn from_raw<'a>(
        templates: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(templates)
            .map_err(|e| RenderError::Load(e.to_string()))?;
        Ok(Self { tera })
    }

    /// Fails on the first step template that is not loaded.
    pub fn ensure_templates<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), RenderError> {
        for name in names {
            let file = template_file(name);
            if !self.tera.get_template_names().any(|loaded| loaded == file) {
                return Err(RenderError::NotFound(file));
            }
        }
        Ok(())
    }

    pub fn render(&self, template: &str, payload: &RenderPayload) -> Result<String, RenderError> {
        let context = tera::Context::from_serialize(payload)
            .map_err(|e| RenderError::Render(e.to_string()))?;
        let file = template_file(template);
        self.tera.render(&file, &context).map_err(|e| match e.kind {
            tera::ErrorKind::TemplateNotFound(_) => RenderError::NotFound(file.clone()),
            _ => RenderError::Render(e.to_string()),
        })
    }
}

fn template_file(name: &str) -> String {
    format!("{name}.{TEMPLATE_EXTENSION}")
}

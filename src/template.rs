//! Renders webhook payloads via tera templates.
//!
//! Two fragments are registered: [TITLE] for the markdown title and
//! [CONTENT] for the markdown body. Both are rendered with the complete
//! [WebhookMessage] as context. The built-in fragments can be replaced by
//! files configured in the `templates` section.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tera::Tera;

use crate::{alert::WebhookMessage, error::Error};

pub const TITLE: &str = "ding.link.title";
pub const CONTENT: &str = "ding.link.content";
const MACROS: &str = "ding.macros";

const DEFAULT_TITLE: &str = include_str!("../templates/title.tera");
const DEFAULT_CONTENT: &str = include_str!("../templates/content.tera");
const DEFAULT_MACROS: &str = include_str!("../templates/macros.tera");

#[derive(Debug, Clone, Default, Deserialize)]
/// optional template files replacing the built-in fragments
pub struct TemplateSettings {
    pub title: Option<PathBuf>,
    pub content: Option<PathBuf>,
}

#[derive(Debug)]
/// Alert renderer
pub struct AlertRenderer {
    tera: Tera,
}

impl AlertRenderer {
    /// Return new renderer, reading template overrides from disk
    pub fn new(settings: &TemplateSettings) -> Result<Self> {
        let title = match &settings.title {
            Some(path) => fs::read_to_string(path)
                .with_context(|| format!("could not read title template {}", path.display()))?,
            None => DEFAULT_TITLE.to_owned(),
        };

        let content = match &settings.content {
            Some(path) => fs::read_to_string(path)
                .with_context(|| format!("could not read content template {}", path.display()))?,
            None => DEFAULT_CONTENT.to_owned(),
        };

        Self::from_sources(&title, &content).context("could not compile templates")
    }

    #[cfg(test)]
    pub fn builtin() -> Result<Self, tera::Error> {
        Self::from_sources(DEFAULT_TITLE, DEFAULT_CONTENT)
    }

    /// compiles title and content fragments, both may use the macros in `ding.macros`
    pub fn from_sources(title: &str, content: &str) -> Result<Self, tera::Error> {
        let mut tera = Tera::default();

        tera.add_raw_templates(vec![
            (MACROS, DEFAULT_MACROS),
            (TITLE, title),
            (CONTENT, content),
        ])?;

        Ok(Self { tera })
    }

    /// Renders one fragment with the payload as context.
    ///
    /// # Arguments
    ///
    /// * `fragment` - either [TITLE] or [CONTENT]
    ///
    /// * `msg` - the decoded alertmanager payload
    pub fn render(&self, fragment: &'static str, msg: &WebhookMessage) -> Result<String, Error> {
        let into_error = |source| Error::Template { fragment, source };

        let context = tera::Context::from_serialize(msg).map_err(into_error)?;

        self.tera.render(fragment, &context).map_err(into_error)
    }
}

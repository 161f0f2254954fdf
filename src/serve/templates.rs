use anyhow::Result;
use axum::response::Html;
use serde::Serialize;
use std::path::Path;
use tera::{Context, Tera};
use tracing::*;

use binder::ids;

use super::error::AppError;

/// Element identifiers shared with the binder, so markup and the wasm side
/// can never drift apart.
#[derive(Debug, Serialize)]
struct ElementIds {
    register_button: &'static str,
    logout_button: &'static str,
    confirm_logout_button: &'static str,
    cancel_logout_button: &'static str,
    logout_popup: &'static str,
}

impl Default for ElementIds {
    fn default() -> Self {
        Self {
            register_button: ids::REGISTER_BUTTON,
            logout_button: ids::LOGOUT_BUTTON,
            confirm_logout_button: ids::CONFIRM_LOGOUT_BUTTON,
            cancel_logout_button: ids::CANCEL_LOGOUT_BUTTON,
            logout_popup: ids::LOGOUT_POPUP,
        }
    }
}

pub struct Templates {
    tera: Tera,
}

impl Templates {
    pub fn new(dir: &Path) -> Result<Self> {
        let pattern = format!("{}/**/*.html", dir.display());
        let tera = Tera::new(&pattern)?;

        debug!(
            templates = ?tera.get_template_names().collect::<Vec<_>>(),
            "templates:loaded"
        );

        Ok(Self { tera })
    }

    pub fn context() -> Context {
        let mut context = Context::new();
        context.insert("ids", &ElementIds::default());
        context
    }

    pub fn render(&self, name: &str, context: &Context) -> Result<Html<String>, AppError> {
        Ok(Html(self.tera.render(name, context)?))
    }
}

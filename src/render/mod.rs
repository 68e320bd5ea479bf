//! Page rendering module
//!
//! Holds the two page templates. They are read and compiled once at
//! startup and never reloaded; a restart picks up template changes.

mod template;

pub use template::{RenderError, Template, TemplateError};

use crate::store::Page;
use std::path::{Path, PathBuf};

/// Which page template to render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    View,
    Edit,
}

/// Error raised while loading templates at startup
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read template {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Compile(#[from] TemplateError),
}

/// The compiled view and edit templates
#[derive(Debug, Clone)]
pub struct Templates {
    view: Template,
    edit: Template,
}

impl Templates {
    /// Read and compile both templates from disk
    pub fn load(view_path: &Path, edit_path: &Path) -> Result<Self, LoadError> {
        let view = read_template(view_path)?;
        let edit = read_template(edit_path)?;
        Self::from_sources(&view, &edit).map_err(LoadError::from)
    }

    /// Compile both templates from in-memory sources
    pub fn from_sources(view: &str, edit: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            view: Template::compile("view", view)?,
            edit: Template::compile("edit", edit)?,
        })
    }

    pub const fn get(&self, kind: TemplateKind) -> &Template {
        match kind {
            TemplateKind::View => &self.view,
            TemplateKind::Edit => &self.edit,
        }
    }

    pub fn render(&self, kind: TemplateKind, page: &Page) -> Result<String, RenderError> {
        self.get(kind).render(page)
    }
}

fn read_template(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })
}

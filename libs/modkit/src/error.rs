use std::path::PathBuf;
use thiserror::Error;

use crate::deps::DepsError;

/// Failures while turning the modules config into loaded services.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("module '{module}' has no `resolve` path and no well-known package")]
    UnresolvedPath { module: String },

    #[error("module '{module}' has an invalid declaration: {reason}")]
    InvalidDeclaration { module: String, reason: String },

    #[error("module '{module}': no bootstrap registered for '{path}'")]
    BootstrapNotFound { module: String, path: String },

    #[error("module '{module}' failed to bootstrap from '{path}'")]
    Bootstrap {
        module: String,
        path: String,
        #[source]
        source: anyhow::Error,
    },
}

impl LoadError {
    pub fn module(&self) -> &str {
        match self {
            LoadError::UnresolvedPath { module }
            | LoadError::InvalidDeclaration { module, .. }
            | LoadError::BootstrapNotFound { module, .. }
            | LoadError::Bootstrap { module, .. } => module,
        }
    }
}

/// Fatal composition failures. Link and schema problems never end up here.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("failed to read modules config '{path}'")]
    ModulesConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse modules config '{path}'")]
    ModulesConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid `{section}` entry")]
    InvalidSection {
        section: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("composition already ran (phase: {phase})")]
    AlreadyComposed { phase: crate::runtime::Phase },

    #[error(transparent)]
    Database(#[from] modkit_db::DbError),

    #[error(transparent)]
    Dependencies(#[from] DepsError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

//! Error and diagnostic types for module conversion.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const DIAG_MULTIPLE_SCRIPTS: &str = "MOD001";
pub const DIAG_UNSUPPORTED_MEMBER: &str = "MOD002";
pub const DIAG_MISSING_DECLARATION: &str = "MOD003";
pub const DIAG_IMPORT_CYCLE: &str = "MOD004";
pub const DIAG_DEPENDENCY_FAILED: &str = "MOD005";
pub const DIAG_DUPLICATE_EXPORT: &str = "MOD006";
pub const DIAG_TEMPLATE_EXISTS: &str = "MOD007";
pub const DIAG_SCRIPT_PARSE: &str = "MOD008";
pub const DIAG_DOCUMENT_NOT_FOUND: &str = "MOD009";
pub const DIAG_EXCLUDED_ASSIGNMENT: &str = "MOD010";

// ═══════════════════════════════════════════════════════════════════════════════
// CONVERT ERROR
// ═══════════════════════════════════════════════════════════════════════════════

/// A failure that stops conversion of one document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error("document not found: {url}")]
    DocumentNotFound { url: String },

    #[error("{url}: found {count} inline scripts, expected at most one")]
    MultipleScripts { url: String, count: usize },

    #[error("{url}: failed to parse script: {message}")]
    ScriptParse { url: String, message: String },

    #[error("{url}: namespace `{name}` is assigned but its declaration could not be located")]
    MissingNamespaceDeclaration { url: String, name: String },

    #[error("import cycle detected: {}", .chain.join(" -> "))]
    ImportCycle { chain: Vec<String> },

    #[error("{url}: failed to parse HTML: {message}")]
    Html { url: String, message: String },

    #[error("invalid conversion options: {0}")]
    Options(String),
}

impl ConvertError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::DocumentNotFound { .. } => DIAG_DOCUMENT_NOT_FOUND,
            Self::MultipleScripts { .. } => DIAG_MULTIPLE_SCRIPTS,
            Self::ScriptParse { .. } | Self::Html { .. } | Self::Options(_) => DIAG_SCRIPT_PARSE,
            Self::MissingNamespaceDeclaration { .. } => DIAG_MISSING_DECLARATION,
            Self::ImportCycle { .. } => DIAG_IMPORT_CYCLE,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A reported problem that did not necessarily stop conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub url: String,
}

impl Diagnostic {
    pub fn warning(code: &str, url: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            severity: Severity::Warning,
            message: message.into(),
            url: url.to_string(),
        }
    }

    pub fn error(code: &str, url: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            severity: Severity::Error,
            message: message.into(),
            url: url.to_string(),
        }
    }

    pub fn from_error(url: &str, err: &ConvertError) -> Self {
        Self::error(err.code(), url, err.to_string())
    }
}

//! Language dispatch.
//!
//! A [`LanguageExecutor`] is a capability set: command lines for each
//! phase plus output parsers. Executors are registered by language tag
//! and selected from the file extensions present in a snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use pf_domain::error::{Error, Result};
use pf_domain::session::{CodeSnapshot, Diagnostic, TestRecord};
use serde::{Deserialize, Serialize};

use crate::diagnostics::parse_build_diagnostics;
use crate::languages;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Language tags
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Go,
    Python,
    Typescript,
    Rust,
    C,
    Cpp,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Go => "go",
            Language::Python => "python",
            Language::Typescript => "typescript",
            Language::Rust => "rust",
            Language::C => "c",
            Language::Cpp => "cpp",
        }
    }

    fn from_extension(ext: &str) -> Option<Language> {
        match ext {
            "go" => Some(Language::Go),
            "py" => Some(Language::Python),
            "ts" | "tsx" => Some(Language::Typescript),
            "rs" => Some(Language::Rust),
            "c" => Some(Language::C),
            "cc" | "cpp" | "cxx" => Some(Language::Cpp),
            _ => None,
        }
    }

    /// Infer the snapshot's language from file extensions. The most
    /// frequent recognized extension wins; build files and fixtures
    /// without a recognized extension are ignored.
    pub fn detect(code: &CodeSnapshot) -> Result<Language> {
        let mut counts: HashMap<Language, usize> = HashMap::new();
        for path in code.keys() {
            if let Some(lang) = std::path::Path::new(path)
                .extension()
                .and_then(|e| e.to_str())
                .and_then(Language::from_extension)
            {
                *counts.entry(lang).or_default() += 1;
            }
        }
        counts
            .into_iter()
            // Tie-break by tag so detection is deterministic.
            .max_by_key(|(lang, count)| (*count, std::cmp::Reverse(lang.as_str())))
            .map(|(lang, _)| lang)
            .ok_or_else(|| {
                Error::BadRequest("no recognized source files in snapshot".into())
            })
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Executor capability
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-language tool commands and output parsing.
///
/// Commands are plain argv vectors run inside the sandbox workspace;
/// images are expected to carry the named tools (the local fallback
/// expects them on `PATH`).
pub trait LanguageExecutor: Send + Sync {
    fn language(&self) -> Language;

    /// Default container image for this language.
    fn image(&self) -> &str;

    /// Check formatting without modifying files. Exit 0 = formatted.
    fn format_check_cmd(&self) -> Vec<String>;

    /// Rewrite files in place to canonical formatting.
    fn format_fix_cmd(&self) -> Vec<String>;

    fn build_cmd(&self) -> Vec<String>;

    fn test_cmd(&self, flags: &[String]) -> Vec<String>;

    /// Reduce test output to per-test records. Languages without a
    /// structured test reporter return an empty list.
    fn parse_tests(&self, output: &str) -> Vec<TestRecord> {
        let _ = output;
        Vec::new()
    }

    /// Reduce build output to structured diagnostics.
    fn parse_diagnostics(&self, output: &str) -> Vec<Diagnostic> {
        parse_build_diagnostics(output)
    }
}

/// Build the default language registry.
pub fn default_executors() -> HashMap<Language, Arc<dyn LanguageExecutor>> {
    let executors: Vec<Arc<dyn LanguageExecutor>> = vec![
        Arc::new(languages::go::GoExecutor),
        Arc::new(languages::python::PythonExecutor),
        Arc::new(languages::typescript::TypescriptExecutor),
        Arc::new(languages::rust::RustExecutor),
        Arc::new(languages::cc::CExecutor),
        Arc::new(languages::cc::CppExecutor),
    ];
    executors.into_iter().map(|e| (e.language(), e)).collect()
}

//! Relative-import resolution for discovered source files.
//!
//! Only local source composition matters for page analysis, so package and
//! library imports are ignored. Each resolved import's content is truncated
//! before it is embedded in a prompt.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::domain::truncate_str;

/// Bytes of imported-file content kept per import.
const MAX_IMPORT_CONTENT: usize = 2_000;

/// Extension suffixes probed for each relative import, in order. The bare
/// path comes first so explicit extensions win.
const IMPORT_SUFFIXES: &[&str] = &[
    "",
    ".js",
    ".jsx",
    ".ts",
    ".tsx",
    "/index.js",
    "/index.jsx",
    "/index.ts",
    "/index.tsx",
];

static ES_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    // `import X from './y'`, `import './y'`, `export ... from './y'`
    Regex::new(r#"(?m)^\s*(?:import|export)\b[^'"\n]*['"]([^'"]+)['"]"#)
        .expect("ES import pattern is valid")
});

static REQUIRE_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"require\(\s*['"]([^'"]+)['"]\s*\)"#).expect("require pattern is valid")
});

/// One locally-imported file with its truncated content.
#[derive(Debug, Clone)]
pub struct ResolvedImport {
    /// The path literal as written in the source ("../components/Header").
    pub name: String,
    /// Resolved on-disk path.
    pub path: PathBuf,
    /// Truncated file content.
    pub content: String,
}

/// Scan `content` for relative import statements and load each target's
/// content. Imports that resolve to no existing file, or whose file cannot
/// be read, are skipped; resolution never fails as a whole.
pub fn resolve_imports(content: &str, file_dir: &Path) -> Vec<ResolvedImport> {
    let mut resolved = Vec::new();
    for literal in import_literals(content) {
        if !(literal.starts_with("./") || literal.starts_with("../")) {
            continue;
        }
        if let Some(import) = resolve_one(&literal, file_dir) {
            resolved.push(import);
        }
    }
    resolved
}

/// All import path literals in source order, ES imports first.
fn import_literals(content: &str) -> Vec<String> {
    let mut literals: Vec<String> = ES_IMPORT
        .captures_iter(content)
        .map(|c| c[1].to_string())
        .collect();
    literals.extend(
        REQUIRE_IMPORT
            .captures_iter(content)
            .map(|c| c[1].to_string()),
    );
    literals
}

fn resolve_one(literal: &str, file_dir: &Path) -> Option<ResolvedImport> {
    let base = file_dir.join(literal);
    for suffix in IMPORT_SUFFIXES {
        let candidate = if suffix.is_empty() {
            base.clone()
        } else {
            PathBuf::from(format!("{}{}", base.display(), suffix))
        };
        if !candidate.is_file() {
            continue;
        }
        // Unreadable candidate: treat as no match rather than aborting.
        let Ok(raw) = std::fs::read_to_string(&candidate) else {
            continue;
        };
        return Some(ResolvedImport {
            name: literal.to_string(),
            path: candidate,
            content: truncate_str(&raw, MAX_IMPORT_CONTENT).to_string(),
        });
    }
    None
}

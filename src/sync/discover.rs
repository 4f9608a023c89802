//! Heuristic source discovery inside a cloned repository.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

/// Candidate relative paths for the pages directory, in priority order.
/// Covers the casing and nesting conventions common in React/Next/Vue
/// projects.
pub const PAGE_DIR_CANDIDATES: &[&str] = &[
    "src/pages",
    "src/Pages",
    "pages",
    "src/views",
    "src/screens",
    "src/routes",
    "src/app",
    "app",
    "src/components/pages",
];

/// Candidate relative paths for the API surface, in priority order.
pub const API_DIR_CANDIDATES: &[&str] = &[
    "src/api",
    "api",
    "server/routes",
    "backend/routes",
    "src/routes",
    "routes",
    "src/controllers",
    "server",
    "backend",
];

/// Source file extensions considered during discovery.
pub const SOURCE_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx"];

/// A discovered source file with its path relative to the searched
/// directory, preserved for structure-aware output.
#[derive(Debug, Clone)]
pub struct FileRef {
    pub path: PathBuf,
    pub relative: String,
}

impl FileRef {
    /// File stem used as the page name ("Home.jsx" -> "Home").
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Return the first candidate that exists under `root`, in the fixed
/// priority order. Later candidates are never preferred even when several
/// exist.
pub fn find_source_dir(root: &Path, candidates: &[&str]) -> Option<PathBuf> {
    for candidate in candidates {
        let path = root.join(candidate);
        if path.is_dir() {
            debug!(dir = %path.display(), "found source directory");
            return Some(path);
        }
    }
    None
}

/// Enumerate files under `dir` whose extension is in `extensions`. With
/// `recursive`, descends depth-first; each entry carries its path relative
/// to `dir`. An empty directory yields an empty list, not an error.
pub fn list_source_files(dir: &Path, extensions: &[&str], recursive: bool) -> Vec<FileRef> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if !matches {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .into_owned();
        files.push(FileRef {
            path: entry.path().to_path_buf(),
            relative,
        });
    }
    files
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.') || name == "node_modules")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "// source").unwrap();
    }

    #[test]
    fn probing_returns_first_existing_candidate_in_priority_order() {
        let root = TempDir::new().unwrap();
        // Both "pages" and "src/pages" exist; "src/pages" wins because it
        // comes first in the candidate list.
        fs::create_dir_all(root.path().join("pages")).unwrap();
        fs::create_dir_all(root.path().join("src/pages")).unwrap();

        let found = find_source_dir(root.path(), PAGE_DIR_CANDIDATES).unwrap();
        assert_eq!(found, root.path().join("src/pages"));
    }

    #[test]
    fn probing_returns_none_when_nothing_matches() {
        let root = TempDir::new().unwrap();
        assert!(find_source_dir(root.path(), PAGE_DIR_CANDIDATES).is_none());
    }

    #[test]
    fn listing_filters_by_extension() {
        let root = TempDir::new().unwrap();
        touch(root.path(), "Home.jsx");
        touch(root.path(), "About.tsx");
        touch(root.path(), "styles.css");
        touch(root.path(), "notes.md");

        let files = list_source_files(root.path(), SOURCE_EXTENSIONS, false);
        let names: Vec<_> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(names, vec!["About.tsx", "Home.jsx"]);
    }

    #[test]
    fn recursive_listing_preserves_relative_paths() {
        let root = TempDir::new().unwrap();
        touch(root.path(), "Home.jsx");
        touch(root.path(), "admin/Users.jsx");
        touch(root.path(), "admin/settings/Profile.tsx");

        let files = list_source_files(root.path(), SOURCE_EXTENSIONS, true);
        let names: Vec<_> = files.iter().map(|f| f.relative.as_str()).collect();
        assert!(names.contains(&"Home.jsx"));
        assert!(names.contains(&"admin/Users.jsx"));
        assert!(names.contains(&"admin/settings/Profile.tsx"));
    }

    #[test]
    fn non_recursive_listing_stays_at_top_level() {
        let root = TempDir::new().unwrap();
        touch(root.path(), "Home.jsx");
        touch(root.path(), "admin/Users.jsx");

        let files = list_source_files(root.path(), SOURCE_EXTENSIONS, false);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative, "Home.jsx");
    }

    #[test]
    fn empty_directory_yields_empty_list() {
        let root = TempDir::new().unwrap();
        assert!(list_source_files(root.path(), SOURCE_EXTENSIONS, true).is_empty());
    }

    #[test]
    fn hidden_and_vendored_directories_are_skipped() {
        let root = TempDir::new().unwrap();
        touch(root.path(), "Home.jsx");
        touch(root.path(), ".next/Page.jsx");
        touch(root.path(), "node_modules/lib/index.js");

        let files = list_source_files(root.path(), SOURCE_EXTENSIONS, true);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].stem(), "Home");
    }
}

//! In-memory template store

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Named, immutable template texts.
///
/// A file registers under both its file name and its stem (the name up to
/// the first dot), so `greet.pmt` resolves as `greet.pmt` and as `greet`.
/// Tag names arrive lowercased from the parser, so template files should
/// use lowercase names.
#[derive(Debug, Default)]
pub struct TemplateStore {
    templates: HashMap<String, String>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template under one name, replacing any previous entry.
    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        let name = name.into();
        debug!(%name, "TemplateStore::insert: called");
        self.templates.insert(name, text.into());
    }

    /// Look up template text by exact name.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        let found = self.templates.get(name).map(String::as_str);
        debug!(%name, found = found.is_some(), "TemplateStore::resolve");
        found
    }

    /// Load templates from files, registering each under its file name and
    /// its stem. Unreadable paths are skipped with a warning rather than
    /// failing the whole load.
    pub fn load_paths(paths: &[PathBuf]) -> Self {
        let mut store = Self::new();
        for path in paths {
            match std::fs::read_to_string(path) {
                Ok(text) => store.register_file(path, text),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "TemplateStore::load_paths: skipping unreadable file");
                }
            }
        }
        debug!(count = store.len(), "TemplateStore::load_paths: loaded");
        store
    }

    fn register_file(&mut self, path: &Path, text: String) {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            warn!(path = %path.display(), "TemplateStore::register_file: unusable file name");
            return;
        };
        let stem = match file_name.find('.') {
            Some(idx) if idx > 0 => &file_name[..idx],
            _ => file_name,
        };
        debug!(%file_name, %stem, "TemplateStore::register_file: registering");
        if stem != file_name {
            self.insert(stem, text.clone());
        }
        self.insert(file_name, text);
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Registered names, for startup logging.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_insert_and_resolve() {
        let mut store = TemplateStore::new();
        store.insert("greet", "Say hi to {{name}}");
        assert_eq!(store.resolve("greet"), Some("Say hi to {{name}}"));
        assert_eq!(store.resolve("missing"), None);
    }

    #[test]
    fn test_load_paths_registers_name_and_stem() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("greet.pmt");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "Say hi to {{{{name}}}}").unwrap();

        let store = TemplateStore::load_paths(&[path]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.resolve("greet"), Some("Say hi to {{name}}"));
        assert_eq!(store.resolve("greet.pmt"), Some("Say hi to {{name}}"));
    }

    #[test]
    fn test_load_paths_skips_unreadable() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("a.pmt");
        std::fs::write(&good, "text").unwrap();
        let missing = dir.path().join("nope.pmt");

        let store = TemplateStore::load_paths(&[good, missing]);
        assert_eq!(store.resolve("a"), Some("text"));
        assert_eq!(store.resolve("nope"), None);
    }

    #[test]
    fn test_stem_uses_first_dot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plan.v2.pmt");
        std::fs::write(&path, "text").unwrap();

        let store = TemplateStore::load_paths(&[path]);
        assert_eq!(store.resolve("plan"), Some("text"));
        assert_eq!(store.resolve("plan.v2.pmt"), Some("text"));
    }
}

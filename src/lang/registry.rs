//! Language registry for name- and extension-based lookup.
//!
//! Provides a singleton registry mapping language names and file
//! extensions to their [`LanguageCfg`] implementations.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use crate::lang::{c, java, LanguageCfg};

static REGISTRY: OnceLock<LanguageRegistry> = OnceLock::new();

/// Registry mapping language names and file extensions to language
/// implementations.
pub struct LanguageRegistry {
    by_name: HashMap<&'static str, Box<dyn LanguageCfg>>,
    by_ext: HashMap<&'static str, &'static str>,
}

impl LanguageRegistry {
    /// Get the global language registry singleton.
    pub fn global() -> &'static Self {
        REGISTRY.get_or_init(Self::new)
    }

    fn new() -> Self {
        let mut registry = Self {
            by_name: HashMap::new(),
            by_ext: HashMap::new(),
        };
        registry.register(Box::new(c::C));
        registry.register(Box::new(java::Java));
        registry
    }

    fn register(&mut self, lang: Box<dyn LanguageCfg>) {
        let name = lang.name();
        for ext in lang.extensions() {
            self.by_ext.insert(*ext, name);
        }
        self.by_name.insert(name, lang);
    }

    /// Get a language by name (e.g. "c").
    pub fn get_by_name(&self, name: &str) -> Option<&dyn LanguageCfg> {
        self.by_name.get(name).map(|b| b.as_ref())
    }

    /// Get a language by file extension (e.g. ".java").
    pub fn get_by_extension(&self, ext: &str) -> Option<&dyn LanguageCfg> {
        self.by_ext.get(ext).and_then(|name| self.get_by_name(name))
    }

    /// Auto-detect language from a file path's extension.
    pub fn detect_language(&self, path: &Path) -> Option<&dyn LanguageCfg> {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| format!(".{}", ext))
            .and_then(|ext| self.get_by_extension(&ext))
    }

    /// List all registered language names.
    pub fn supported_languages(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.by_name.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Check whether a language name is registered.
    pub fn is_supported(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }
}

use std::collections::HashMap;
use std::path::PathBuf;

use tantivy::tokenizer::{SimpleTokenizer, TextAnalyzer};

/// Where the on-disk index data lives, or that it doesn't live on disk at
/// all. Mirrors the teacher's `IndexStorageType` (`engine/src/structures.rs`
/// in spirit: `TempFile` / `Memory` / `FileSystem(path)`), trimmed to the two
/// locations this gateway's contract (§4.2 `reset`) actually distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexLocation {
    Memory,
    Directory(PathBuf),
}

impl IndexLocation {
    pub fn is_on_disk(&self) -> bool {
        matches!(self, IndexLocation::Directory(_))
    }
}

/// Settings consumed by the gateway: where the index lives and what language
/// to analyze with when a mutation doesn't name a culture.
#[derive(Debug, Clone)]
pub struct Settings {
    pub location: IndexLocation,
    pub default_language: String,
}

impl Settings {
    pub fn in_memory(default_language: impl Into<String>) -> Self {
        Self {
            location: IndexLocation::Memory,
            default_language: default_language.into(),
        }
    }

    pub fn on_disk(path: PathBuf, default_language: impl Into<String>) -> Self {
        Self {
            location: IndexLocation::Directory(path),
            default_language: default_language.into(),
        }
    }
}

/// Resolves a culture tag (e.g. `"en-US"`) to the `TextAnalyzer` tantivy
/// should use when tokenizing documents or queries for it.
///
/// Real per-culture stemming/stop-word analyzers are an external concern
/// (§1, out of scope); this registry only has to resolve a tag to *some*
/// analyzer and fall back predictably, the way `QueryHandler::create` in the
/// teacher resolves search fields once against the schema rather than per
/// call (`engine/src/index/queries.rs`).
pub struct CultureAnalyzers {
    default_culture: String,
    analyzers: HashMap<String, TextAnalyzer>,
}

impl CultureAnalyzers {
    /// Registers the built-in `"en-US"` fallback analyzer, plus a second
    /// entry for `default_culture` if it names something else, so a
    /// configured non-English default culture isn't silently shadowed by
    /// the built-in one.
    pub fn new(default_culture: impl Into<String>) -> Self {
        let default_culture = default_culture.into();
        let mut registry = Self {
            default_culture: default_culture.clone(),
            analyzers: HashMap::new(),
        };
        registry.register("en-US", default_analyzer());
        if default_culture != "en-US" {
            registry.register(default_culture, default_analyzer());
        }
        registry
    }

    pub fn register(&mut self, culture: impl Into<String>, analyzer: TextAnalyzer) {
        self.analyzers.insert(culture.into(), analyzer);
    }

    /// Per §9's re-architecture guidance, the analyzer is resolved per call
    /// from a `culture: Option<&str>` parameter rather than carried as
    /// writer-lifetime state.
    pub fn analyzer_for(&self, culture: Option<&str>) -> TextAnalyzer {
        let key = culture.unwrap_or(&self.default_culture);
        self.analyzers
            .get(key)
            .cloned()
            .unwrap_or_else(|| self.analyzers.get(&self.default_culture).cloned().unwrap_or_else(default_analyzer))
    }
}

fn default_analyzer() -> TextAnalyzer {
    TextAnalyzer::from(SimpleTokenizer)
}

impl Default for CultureAnalyzers {
    fn default() -> Self {
        Self::new("en-US")
    }
}

//! Curated word tables driving canonicalization and junk detection.
//!
//! Tables are built once at startup from the built-in lists, then merged
//! with an optional YAML override and an optional plain-text blocklist.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

const ACRONYMS: &[&str] = &[
    "ai", "api", "url", "http", "https", "html", "css", "js", "llm", "ml", "ui", "ux", "ceo",
    "cto", "cfo", "cio", "nft", "vr", "ar", "iot", "saas", "paas", "iaas", "aws", "gcp", "gke",
    "eks", "aks", "sql", "nosql", "json", "xml", "yaml", "csv", "rest", "soap", "grpc", "graphql",
    "tcp", "ip", "dns", "ssl", "tls", "ssh", "vpn", "cdn", "ddos", "xss", "csrf", "jwt", "ci",
    "cd", "cicd", "devops", "mlops", "rss", "seo", "sem", "crm", "erp", "pdf", "docx", "xlsx",
    "pptx", "svg", "png", "jpg", "gif", "ide", "sdk", "cli", "gui", "tui", "os", "ios", "macos",
    "linux", "unix", "ram", "cpu", "gpu", "ssd", "hdd", "faq", "qa", "qc", "sla", "kpi", "roi",
    "mvp",
];

const JUNK_WORDS: &[&str] = &[
    // verbs
    "avoid", "feel", "sign", "read", "view", "click", "get", "make", "see", "go", "come", "take",
    "give", "find", "use", "tell", "ask", "work", "seem", "try", "leave", "call", "keep", "let",
    "begin", "help", "show", "hear", "run", "move", "live", "believe", "bring", "happen", "write",
    "sit", "stand", "lose", "pay", "meet", "include",
    // nouns
    "thing", "stuff", "item", "place", "time", "way", "room", "area", "part", "case", "point",
    "group", "number", "fact", "hand", "eye", "side", "head", "house", "service", "program",
    "question", "problem", "level", "form", "kind", "type", "sort",
    // adjectives
    "good", "bad", "new", "old", "great", "small", "large", "big", "little", "high", "low",
    "long", "short", "different", "same", "important", "public", "able", "own", "other", "early",
    "young", "few", "next", "last", "right", "left", "sure", "best", "better", "worse", "worst",
    // function words
    "a", "an", "the", "and", "or", "but", "if", "because", "as", "until", "while", "of", "at",
    "by", "for", "with", "about", "against", "between", "into", "through", "during", "before",
    "after", "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over",
    "under", "again", "i", "you", "he", "she", "it", "we", "they", "them", "their", "this",
    "that", "these", "those", "who", "which", "what", "where", "when", "why", "how", "all",
    "each", "every", "both", "some", "any", "many", "much",
    // ui chrome
    "signup", "sign up", "login", "log in", "logout", "sign in", "click here", "more", "less",
    "back", "previous", "home", "menu", "subscribe", "follow", "share", "like", "comment",
    "save", "delete",
    // vague descriptors
    "men", "women", "person", "man", "woman", "child", "children", "sea", "land", "water", "air",
    "fire", "earth", "sun", "moon", "day", "night", "week", "month", "year", "morning",
    "evening", "afternoon",
    // single characters
    "b", "c", "d", "e", "f", "g", "h", "j", "k", "l", "m", "n", "o", "p", "q", "r", "s", "t",
    "u", "v", "w", "x", "y", "z", "1", "2", "3", "4", "5", "6", "7", "8", "9", "0",
];

const VALID_ACRONYMS: &[&str] = &[
    "ai", "ml", "ui", "ux", "api", "url", "css", "html", "js", "sql", "aws", "gcp", "ios", "iot",
    "vpn", "cdn", "dns", "ssh", "ssl", "tls", "json", "xml", "rest", "soap", "http", "tcp", "ip",
    "ceo", "cto", "cfo", "hr", "pr", "qa", "ci", "cd", "pm", "dm", "seo", "sem", "crm", "erp",
    "saas", "paas", "iaas", "llm", "nlp", "ocr", "pdf", "docker", "career", "people", "server",
    "system", "user", "coding", "search", "feed", "play",
];

const SYNONYM_GROUPS: &[(&str, &[&str])] = &[
    (
        "AI",
        &["ai", "artificial intelligence", "machine learning", "ml", "llm", "llms", "deep learning"],
    ),
    ("Technology", &["technology", "tech", "technical"]),
    ("Product", &["product", "products"]),
    ("Business", &["business", "company", "enterprise"]),
    ("Design", &["design", "designer", "designers"]),
    ("Development", &["development", "developer", "dev", "developers"]),
    ("Data", &["data", "database", "databases", "analytics"]),
    ("Security", &["security", "cybersecurity", "privacy"]),
    ("Internet", &["network", "networking", "internet"]),
    ("Software", &["software", "application", "app", "applications", "apps"]),
    ("API", &["api", "apis"]),
    ("Web", &["web", "website", "websites"]),
    ("Mobile", &["mobile", "ios", "android"]),
];

#[derive(Debug, Error)]
pub enum VocabularyError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SynonymGroup {
    pub label: String,
    pub variants: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct VocabularyFile {
    #[allow(dead_code)]
    #[serde(default)]
    version: u32,
    #[serde(default)]
    acronyms: Vec<String>,
    #[serde(default)]
    junk_words: Vec<String>,
    #[serde(default)]
    valid_acronyms: Vec<String>,
    #[serde(default)]
    synonym_groups: Vec<SynonymGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    acronyms: BTreeSet<String>,
    junk_words: BTreeSet<String>,
    valid_acronyms: BTreeSet<String>,
    synonym_groups: Vec<SynonymGroup>,
}

fn lowered(words: &[&str]) -> BTreeSet<String> {
    words.iter().map(|w| w.to_lowercase()).collect()
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Vocabulary {
    pub fn builtin() -> Self {
        Self {
            acronyms: lowered(ACRONYMS),
            junk_words: lowered(JUNK_WORDS),
            valid_acronyms: lowered(VALID_ACRONYMS),
            synonym_groups: SYNONYM_GROUPS
                .iter()
                .map(|(label, variants)| SynonymGroup {
                    label: label.to_string(),
                    variants: variants.iter().map(|v| v.to_string()).collect(),
                })
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self {
            acronyms: BTreeSet::new(),
            junk_words: BTreeSet::new(),
            valid_acronyms: BTreeSet::new(),
            synonym_groups: Vec::new(),
        }
    }

    /// Built-in tables merged with the optional override files.
    ///
    /// A configured rules file must exist; a missing blocklist only warns.
    pub fn load(rules: Option<&Path>, blocklist: Option<&Path>) -> Result<Self, VocabularyError> {
        let mut vocabulary = Self::builtin();
        if let Some(path) = rules {
            let text = std::fs::read_to_string(path).map_err(|source| VocabularyError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            vocabulary = vocabulary.merge_yaml(&text).map_err(|source| VocabularyError::Yaml {
                path: path.to_path_buf(),
                source,
            })?;
            info!(path = %path.display(), "loaded vocabulary overrides");
        }
        if let Some(path) = blocklist {
            match std::fs::read_to_string(path) {
                Ok(text) => {
                    vocabulary = vocabulary.merge_blocklist(&text);
                    info!(path = %path.display(), "loaded custom blocklist");
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    warn!(path = %path.display(), "custom blocklist file not found");
                }
                Err(source) => {
                    return Err(VocabularyError::Io {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            }
        }
        Ok(vocabulary)
    }

    /// Additive merge of a YAML override document. A synonym group whose
    /// label already exists gains the new variants; new labels append.
    pub fn merge_yaml(mut self, text: &str) -> Result<Self, serde_yaml::Error> {
        let file: VocabularyFile = serde_yaml::from_str(text)?;
        self.acronyms
            .extend(file.acronyms.iter().map(|w| w.trim().to_lowercase()));
        self.junk_words
            .extend(file.junk_words.iter().map(|w| w.trim().to_lowercase()));
        self.valid_acronyms
            .extend(file.valid_acronyms.iter().map(|w| w.trim().to_lowercase()));

        for group in file.synonym_groups {
            let variants = group.variants.iter().map(|v| v.trim().to_lowercase());
            match self.synonym_groups.iter_mut().find(|g| g.label == group.label) {
                Some(existing) => {
                    for variant in variants {
                        if !existing.variants.contains(&variant) {
                            existing.variants.push(variant);
                        }
                    }
                }
                None => self.synonym_groups.push(SynonymGroup {
                    label: group.label,
                    variants: variants.collect(),
                }),
            }
        }
        Ok(self)
    }

    pub fn merge_blocklist(mut self, text: &str) -> Self {
        self.junk_words.extend(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_lowercase),
        );
        self
    }

    pub fn with_acronyms<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.acronyms
            .extend(words.into_iter().map(|w| w.as_ref().to_lowercase()));
        self
    }

    pub fn with_junk_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.junk_words
            .extend(words.into_iter().map(|w| w.as_ref().to_lowercase()));
        self
    }

    pub fn with_valid_acronyms<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.valid_acronyms
            .extend(words.into_iter().map(|w| w.as_ref().to_lowercase()));
        self
    }

    pub fn with_synonym_group(mut self, label: &str, variants: &[&str]) -> Self {
        self.synonym_groups.push(SynonymGroup {
            label: label.to_string(),
            variants: variants.iter().map(|v| v.to_lowercase()).collect(),
        });
        self
    }

    pub fn acronyms(&self) -> &BTreeSet<String> {
        &self.acronyms
    }

    pub fn junk_words(&self) -> &BTreeSet<String> {
        &self.junk_words
    }

    pub fn valid_acronyms(&self) -> &BTreeSet<String> {
        &self.valid_acronyms
    }

    pub fn synonym_groups(&self) -> &[SynonymGroup] {
        &self.synonym_groups
    }
}

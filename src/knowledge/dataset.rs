//! Keyword dataset with canned replies

use std::path::Path;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const EMBEDDED_DATASET: &str = include_str!("../../data/dataset.json");

/// A dataset fact: any keyword hit yields one of the responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Trigger phrases
    pub keywords: Vec<String>,
    /// Candidate replies, picked at random
    pub responses: Vec<String>,
}

impl KnowledgeEntry {
    /// Whether this entry applies to `input`
    ///
    /// Matches when the input contains a keyword or a keyword contains the input.
    #[must_use]
    pub fn matches(&self, input: &str) -> bool {
        let input = input.trim().to_lowercase();
        if input.is_empty() {
            return false;
        }

        self.keywords.iter().any(|keyword| {
            let keyword = keyword.to_lowercase();
            !keyword.is_empty() && (input.contains(&keyword) || keyword.contains(&input))
        })
    }
}

/// Ordered collection of knowledge entries
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    entries: Vec<KnowledgeEntry>,
}

impl Dataset {
    /// Build a dataset from entries
    ///
    /// # Errors
    ///
    /// Returns error if an entry has no responses
    pub fn new(entries: Vec<KnowledgeEntry>) -> Result<Self> {
        if let Some(entry) = entries.iter().find(|e| e.responses.is_empty()) {
            return Err(Error::Knowledge(format!(
                "dataset entry {:?} has no responses",
                entry.keywords.first().map_or("", String::as_str)
            )));
        }

        Ok(Self { entries })
    }

    /// Parse a JSON array of entries
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed or an entry is invalid
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<KnowledgeEntry> = serde_json::from_str(json)?;
        Self::new(entries)
    }

    /// Load a dataset file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let dataset = Self::from_json(&content)?;
        tracing::info!(path = %path.display(), entries = dataset.len(), "loaded dataset");
        Ok(dataset)
    }

    /// Dataset compiled into the binary
    ///
    /// # Errors
    ///
    /// Returns error if the embedded data is invalid
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_DATASET)
    }

    #[must_use]
    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry matching `input`
    #[must_use]
    pub fn find_entry(&self, input: &str) -> Option<&KnowledgeEntry> {
        self.entries.iter().find(|e| e.matches(input))
    }

    /// Pick a reply for `input` uniformly among the first matching entry's responses
    pub fn lookup<R: Rng + ?Sized>(&self, input: &str, rng: &mut R) -> Option<&str> {
        self.find_entry(input)
            .and_then(|entry| entry.responses.choose(rng))
            .map(String::as_str)
    }
}

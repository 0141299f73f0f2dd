//! Background topic table injected into generation prompts

use std::fmt::Write;
use std::path::Path;

use crate::{Error, Result};

const EMBEDDED_TOPICS: &str = include_str!("../../data/topics.json");

/// Background knowledge about one topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRecord {
    /// Topic key (e.g. "quantum_physics")
    pub topic: String,
    /// Subtopic name and text, in source order
    pub subtopics: Vec<(String, String)>,
}

impl TopicRecord {
    /// Topic key with underscores as spaces, lowercased
    #[must_use]
    pub fn normalized_key(&self) -> String {
        normalize_key(&self.topic)
    }
}

/// Topic lookup table
#[derive(Debug, Clone, Default)]
pub struct TopicTable {
    records: Vec<TopicRecord>,
}

impl TopicTable {
    #[must_use]
    pub const fn new(records: Vec<TopicRecord>) -> Self {
        Self { records }
    }

    /// Parse `{ topic: { subtopic: text } }`, keeping source order
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed or not shaped as a topic table
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let topics = value
            .as_object()
            .ok_or_else(|| Error::Knowledge("topic table must be a JSON object".to_string()))?;

        let mut records = Vec::with_capacity(topics.len());
        for (topic, subtopics) in topics {
            let subtopics = subtopics.as_object().ok_or_else(|| {
                Error::Knowledge(format!("topic {topic:?} must map subtopics to text"))
            })?;

            let mut entries = Vec::with_capacity(subtopics.len());
            for (name, text) in subtopics {
                let text = text.as_str().ok_or_else(|| {
                    Error::Knowledge(format!("subtopic {topic}.{name} must be a string"))
                })?;
                entries.push((name.clone(), text.to_string()));
            }

            records.push(TopicRecord {
                topic: topic.clone(),
                subtopics: entries,
            });
        }

        Ok(Self { records })
    }

    /// Load a topic table file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let table = Self::from_json(&content)?;
        tracing::info!(path = %path.display(), topics = table.records.len(), "loaded topic table");
        Ok(table)
    }

    /// Topic table compiled into the binary
    ///
    /// # Errors
    ///
    /// Returns error if the embedded data is invalid
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_TOPICS)
    }

    #[must_use]
    pub fn records(&self) -> &[TopicRecord] {
        &self.records
    }

    /// Topic whose key (or any word of it) appears in `input`
    #[must_use]
    pub fn find_matching(&self, input: &str) -> Option<&TopicRecord> {
        let input = normalize_key(input);
        if input.is_empty() {
            return None;
        }

        self.records.iter().find(|record| {
            let key = record.normalized_key();
            !key.is_empty()
                && (input.contains(&key) || key.split_whitespace().any(|word| input.contains(word)))
        })
    }
}

/// Render a topic as a prompt preamble
#[must_use]
pub fn format_for_prompt(record: &TopicRecord) -> String {
    let mut out = format!("PRETRAINED DATA FOR {}:\n\n", heading(&record.topic));
    for (name, text) in &record.subtopics {
        let _ = write!(out, "{}:\n{text}\n\n", heading(name));
    }
    out
}

fn heading(key: &str) -> String {
    key.to_uppercase().replace('_', " ")
}

fn normalize_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

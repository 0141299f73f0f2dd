//! Static knowledge tables consulted before falling back to the model
//!
//! - [`Dataset`]: keyword-triggered canned replies
//! - [`TopicTable`]: background text injected into generation prompts

mod dataset;
mod topics;

use std::path::Path;

pub use dataset::{Dataset, KnowledgeEntry};
pub use topics::{TopicRecord, TopicTable, format_for_prompt};

use crate::Result;

/// Load a dataset from `path`, or the embedded one
///
/// # Errors
///
/// Returns error if the selected source is invalid
pub fn load_dataset(path: Option<&Path>) -> Result<Dataset> {
    path.map_or_else(Dataset::embedded, Dataset::load)
}

/// Load a topic table from `path`, or the embedded one
///
/// # Errors
///
/// Returns error if the selected source is invalid
pub fn load_topics(path: Option<&Path>) -> Result<TopicTable> {
    path.map_or_else(TopicTable::embedded, TopicTable::load)
}

//! Modelfile generation for the specialized model

use std::fmt::Write;

use chrono::NaiveDate;

use super::SamplingOptions;
use crate::knowledge::Dataset;

/// Stop sequences that keep the model from writing the next user turn
pub const STOP_SEQUENCES: &[&str] = &["User:", "Human:", "Question:"];

/// Inputs for a generated Modelfile
#[derive(Debug, Clone)]
pub struct ModelfileSpec<'a> {
    /// Base model to derive from (e.g. "llama3")
    pub base_model: &'a str,
    /// Name the model will be created under
    pub model_name: &'a str,
    /// Assistant name used in the system prompt
    pub assistant_name: &'a str,
    /// Sampling defaults baked into the model
    pub sampling: SamplingOptions,
    /// Creation date recorded in the header
    pub created: NaiveDate,
}

/// Render the dataset as Modelfile system-prompt content
#[must_use]
pub fn dataset_section(dataset: &Dataset) -> String {
    let mut content = String::from("# Multiverse Dataset\n\n");

    for entry in dataset.entries() {
        let heading = entry.keywords.first().map_or("", String::as_str);
        let _ = writeln!(content, "## {}", heading.to_uppercase());
        for response in &entry.responses {
            let _ = writeln!(content, "- {response}");
        }
        content.push('\n');
    }

    content
}

/// Render a complete Modelfile
#[must_use]
pub fn generate_modelfile(spec: &ModelfileSpec<'_>, dataset: &Dataset) -> String {
    let ModelfileSpec {
        base_model,
        model_name,
        assistant_name,
        sampling,
        created,
    } = spec;

    let mut out = format!(
        r#"FROM {base_model}

# {assistant_name} Assistant - {model_name}
# This model is specialized for the multiverse dataset
# Created: {created}

SYSTEM """
I am {assistant_name}, a voice-based AI assistant with specialized knowledge about the Multiverse.
I have detailed information about different universes including Universe-42, Dimension-X, Quantum Realm, and Reality-616.
I know about entities like the Baron, Louise, the Meridian, the Order, the Void, and the Hive.
I understand concepts like the Spiral, the Key Room, and the Map Room.

When responding to questions about the multiverse, I will:
1. Provide information from one of the universes (Universe-42, Dimension-X, Quantum Realm, or Reality-616)
2. Keep my responses concise and conversational, as they will be spoken aloud
3. Not repeat the user's question in my response
4. Not start my response with phrases like "The multiverse is" or similar repetitions

For questions unrelated to the multiverse, I will respond as a helpful assistant.

{dataset}"""

# Set parameters for better voice responses
PARAMETER temperature {temperature}
PARAMETER top_p {top_p}
"#,
        created = created.format("%Y-%m-%d"),
        dataset = dataset_section(dataset),
        temperature = sampling.temperature,
        top_p = sampling.top_p,
    );

    for stop in STOP_SEQUENCES {
        let _ = writeln!(out, "PARAMETER stop \"{stop}\"");
    }

    out
}

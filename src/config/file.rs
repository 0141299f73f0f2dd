//! TOML configuration file loading
//!
//! Supports `~/.config/r3/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct R3ConfigFile {
    /// Directory for the local database
    #[serde(default)]
    pub data_dir: Option<String>,

    /// Completion provider configuration
    #[serde(default)]
    pub provider: ProviderFileConfig,

    /// Conversation timing and identity
    #[serde(default)]
    pub session: SessionFileConfig,

    /// Speech configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Knowledge table overrides
    #[serde(default)]
    pub knowledge: KnowledgeFileConfig,
}

/// Completion provider configuration
#[derive(Debug, Default, Deserialize)]
pub struct ProviderFileConfig {
    /// Base URL (e.g. `http://localhost:11434`)
    pub url: Option<String>,

    /// Default model (e.g. "llama3")
    pub model: Option<String>,

    /// Name of the specialized model created by `create-model`
    pub specialized_model: Option<String>,

    /// Case-insensitive marker identifying specialized models
    pub specialized_marker: Option<String>,

    pub temperature: Option<f32>,
    pub top_p: Option<f32>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Conversation configuration
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    /// Inactivity before the conversation ends
    pub idle_timeout_secs: Option<u64>,

    /// Pause between the farewell and a fresh session
    pub reset_delay_secs: Option<u64>,

    /// Name the assistant introduces itself with
    pub assistant_name: Option<String>,
}

/// Speech configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Recognition and synthesis language (e.g. "en-US")
    pub language: Option<String>,

    /// Synthesis voices in order of preference
    pub preferred_voices: Option<Vec<String>>,
}

/// Knowledge table overrides
#[derive(Debug, Default, Deserialize)]
pub struct KnowledgeFileConfig {
    /// Path to a dataset JSON file
    pub dataset: Option<String>,

    /// Path to a topics JSON file
    pub topics: Option<String>,
}

/// Parse config file content
///
/// # Errors
///
/// Returns error if the content is not valid TOML for this schema
pub fn parse_config(content: &str) -> crate::Result<R3ConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load the TOML config file from the standard path
///
/// Returns `R3ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> R3ConfigFile {
    let Some(path) = config_file_path() else {
        return R3ConfigFile::default();
    };

    if !path.exists() {
        return R3ConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match parse_config(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                R3ConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            R3ConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/r3/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("r3").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file() {
        let fc = parse_config(
            r#"
            [provider]
            model = "mistral"
            temperature = 0.5

            [session]
            idle_timeout_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(fc.provider.model.as_deref(), Some("mistral"));
        assert_eq!(fc.provider.temperature, Some(0.5));
        assert_eq!(fc.provider.url, None);
        assert_eq!(fc.session.idle_timeout_secs, Some(60));
        assert!(fc.voice.preferred_voices.is_none());
    }

    #[test]
    fn test_empty_and_invalid_files() {
        assert!(parse_config("").unwrap().provider.model.is_none());
        assert!(parse_config("[session]\nidle_timeout_secs = \"soon\"").is_err());
    }
}

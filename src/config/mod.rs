//! Configuration management for the R3 assistant
//!
//! Values are layered env > TOML file > defaults.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::provider::{DEFAULT_BASE_URL, SamplingOptions};
use crate::resolver::{ResolverConfig, SpecializedModels};
use crate::session::SessionSettings;
use crate::voice::DEFAULT_PREFERRED_VOICES;
use crate::{Error, Result};

use file::R3ConfigFile;

/// Longest accepted idle timeout (one day)
pub const MAX_IDLE_TIMEOUT_SECS: u64 = 86_400;

/// Longest accepted pause between farewell and the fresh session
pub const MAX_RESET_DELAY_SECS: u64 = 3_600;

/// Assistant configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for the local database
    pub data_dir: PathBuf,

    /// Completion provider settings
    pub provider: ProviderConfig,

    /// Conversation settings
    pub session: SessionConfig,

    /// Speech settings
    pub voice: VoiceConfig,

    /// Optional dataset JSON path (embedded table when unset)
    pub dataset_path: Option<PathBuf>,

    /// Optional topics JSON path (embedded table when unset)
    pub topics_path: Option<PathBuf>,
}

/// Completion provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub url: String,
    pub model: String,
    pub specialized_model: String,
    pub specialized_marker: String,
    pub sampling: SamplingOptions,
    pub timeout: Duration,
}

/// Conversation configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub idle_timeout: Duration,
    pub reset_delay: Duration,
    pub assistant_name: String,
}

/// Speech configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    pub language: String,
    pub preferred_voices: Vec<String>,
}

impl Config {
    /// Load configuration from the environment and config file
    ///
    /// # Errors
    ///
    /// Returns error if a value is out of range
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a value is out of range
    pub fn from_sources(fc: R3ConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // Provider (env > toml > default)
        let sampling = SamplingOptions {
            temperature: fc
                .provider
                .temperature
                .unwrap_or(SamplingOptions::default().temperature),
            top_p: fc.provider.top_p.unwrap_or(SamplingOptions::default().top_p),
        };
        if !(0.0..=2.0).contains(&sampling.temperature) {
            return Err(Error::Config(format!(
                "temperature must be between 0 and 2, got {}",
                sampling.temperature
            )));
        }
        if !(0.0..=1.0).contains(&sampling.top_p) {
            return Err(Error::Config(format!(
                "top_p must be between 0 and 1, got {}",
                sampling.top_p
            )));
        }

        let provider = ProviderConfig {
            url: env("R3_PROVIDER_URL")
                .or(fc.provider.url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: env("R3_MODEL")
                .or(fc.provider.model)
                .unwrap_or_else(|| "llama3".to_string()),
            specialized_model: env("R3_SPECIALIZED_MODEL")
                .or(fc.provider.specialized_model)
                .unwrap_or_else(|| "multiverse-rtc".to_string()),
            specialized_marker: fc
                .provider
                .specialized_marker
                .unwrap_or_else(|| "multiverse".to_string()),
            sampling,
            timeout: Duration::from_secs(fc.provider.timeout_secs.unwrap_or(60)),
        };

        // Session (env > toml > default)
        let idle_timeout_secs = match env("R3_IDLE_TIMEOUT") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                Error::Config(format!("R3_IDLE_TIMEOUT must be a number of seconds, got {raw:?}"))
            })?,
            None => fc.session.idle_timeout_secs.unwrap_or(35),
        };
        validate_idle_timeout(idle_timeout_secs)?;

        let reset_delay_secs = fc.session.reset_delay_secs.unwrap_or(5);
        if reset_delay_secs > MAX_RESET_DELAY_SECS {
            return Err(Error::Config(format!(
                "reset delay must be at most {MAX_RESET_DELAY_SECS} seconds, got {reset_delay_secs}"
            )));
        }

        let session = SessionConfig {
            idle_timeout: Duration::from_secs(idle_timeout_secs),
            reset_delay: Duration::from_secs(reset_delay_secs),
            assistant_name: fc
                .session
                .assistant_name
                .unwrap_or_else(|| "R3".to_string()),
        };

        // Voice (env > toml > default)
        let voice = VoiceConfig {
            language: env("R3_LANGUAGE")
                .or(fc.voice.language)
                .unwrap_or_else(|| "en-US".to_string()),
            preferred_voices: fc.voice.preferred_voices.unwrap_or_else(|| {
                DEFAULT_PREFERRED_VOICES
                    .iter()
                    .map(ToString::to_string)
                    .collect()
            }),
        };

        // Data directory (~/.local/share/r3 on Linux)
        let data_dir = env("R3_DATA_DIR")
            .or(fc.data_dir)
            .map_or_else(default_data_dir, PathBuf::from);

        Ok(Self {
            data_dir,
            provider,
            session,
            voice,
            dataset_path: env("R3_DATASET")
                .or(fc.knowledge.dataset)
                .map(PathBuf::from),
            topics_path: env("R3_TOPICS")
                .or(fc.knowledge.topics)
                .map(PathBuf::from),
        })
    }

    /// Path of the local database
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("r3.db")
    }

    /// Resolver settings derived from this configuration
    #[must_use]
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            default_model: self.provider.model.clone(),
            specialized: SpecializedModels {
                canonical: self.provider.specialized_model.clone(),
                marker: self.provider.specialized_marker.clone(),
            },
            sampling: self.provider.sampling,
            assistant_name: self.session.assistant_name.clone(),
        }
    }

    /// Session settings derived from this configuration
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            idle_timeout: self.session.idle_timeout,
            reset_delay: self.session.reset_delay,
            assistant_name: self.session.assistant_name.clone(),
            selected_model: self.provider.model.clone(),
            restart_after_reset: false,
        }
    }
}

/// Check an idle timeout in seconds
///
/// # Errors
///
/// Returns error if it is zero or longer than [`MAX_IDLE_TIMEOUT_SECS`]
pub fn validate_idle_timeout(secs: u64) -> Result<()> {
    if secs == 0 {
        return Err(Error::Config("idle timeout must be at least one second".to_string()));
    }
    if secs > MAX_IDLE_TIMEOUT_SECS {
        return Err(Error::Config(format!(
            "idle timeout must be at most {MAX_IDLE_TIMEOUT_SECS} seconds, got {secs}"
        )));
    }
    Ok(())
}

fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(|| PathBuf::from(".r3"), |d| d.data_dir().join("r3"))
}

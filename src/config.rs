use crate::defaults;
use crate::error::{CallscribeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub vad: VadSettings,
    pub chunking: ChunkingConfig,
    pub persistence: PersistenceConfig,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
}

/// Voice activity detection configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VadSettings {
    pub speaking_threshold: f32,
    pub silence_threshold: f32,
    pub silence_duration_ms: u32,
    pub min_recording_ms: u32,
}

/// Recording segmentation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_chunk_ms: u32,
}

/// Persistence endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Base URL of the conversation store (artifacts + metadata).
    pub base_url: Option<String>,
    /// Base URL of the analysis service. Defaults to `base_url` when unset.
    pub analyzer_url: Option<String>,
    /// Bearer token attached to store and analyzer requests.
    pub auth_token: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

impl Default for VadSettings {
    fn default() -> Self {
        Self {
            speaking_threshold: defaults::SPEAKING_THRESHOLD,
            silence_threshold: defaults::SILENCE_THRESHOLD,
            silence_duration_ms: defaults::SILENCE_DURATION_MS,
            min_recording_ms: defaults::MIN_RECORDING_MS,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_ms: defaults::MAX_CHUNK_MS,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML or invalid values.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let config: Config = toml::from_str(&contents)?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.vad.speaking_threshold) {
            return Err(CallscribeError::ConfigInvalidValue {
                key: "vad.speaking_threshold".to_string(),
                message: "must be within 0.0..=1.0".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.vad.silence_threshold) {
            return Err(CallscribeError::ConfigInvalidValue {
                key: "vad.silence_threshold".to_string(),
                message: "must be within 0.0..=1.0".to_string(),
            });
        }
        if self.vad.silence_threshold > self.vad.speaking_threshold {
            return Err(CallscribeError::ConfigInvalidValue {
                key: "vad.silence_threshold".to_string(),
                message: "must not exceed vad.speaking_threshold".to_string(),
            });
        }
        if self.chunking.max_chunk_ms == 0 {
            return Err(CallscribeError::ConfigInvalidValue {
                key: "chunking.max_chunk_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.audio.sample_rate == 0 {
            return Err(CallscribeError::ConfigInvalidValue {
                key: "audio.sample_rate".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Default location of the user configuration file.
#[cfg(feature = "cli")]
pub fn default_config_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|dir| dir.join("callscribe").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.vad.silence_duration_ms, 2000);
        assert_eq!(config.vad.min_recording_ms, 3000);
        assert_eq!(config.chunking.max_chunk_ms, 300_000);
        assert!(config.persistence.base_url.is_none());
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[vad]\nsilence_duration_ms = 1500").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.vad.silence_duration_ms, 1500);
        // Everything else falls back to defaults
        assert_eq!(config.vad.min_recording_ms, 3000);
        assert_eq!(config.audio.sample_rate, 16000);
    }

    #[test]
    fn test_load_full_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[audio]
device = "pipewire"
sample_rate = 48000

[vad]
speaking_threshold = 0.3
silence_threshold = 0.05
silence_duration_ms = 2500
min_recording_ms = 4000

[chunking]
max_chunk_ms = 60000

[persistence]
base_url = "https://api.example.com"
auth_token = "secret"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.audio.device.as_deref(), Some("pipewire"));
        assert_eq!(config.audio.sample_rate, 48000);
        assert_eq!(config.vad.speaking_threshold, 0.3);
        assert_eq!(config.chunking.max_chunk_ms, 60000);
        assert_eq!(
            config.persistence.base_url.as_deref(),
            Some("https://api.example.com")
        );
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = Config::load(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_invalid_toml_fails() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not [ valid toml").unwrap();

        let result = Config::load_or_default(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let mut config = Config::default();
        config.vad.speaking_threshold = 1.5;
        let result = config.validate();
        assert!(matches!(
            result,
            Err(CallscribeError::ConfigInvalidValue { ref key, .. }) if key == "vad.speaking_threshold"
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let mut config = Config::default();
        config.vad.silence_threshold = 0.5;
        config.vad.speaking_threshold = 0.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_chunk_duration() {
        let mut config = Config::default();
        config.chunking.max_chunk_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_roundtrip_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(config, parsed);
    }
}

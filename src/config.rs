use crate::error::{Result, ScrubError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How redacted sample ranges are overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedactionMethod {
    /// Replace samples with a pure 1 kHz tone. Unmistakably synthetic, so a
    /// listener can always tell that redaction occurred.
    #[default]
    Beep,
    /// Replace samples with digital silence.
    Mute,
}

impl std::fmt::Display for RedactionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RedactionMethod::Beep => write!(f, "beep"),
            RedactionMethod::Mute => write!(f, "mute"),
        }
    }
}

impl std::str::FromStr for RedactionMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "beep" => Ok(RedactionMethod::Beep),
            "mute" => Ok(RedactionMethod::Mute),
            _ => Err(format!(
                "Unknown redaction method: {}. Use 'beep' or 'mute'",
                s
            )),
        }
    }
}

/// Per-job processing options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingOptions {
    /// Redaction method applied to each interval.
    pub method: RedactionMethod,
    /// Peak amplitude of the redaction tone, in [0, 1].
    pub beep_volume: f64,
    /// Gain multiplier applied to the whole buffer before redaction.
    pub audio_volume: f64,
    /// Acceptable relative deviation from the original file size when
    /// re-encoding (e.g. 0.10 = within 10%).
    pub size_tolerance: f64,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            method: RedactionMethod::default(),
            beep_volume: 0.5,
            audio_volume: 1.0,
            size_tolerance: 0.10,
        }
    }
}

impl ProcessingOptions {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.beep_volume) {
            return Err(ScrubError::Config(format!(
                "beep_volume must be in [0, 1], got {}",
                self.beep_volume
            )));
        }
        if self.audio_volume < 0.0 {
            return Err(ScrubError::Config(format!(
                "audio_volume must be non-negative, got {}",
                self.audio_volume
            )));
        }
        if self.size_tolerance <= 0.0 {
            return Err(ScrubError::Config(format!(
                "size_tolerance must be positive, got {}",
                self.size_tolerance
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub default_method: RedactionMethod,
    pub concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            default_method: RedactionMethod::default(),
            concurrency: 4,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Load from config file if it exists
        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                if let Ok(file_config) = toml::from_str::<Config>(&contents) {
                    config = file_config;
                }
            }
        }

        // Override with environment variables
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.openai_api_key = Some(key);
        }
        if let Ok(method) = std::env::var("AUDIOSCRUB_DEFAULT_METHOD") {
            if let Ok(m) = method.parse() {
                config.default_method = m;
            }
        }
        if let Ok(concurrency) = std::env::var("AUDIOSCRUB_CONCURRENCY") {
            if let Ok(c) = concurrency.parse() {
                config.concurrency = c;
            }
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(ScrubError::Config(
                "Concurrency must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Required only when the CLI is asked to transcribe via the API.
    pub fn require_api_key(&self) -> Result<&str> {
        self.openai_api_key.as_deref().ok_or_else(|| {
            ScrubError::Config(
                "OPENAI_API_KEY not set. Export it with: export OPENAI_API_KEY=sk-..."
                    .to_string(),
            )
        })
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("audioscrub").join("config.toml"))
    }
}

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Target language, named the way the model is prompted (e.g. "French")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Language(pub String);

impl Language {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Language {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Language {
    fn from(s: String) -> Self {
        Self(s)
    }
}

fn default_target_language() -> Language {
    Language::new(DEFAULT_TARGET_LANGUAGE)
}

/// Chat-completion gateway configuration for OpenAI-compatible APIs.
///
/// Works with OpenAI itself as well as llama.cpp, Ollama, DeepSeek and any
/// other server exposing `/chat/completions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Generation budget per call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// HTTP timeout for one round trip
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl GatewayConfig {
    /// Create a new gateway config with default generation settings
    pub fn new(
        api_base: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            api_key,
            model: model.into(),
            ..Default::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.api_base.trim().is_empty() {
            return Err(invalid("gateway.api_base", "must not be empty"));
        }
        if self.model.trim().is_empty() {
            return Err(invalid("gateway.model", "must not be empty"));
        }
        if self.max_tokens == 0 {
            return Err(invalid("gateway.max_tokens", "must be greater than zero"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid("gateway.temperature", "must be between 0.0 and 2.0"));
        }
        Ok(())
    }
}

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

const fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

const fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

const fn default_timeout_secs() -> u64 {
    60
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Page layout for synthesized PDF downloads (all values in points)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfLayout {
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    /// Distance of the first baseline and the left edge from the page corner
    #[serde(default = "default_margin")]
    pub margin: f32,
    #[serde(default = "default_page_width")]
    pub page_width: f32,
    #[serde(default = "default_page_height")]
    pub page_height: f32,
    /// Line height as a multiple of font size
    #[serde(default = "default_line_height_factor")]
    pub line_height_factor: f32,
    /// TrueType files tried in order for text Helvetica cannot encode.
    /// Installed system fonts are appended as a fallback.
    #[serde(default)]
    pub fonts: Vec<PathBuf>,
}

const fn default_font_size() -> f32 {
    12.0
}

const fn default_margin() -> f32 {
    72.0
}

// A4
const fn default_page_width() -> f32 {
    595.0
}

const fn default_page_height() -> f32 {
    842.0
}

const fn default_line_height_factor() -> f32 {
    1.25
}

impl Default for PdfLayout {
    fn default() -> Self {
        Self {
            font_size: default_font_size(),
            margin: default_margin(),
            page_width: default_page_width(),
            page_height: default_page_height(),
            line_height_factor: default_line_height_factor(),
            fonts: Vec::new(),
        }
    }
}

impl PdfLayout {
    pub fn line_height(&self) -> f32 {
        self.font_size * self.line_height_factor
    }

    pub fn printable_width(&self) -> f32 {
        self.page_width - 2.0 * self.margin
    }

    pub fn printable_height(&self) -> f32 {
        self.page_height - 2.0 * self.margin
    }

    fn validate(&self) -> Result<()> {
        if self.font_size <= 0.0 {
            return Err(invalid("pdf.font_size", "must be positive"));
        }
        if self.line_height_factor < 1.0 {
            return Err(invalid("pdf.line_height_factor", "must be at least 1.0"));
        }
        if self.margin < 0.0 {
            return Err(invalid("pdf.margin", "must not be negative"));
        }
        if self.printable_width() < self.font_size || self.printable_height() < self.line_height() {
            return Err(invalid("pdf.margin", "leaves no printable area on the page"));
        }
        if let Some(missing) = self.fonts.iter().find(|path| !path.is_file()) {
            return Err(invalid("pdf.fonts", &format!("{} is not a file", missing.display())));
        }
        Ok(())
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Language used when the caller does not pick one
    #[serde(default = "default_target_language")]
    pub default_target_language: Language,

    /// Chat-completion backend
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Layout of synthesized PDF downloads
    #[serde(default)]
    pub pdf: PdfLayout,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_target_language: default_target_language(),
            gateway: GatewayConfig::default(),
            pdf: PdfLayout::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from default locations (~/.config/doc-translator/config.toml, ./config.toml)
    pub fn load() -> Self {
        // Try user config
        if let Some(config_dir) = crate::util::config_dir() {
            let user_config = config_dir.join("doc-translator").join("config.toml");
            if user_config.exists() {
                match Self::from_file(&user_config) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {}", user_config.display());
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // Try local config
        let local_config = std::path::PathBuf::from("config.toml");
        if local_config.exists() {
            match Self::from_file(&local_config) {
                Ok(config) => {
                    tracing::debug!("Loaded config from ./config.toml");
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load ./config.toml: {}", e);
                }
            }
        }

        tracing::debug!("No config file found, using defaults");
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_target_language.as_str().trim().is_empty() {
            return Err(invalid("default_target_language", "must not be empty"));
        }
        self.gateway.validate()?;
        self.pdf.validate()
    }
}

fn invalid(field: &str, reason: &str) -> Error {
    Error::ConfigInvalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Default target language name
pub const DEFAULT_TARGET_LANGUAGE: &str = "French";

/// Languages offered as translation targets.
///
/// Any name is accepted by the gateway; this list only seeds pickers and
/// `--list-languages`.
pub const TARGET_LANGUAGES: [&str; 20] = [
    "Hindi",
    "French",
    "German",
    "Chinese",
    "Japanese",
    "Korean",
    "Italian",
    "Portuguese",
    "Russian",
    "Spanish",
    "Arabic",
    "Bengali",
    "Dutch",
    "Greek",
    "Hebrew",
    "Swedish",
    "Turkish",
    "Vietnamese",
    "Polish",
    "Indonesian",
];

pub fn target_languages() -> Vec<Language> {
    TARGET_LANGUAGES.iter().copied().map(Language::from).collect()
}

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    #[serde(default)]
    pub mode: Mode,
    pub server: ServerConfig,
    #[serde(default)]
    pub translator: TranslatorConfig,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

pub trait Validatable {
    fn validate(&self) -> Result<(), String>;
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Server,
    Capture,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest request body accepted, in bytes. Base64 inflates images by a
    /// third, so this bounds uploads at roughly three quarters of the value.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_max_body_bytes() -> usize {
    16 * 1024 * 1024
}

impl ServerConfig {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Validatable for ServerConfig {
    fn validate(&self) -> Result<(), String> {
        if self.max_body_bytes == 0 {
            return Err("server.max_body_bytes must be a positive integer".into());
        }
        Ok(())
    }
}

#[derive(Deserialize, Clone)]
pub struct TranslatorConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_safety_confidence")]
    pub safety_confidence: bool,
    #[serde(default)]
    pub min_confidence: Option<f32>,
    #[serde(default)]
    pub generation: GenerationSettings,
}

// Keeps the API key out of log lines.
impl std::fmt::Debug for TranslatorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslatorConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("safety_confidence", &self.safety_confidence)
            .field("min_confidence", &self.min_confidence)
            .field("generation", &self.generation)
            .finish()
    }
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models".into()
}

fn default_model() -> String {
    "gemini-1.5-flash".into()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_safety_confidence() -> bool {
    true
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            safety_confidence: default_safety_confidence(),
            min_confidence: None,
            generation: GenerationSettings::default(),
        }
    }
}

impl TranslatorConfig {
    pub fn get_generate_url(&self) -> String {
        format!(
            "{}/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }

    pub fn get_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }

    /// Configured key first, then the conventional `GEMINI_API_KEY` variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
    }
}

impl Validatable for TranslatorConfig {
    fn validate(&self) -> Result<(), String> {
        if self.timeout_secs == 0 {
            return Err("translator.timeout_secs must be at least 1".into());
        }
        if let Some(min) = self.min_confidence {
            if !(0.0..=1.0).contains(&min) {
                return Err(format!(
                    "translator.min_confidence must be within [0, 1], got {}",
                    min
                ));
            }
        }
        self.generation.validate()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationSettings {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_temperature() -> f32 {
    0.4
}

fn default_top_p() -> f32 {
    1.0
}

fn default_top_k() -> u32 {
    32
}

fn default_max_output_tokens() -> u32 {
    100
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

impl Validatable for GenerationSettings {
    fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(format!(
                "generation.temperature must be within [0, 1], got {}",
                self.temperature
            ));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(format!(
                "generation.top_p must be within [0, 1], got {}",
                self.top_p
            ));
        }
        if self.top_k == 0 {
            return Err("generation.top_k must be a positive integer".into());
        }
        if self.max_output_tokens == 0 {
            return Err("generation.max_output_tokens must be a positive integer".into());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImageConfig {
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: i32,
}

fn default_jpeg_quality() -> i32 {
    95
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Validatable for ImageConfig {
    fn validate(&self) -> Result<(), String> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(format!(
                "image.jpeg_quality must be within 1..=100, got {}",
                self.jpeg_quality
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct CameraConfig {
    #[serde(default)]
    pub device_index: i32,
    #[serde(default = "default_warmup_frames")]
    pub warmup_frames: u32,
    #[serde(default = "default_countdown_secs")]
    pub countdown_secs: u64,
    #[serde(default)]
    pub save_captures: bool,
}

fn default_warmup_frames() -> u32 {
    5
}

fn default_countdown_secs() -> u64 {
    3
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            warmup_frames: default_warmup_frames(),
            countdown_secs: default_countdown_secs(),
            save_captures: false,
        }
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct DebugConfig {
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,
    #[serde(default)]
    pub save_uploads: bool,
}

fn default_image_dir() -> PathBuf {
    PathBuf::from("temp_images")
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            image_dir: default_image_dir(),
            save_uploads: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            other => Err(format!(
                "{} is not a supported minimum log level. Use either `debug` or `info`.",
                other
            )),
        }
    }
}

impl Validatable for Config {
    fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.translator.validate()?;
        self.image.validate()
    }
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("no current directory: {}", e)))?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    let settings = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(
            config::File::from(
                configuration_directory.join(format!("{}.yaml", environment.as_str())),
            )
            .required(false),
        )
        .add_source(
            config::Environment::with_prefix("SIGN")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let config: Config = settings.try_deserialize::<Config>()?;

    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        return Err(config::ConfigError::Message(e));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    fn parse(yaml: &str) -> Result<Config, config::ConfigError> {
        config::Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize::<Config>()
    }

    const MINIMAL: &str = r#"
log_level: info
server:
  host: 127.0.0.1
  port: 5000
"#;

    #[test]
    fn test_defaults_are_applied() {
        let config = parse(MINIMAL).unwrap();

        assert_eq!(config.mode, Mode::Server);
        assert_eq!(config.server.get_address(), "127.0.0.1:5000");
        assert_eq!(config.server.max_body_bytes, 16 * 1024 * 1024);
        assert_eq!(config.translator.model, "gemini-1.5-flash");
        assert_eq!(config.translator.timeout_secs, 30);
        assert!(config.translator.safety_confidence);
        assert_eq!(config.translator.generation.top_k, 32);
        assert_eq!(config.image.jpeg_quality, 95);
        assert_eq!(config.camera.warmup_frames, 5);
        assert_eq!(config.camera.countdown_secs, 3);
        assert_eq!(config.debug.image_dir, PathBuf::from("temp_images"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_generate_url_trims_trailing_slash() {
        let mut config = parse(MINIMAL).unwrap();
        config.translator.endpoint = "http://localhost:9000/models/".into();

        assert_eq!(
            config.translator.get_generate_url(),
            "http://localhost:9000/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_out_of_range_generation_is_rejected() {
        let yaml = r#"
log_level: debug
mode: capture
server:
  host: 0.0.0.0
  port: 5000
translator:
  generation:
    temperature: 1.5
"#;
        let config = parse(yaml).unwrap();

        assert_eq!(config.mode, Mode::Capture);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        let yaml = MINIMAL.replace("log_level: info", "log_level: trace");

        assert!(parse(&yaml).is_err());
    }

    #[test]
    fn test_api_key_is_redacted_in_debug_output() {
        let mut config = parse(MINIMAL).unwrap();
        config.translator.api_key = Some("super-secret".into());

        let rendered = format!("{:?}", config.translator);

        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}

use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    pub workflow: WorkflowConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub annotation: AnnotationConfig,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkflowConfig {
    pub endpoint_url: String,
    pub api_key: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl WorkflowConfig {
    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        let url = reqwest::Url::parse(&self.endpoint_url)
            .map_err(|e| format!("Invalid workflow endpoint {:?}: {}", self.endpoint_url, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!(
                "Workflow endpoint must use http or https, got `{}`",
                url.scheme()
            ));
        }
        if self.api_key.trim().is_empty() {
            return Err("Workflow API key is empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub image_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub results_dir: PathBuf,
}

impl OutputConfig {
    /// `<results_dir>/<input stem>_vis.png`
    pub fn get_output_path(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        self.results_dir.join(format!("{}_vis.png", stem))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnnotationConfig {
    #[serde(default)]
    pub font_path: Option<PathBuf>,
    #[serde(default = "default_box_color")]
    pub box_color: [u8; 3],
    #[serde(default = "default_text_color")]
    pub text_color: [u8; 3],
    #[serde(default = "default_stroke_width")]
    pub stroke_width: u32,
    #[serde(default = "default_padding_x")]
    pub padding_x: u32,
    #[serde(default = "default_padding_y")]
    pub padding_y: u32,
    #[serde(default = "default_background_alpha")]
    pub background_alpha: u8,
    #[serde(default = "default_min_font_size")]
    pub min_font_size: u32,
    #[serde(default = "default_font_size_divisor")]
    pub font_size_divisor: u32,
}

fn default_box_color() -> [u8; 3] {
    [255, 0, 0]
}

fn default_text_color() -> [u8; 3] {
    [255, 255, 255]
}

fn default_stroke_width() -> u32 {
    5
}

fn default_padding_x() -> u32 {
    6
}

fn default_padding_y() -> u32 {
    4
}

fn default_background_alpha() -> u8 {
    190
}

fn default_min_font_size() -> u32 {
    24
}

fn default_font_size_divisor() -> u32 {
    20
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            box_color: default_box_color(),
            text_color: default_text_color(),
            stroke_width: default_stroke_width(),
            padding_x: default_padding_x(),
            padding_y: default_padding_y(),
            background_alpha: default_background_alpha(),
            min_font_size: default_min_font_size(),
            font_size_divisor: default_font_size_divisor(),
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

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let base_path = std::env::current_dir().map_err(|e| {
        config::ConfigError::Message(format!("Failed to determine the current directory: {}", e))
    })?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    let config = config::Config::builder()
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
            config::Environment::with_prefix("WA")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let config: Config = config.try_deserialize::<Config>()?;

    if let Err(e) = config.workflow.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        return Err(config::ConfigError::Message(e));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Result<Config, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()?
            .try_deserialize::<Config>()
    }

    const MINIMAL: &str = r#"
log_level: INFO
workflow:
  endpoint_url: "https://example.com/workflows/whales"
  api_key: "secret"
input:
  image_path: "images/example_whale.jpg"
output:
  results_dir: "results"
"#;

    #[test]
    fn test_annotation_defaults_apply_when_section_missing() {
        let config = parse(MINIMAL).unwrap();

        assert!(matches!(config.log_level, LogLevel::Info));
        assert_eq!(config.workflow.get_timeout(), None);
        assert_eq!(config.annotation.box_color, [255, 0, 0]);
        assert_eq!(config.annotation.stroke_width, 5);
        assert_eq!(config.annotation.background_alpha, 190);
        assert!(config.annotation.font_path.is_none());
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        let yaml = MINIMAL.replace("INFO", "trace");
        assert!(parse(&yaml).is_err());
    }

    #[test]
    fn test_output_path_uses_input_stem() {
        let output = OutputConfig {
            results_dir: PathBuf::from("results"),
        };
        let path = output.get_output_path(Path::new("images/example_whale.jpg"));

        assert_eq!(path, PathBuf::from("results").join("example_whale_vis.png"));
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("example_whale_vis.png")
        );
    }

    #[test]
    fn test_workflow_validation() {
        let mut workflow = WorkflowConfig {
            endpoint_url: "https://example.com/workflow".to_string(),
            api_key: "key".to_string(),
            timeout_secs: Some(30),
        };
        assert!(workflow.validate().is_ok());
        assert_eq!(workflow.get_timeout(), Some(Duration::from_secs(30)));

        workflow.api_key = "  ".to_string();
        assert!(workflow.validate().is_err());

        workflow.api_key = "key".to_string();
        workflow.endpoint_url = "ftp://example.com/workflow".to_string();
        assert!(workflow.validate().is_err());

        workflow.endpoint_url = "not a url".to_string();
        assert!(workflow.validate().is_err());
    }
}

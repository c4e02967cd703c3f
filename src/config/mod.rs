pub mod cli;
pub mod toml_config;

use crate::adapters::{openai, serper};
use crate::core::augmenter::DEFAULT_MAX_SNIPPET_CHARS;
use crate::core::prompts::DEFAULT_DEPARTMENTS;
use crate::core::stages::RetryPolicy;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_range,
    validate_url, Validate,
};
use std::fmt;
use std::time::Duration;

pub use toml_config::FileConfig;

#[cfg(feature = "cli")]
use crate::utils::validation::validate_required_field;
#[cfg(feature = "cli")]
use clap::Parser;

pub const DEFAULT_CSV_PATH: &str = "vendors.csv";
pub const DEFAULT_OUTPUT_PATH: &str = ".";
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// 執行期設定：啟動時解析一次，之後唯讀並明確傳遞
#[derive(Clone)]
pub struct PipelineConfig {
    pub api_key: String,
    pub search_api_key: Option<String>,
    pub model: String,
    pub csv_path: String,
    pub llm_base_url: String,
    pub search_base_url: String,
    pub temperature: f32,
    pub request_timeout: Option<Duration>,
    pub retry: RetryPolicy,
    pub search_results: usize,
    pub max_snippet_chars: usize,
    pub departments: Vec<String>,
    pub output_path: String,
    pub save_results: bool,
    pub opportunities: bool,
}

impl PipelineConfig {
    /// 以內建預設值建立，只需要 LLM API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            search_api_key: None,
            model: openai::DEFAULT_MODEL.to_string(),
            csv_path: DEFAULT_CSV_PATH.to_string(),
            llm_base_url: openai::DEFAULT_BASE_URL.to_string(),
            search_base_url: serper::DEFAULT_BASE_URL.to_string(),
            temperature: 0.0,
            request_timeout: None,
            retry: RetryPolicy::none(),
            search_results: serper::DEFAULT_NUM_RESULTS,
            max_snippet_chars: DEFAULT_MAX_SNIPPET_CHARS,
            departments: DEFAULT_DEPARTMENTS.iter().map(|d| d.to_string()).collect(),
            output_path: DEFAULT_OUTPUT_PATH.to_string(),
            save_results: true,
            opportunities: false,
        }
    }

    /// 合併來源，優先順序：CLI / 環境變數 > 設定檔 > 預設值
    #[cfg(feature = "cli")]
    pub fn from_sources(cli: &CliConfig, file: FileConfig) -> Result<Self> {
        let api_key = cli.api_key.clone().or(file.llm.api_key);
        let api_key = validate_required_field("llm.api_key (OPENAI_API_KEY)", &api_key)?;

        let mut config = Self::new(api_key.clone());

        config.search_api_key = cli.search_api_key.clone().or(file.search.api_key);
        if let Some(model) = cli.model.clone().or(file.llm.model) {
            config.model = model;
        }
        if let Some(csv_path) = cli.input.clone().or(file.input.csv_path) {
            config.csv_path = csv_path;
        }
        if let Some(base_url) = file.llm.base_url {
            config.llm_base_url = base_url;
        }
        if let Some(base_url) = file.search.base_url {
            config.search_base_url = base_url;
        }
        if let Some(temperature) = file.llm.temperature {
            config.temperature = temperature;
        }
        config.request_timeout = file.llm.request_timeout_seconds.map(Duration::from_secs);

        let max_retries = cli.max_retries.or(file.llm.max_retries).unwrap_or(0);
        if max_retries > 0 {
            let delay_ms = file.llm.retry_delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS);
            config.retry = RetryPolicy::fixed(max_retries, Duration::from_millis(delay_ms));
        }

        if let Some(num_results) = file.search.num_results {
            config.search_results = num_results;
        }
        if let Some(max_chars) = file.search.max_snippet_chars {
            config.max_snippet_chars = max_chars;
        }
        if let Some(departments) = file.categories.departments {
            config.departments = departments
                .into_iter()
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect();
        }
        if let Some(output_path) = cli.output_path.clone().or(file.output.output_path) {
            config.output_path = output_path;
        }
        config.save_results = !cli.no_save && file.output.save_results.unwrap_or(true);
        config.opportunities = cli.opportunities || file.output.opportunities.unwrap_or(false);

        Ok(config)
    }
}

impl Validate for PipelineConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("llm.api_key", &self.api_key)?;
        validate_non_empty_string("llm.model", &self.model)?;
        validate_url("llm.base_url", &self.llm_base_url)?;
        validate_url("search.base_url", &self.search_base_url)?;
        validate_range("llm.temperature", self.temperature, 0.0, 2.0)?;
        validate_positive_number("search.num_results", self.search_results, 1)?;
        validate_positive_number("search.max_snippet_chars", self.max_snippet_chars, 1)?;
        validate_positive_number("categories.departments", self.departments.len(), 1)?;
        validate_path("input.csv_path", &self.csv_path)?;
        if self.save_results || self.opportunities {
            validate_path("output.output_path", &self.output_path)?;
        }
        Ok(())
    }
}

// API key 不進日誌
impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("api_key", &"***")
            .field(
                "search_api_key",
                &self.search_api_key.as_ref().map(|_| "***"),
            )
            .field("model", &self.model)
            .field("csv_path", &self.csv_path)
            .field("llm_base_url", &self.llm_base_url)
            .field("search_base_url", &self.search_base_url)
            .field("temperature", &self.temperature)
            .field("request_timeout", &self.request_timeout)
            .field("retry", &self.retry)
            .field("search_results", &self.search_results)
            .field("max_snippet_chars", &self.max_snippet_chars)
            .field("departments", &self.departments)
            .field("output_path", &self.output_path)
            .field("save_results", &self.save_results)
            .field("opportunities", &self.opportunities)
            .finish()
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "vendor-ai")]
#[command(about = "Categorize vendor spend and recommend an action per vendor using an LLM")]
pub struct CliConfig {
    #[arg(long, help = "Vendor CSV with Vendor,Amount columns [default: vendors.csv]")]
    pub input: Option<String>,

    #[arg(long, help = "Optional TOML config file")]
    pub config: Option<String>,

    #[arg(long = "api-key", env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long = "search-api-key", env = "SERPER_API_KEY", hide_env_values = true)]
    pub search_api_key: Option<String>,

    #[arg(long, env = "VENDOR_AI_MODEL", help = "Chat model name [default: gpt-4.1-nano]")]
    pub model: Option<String>,

    #[arg(long, help = "Directory for saved results [default: .]")]
    pub output_path: Option<String>,

    #[arg(long, help = "Do not save the results CSV")]
    pub no_save: bool,

    #[arg(long, help = "Also identify the top 3 cost-saving opportunities")]
    pub opportunities: bool,

    #[arg(long, help = "Retries per LLM call [default: 0]")]
    pub max_retries: Option<u32>,

    #[arg(long, help = "Load and list vendors without calling any service")]
    pub dry_run: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 讀取選用的設定檔並合併成 `PipelineConfig`
    pub fn resolve(&self) -> Result<PipelineConfig> {
        let file = match &self.config {
            Some(path) => {
                tracing::debug!("📄 Loading config file: {}", path);
                FileConfig::from_file(path)?
            }
            None => FileConfig::default(),
        };
        PipelineConfig::from_sources(self, file)
    }

    /// `--dry-run` 只需要 CSV 路徑，不需要 API key
    pub fn input_path(&self) -> Result<String> {
        if let Some(input) = &self.input {
            return Ok(input.clone());
        }
        match &self.config {
            Some(path) => Ok(FileConfig::from_file(path)?
                .input
                .csv_path
                .unwrap_or_else(|| DEFAULT_CSV_PATH.to_string())),
            None => Ok(DEFAULT_CSV_PATH.to_string()),
        }
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;
    use crate::utils::error::VendorAiError;

    fn cli_with_key() -> CliConfig {
        CliConfig {
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_sources(&cli_with_key(), FileConfig::default()).unwrap();

        assert_eq!(config.model, "gpt-4.1-nano");
        assert_eq!(config.csv_path, "vendors.csv");
        assert_eq!(config.output_path, ".");
        assert_eq!(config.retry, RetryPolicy::none());
        assert_eq!(config.departments.len(), 12);
        assert!(config.save_results);
        assert!(!config.opportunities);
        assert!(config.search_api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_api_key() {
        let err = PipelineConfig::from_sources(&CliConfig::default(), FileConfig::default())
            .unwrap_err();
        assert!(matches!(err, VendorAiError::MissingConfigError { .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = FileConfig::from_toml_str(
            r#"
[llm]
api_key = "sk-file"
model = "file-model"
max_retries = 1

[input]
csv_path = "file.csv"

[output]
opportunities = true
"#,
        )
        .unwrap();

        let cli = CliConfig {
            model: Some("cli-model".to_string()),
            max_retries: Some(3),
            no_save: true,
            ..Default::default()
        };

        let config = PipelineConfig::from_sources(&cli, file).unwrap();
        assert_eq!(config.api_key, "sk-file");
        assert_eq!(config.model, "cli-model");
        assert_eq!(config.csv_path, "file.csv");
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.delay, Duration::from_millis(DEFAULT_RETRY_DELAY_MS));
        assert!(!config.save_results);
        assert!(config.opportunities);
    }

    #[test]
    fn test_custom_departments() {
        let file = FileConfig::from_toml_str(
            "[categories]\ndepartments = [\"Engineering\", \" \", \"Sales \"]\n",
        )
        .unwrap();
        let config = PipelineConfig::from_sources(&cli_with_key(), file).unwrap();
        assert_eq!(config.departments, vec!["Engineering", "Sales"]);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = PipelineConfig::new("sk-test");
        config.llm_base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::new("sk-test");
        config.temperature = 3.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::new("sk-test");
        config.departments.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_hides_keys() {
        let mut config = PipelineConfig::new("sk-secret");
        config.search_api_key = Some("serper-secret".to_string());
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk-secret"));
        assert!(!rendered.contains("serper-secret"));
    }

    #[test]
    fn test_parse_flags() {
        let cli = CliConfig::try_parse_from([
            "vendor-ai",
            "--input",
            "spend.csv",
            "--no-save",
            "--opportunities",
            "--max-retries",
            "2",
            "-v",
        ])
        .unwrap();

        assert_eq!(cli.input.as_deref(), Some("spend.csv"));
        assert!(cli.no_save);
        assert!(cli.opportunities);
        assert_eq!(cli.max_retries, Some(2));
        assert!(cli.verbose);
        assert_eq!(cli.input_path().unwrap(), "spend.csv");
    }
}

use crate::utils::error::{Result, VendorAiError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

/// 選用的 TOML 設定檔；所有欄位皆可省略
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub llm: LlmSection,
    pub search: SearchSection,
    pub input: InputSection,
    pub output: OutputSection,
    pub categories: CategoriesSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub request_timeout_seconds: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub num_results: Option<usize>,
    pub max_snippet_chars: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSection {
    pub csv_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub output_path: Option<String>,
    pub save_results: Option<bool>,
    pub opportunities: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoriesSection {
    pub departments: Option<Vec<String>>,
}

impl FileConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| VendorAiError::ConfigError {
            message: format!("cannot read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content);

        let config: FileConfig =
            toml::from_str(&processed_content).map_err(|e| VendorAiError::ConfigError {
                message: format!("TOML parsing error: {}", e),
            })?;

        Ok(config.without_unresolved())
    }

    /// 仍是 `${VAR}` 形式的值代表環境變數不存在，視同未設定
    fn without_unresolved(mut self) -> Self {
        for value in [
            &mut self.llm.api_key,
            &mut self.llm.model,
            &mut self.llm.base_url,
            &mut self.search.api_key,
            &mut self.search.base_url,
            &mut self.input.csv_path,
            &mut self.output.output_path,
        ] {
            if value.as_deref().is_some_and(is_unresolved) {
                *value = None;
            }
        }
        self
    }
}

/// 替換環境變數 (例如 ${OPENAI_API_KEY})；找不到的保留原樣
fn substitute_env_vars(content: &str) -> String {
    ENV_VAR
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
}

fn is_unresolved(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || ENV_VAR.find(trimmed).is_some_and(|m| m.as_str() == trimmed)
}

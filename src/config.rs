use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::utils::RetryPolicy;

/// 配置文件路径的环境变量
const CONFIG_PATH_ENV: &str = "MINDMAP_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "mindmap.toml";

/// 存储后端
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// 本地目录，每个文档一个 JSON 文件
    Local,
    /// Google Cloud Storage
    Gcs,
}

impl FromStr for StorageBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "gcs" => Ok(StorageBackend::Gcs),
            other => Err(AppError::Config(format!("未知的存储后端: {}", other))),
        }
    }
}

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 同时处理的行数
    pub max_concurrent: usize,
    /// 每批行数，不设置则全部作为一批
    pub batch_size: Option<usize>,
    /// 输入 CSV
    pub input_path: String,
    /// 结果 CSV
    pub output_path: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_max_tokens: u32,
    pub llm_temperature: f32,
    /// 单次生成调用的硬超时
    pub generation_timeout_secs: u64,
    // --- 重试配置 ---
    pub retries: u32,
    pub retry_factor: f64,
    pub retry_min_timeout_ms: u64,
    pub retry_max_timeout_ms: u64,
    // --- 存储配置 ---
    pub storage_backend: StorageBackend,
    pub storage_dir: String,
    pub gcs_bucket: String,
    pub gcs_project: String,
    pub gcs_access_token: String,
    pub gcs_endpoint: String,
    // --- HTTP 服务配置 ---
    pub server_host: String,
    pub server_port: u16,
    /// 请求头 `x-api-key` 的共享密钥，为空表示不校验
    pub api_key: String,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            batch_size: None,
            input_path: "data/input.csv".to_string(),
            output_path: "data/output.csv".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            llm_max_tokens: 4096,
            llm_temperature: 0.7,
            generation_timeout_secs: 60,
            retries: 3,
            retry_factor: 2.0,
            retry_min_timeout_ms: 1000,
            retry_max_timeout_ms: 10_000,
            storage_backend: StorageBackend::Local,
            storage_dir: "data/mindmaps".to_string(),
            gcs_bucket: String::new(),
            gcs_project: String::new(),
            gcs_access_token: String::new(),
            gcs_endpoint: "https://storage.googleapis.com".to_string(),
            server_host: "0.0.0.0".to_string(),
            server_port: 3000,
            api_key: String::new(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// 默认值 → TOML 配置文件（存在时） → 环境变量
    pub fn load() -> AppResult<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let base = if Path::new(&path).exists() {
            Self::from_toml_file(&path)?
        } else {
            Self::default()
        };
        Ok(base.apply_env())
    }

    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    pub fn from_toml_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AppError::file_system(path, e))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("TOML 解析失败: {}", e)))
    }

    /// 用环境变量覆盖已有配置，无法解析的值保持原值
    pub fn apply_env(self) -> Self {
        let base = self;
        Self {
            max_concurrent: env_parse("MAX_CONCURRENT").unwrap_or(base.max_concurrent),
            batch_size: env_parse("BATCH_SIZE").map(Some).unwrap_or(base.batch_size),
            input_path: std::env::var("INPUT_PATH").unwrap_or(base.input_path),
            output_path: std::env::var("OUTPUT_PATH").unwrap_or(base.output_path),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(base.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(base.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(base.llm_model_name),
            llm_max_tokens: env_parse("LLM_MAX_TOKENS").unwrap_or(base.llm_max_tokens),
            llm_temperature: env_parse("LLM_TEMPERATURE").unwrap_or(base.llm_temperature),
            generation_timeout_secs: env_parse("GENERATION_TIMEOUT_SECS").unwrap_or(base.generation_timeout_secs),
            retries: env_parse("RETRIES").unwrap_or(base.retries),
            retry_factor: env_parse("RETRY_FACTOR").unwrap_or(base.retry_factor),
            retry_min_timeout_ms: env_parse("RETRY_MIN_TIMEOUT_MS").unwrap_or(base.retry_min_timeout_ms),
            retry_max_timeout_ms: env_parse("RETRY_MAX_TIMEOUT_MS").unwrap_or(base.retry_max_timeout_ms),
            storage_backend: env_parse("STORAGE_BACKEND").unwrap_or(base.storage_backend),
            storage_dir: std::env::var("STORAGE_DIR").unwrap_or(base.storage_dir),
            gcs_bucket: std::env::var("GCS_BUCKET").unwrap_or(base.gcs_bucket),
            gcs_project: std::env::var("GCS_PROJECT").unwrap_or(base.gcs_project),
            gcs_access_token: std::env::var("GCS_ACCESS_TOKEN").unwrap_or(base.gcs_access_token),
            gcs_endpoint: std::env::var("GCS_ENDPOINT").unwrap_or(base.gcs_endpoint),
            server_host: std::env::var("SERVER_HOST").unwrap_or(base.server_host),
            server_port: env_parse("SERVER_PORT").unwrap_or(base.server_port),
            api_key: std::env::var("API_KEY").unwrap_or(base.api_key),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(base.log_level),
        }
    }

    /// 根据配置构建重试策略（默认不重试结构校验错误）
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            factor: self.retry_factor,
            min_timeout: Duration::from_millis(self.retry_min_timeout_ms),
            max_timeout: Duration::from_millis(self.retry_max_timeout_ms),
            ..RetryPolicy::default()
        }
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

use thiserror::Error;

/// 结构校验错误
///
/// `issues` 中每一项形如 `root.children[1].text: 必须是字符串`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{context}: {}", .issues.join("; "))]
pub struct ValidationError {
    pub context: String,
    pub issues: Vec<String>,
}

impl ValidationError {
    pub fn new(context: impl Into<String>, issues: Vec<String>) -> Self {
        Self {
            context: context.into(),
            issues,
        }
    }

    /// 只有一条诊断信息的校验错误
    pub fn single(context: impl Into<String>, issue: impl Into<String>) -> Self {
        Self::new(context, vec![issue.into()])
    }
}

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 结构不合法（不可重试）
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// 上游生成服务失败（可重试），消息原样透出
    #[error("{message}")]
    ExternalApi { message: String },

    /// 单次调用超时（可重试）
    #[error("{operation} 超时 ({millis} 毫秒)")]
    Timeout { operation: String, millis: u64 },

    /// 文件读写失败
    #[error("文件错误 ({path}): {message}")]
    FileSystem { path: String, message: String },

    /// 行数据格式错误
    #[error("解析失败 ({path}): {message}")]
    Parse { path: String, message: String },

    /// 存储后端错误
    #[error("存储错误: {0}")]
    Storage(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),
}

impl AppError {
    /// 网络/超时类错误才值得重试
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::ExternalApi { .. } | AppError::Timeout { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }

    // ========== 便捷构造函数 ==========

    pub fn external_api(message: impl Into<String>) -> Self {
        AppError::ExternalApi {
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, limit: std::time::Duration) -> Self {
        AppError::Timeout {
            operation: operation.into(),
            millis: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn file_system(path: impl Into<String>, source: impl std::fmt::Display) -> Self {
        AppError::FileSystem {
            path: path.into(),
            message: source.to_string(),
        }
    }

    pub fn parse(path: impl Into<String>, source: impl std::fmt::Display) -> Self {
        AppError::Parse {
            path: path.into(),
            message: source.to_string(),
        }
    }

    pub fn storage(source: impl std::fmt::Display) -> Self {
        AppError::Storage(source.to_string())
    }

    pub fn validation(context: impl Into<String>, issue: impl Into<String>) -> Self {
        AppError::Validation(ValidationError::single(context, issue))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::validation("JSON 解析失败", err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

//! 文档存储服务 - 业务能力层
//!
//! 只负责"存"和"列"两种能力：
//! - `init`：确保目录/桶存在（幂等）
//! - `store`：按内容地址写入文档，返回存储键
//! - `list`：分页列出已存储的文档
//!
//! 两种实现在启动时按配置选择，见 [`create_blob_store`]。

pub mod gcs;
pub mod local;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{Config, StorageBackend};
use crate::error::AppResult;
use crate::models::{Document, Page};

pub use gcs::GcsBlobStore;
pub use local::LocalBlobStore;

/// 不指定 limit 时每页返回的文档数
pub const DEFAULT_PAGE_LIMIT: usize = 10;

/// 存储文件扩展名
const KEY_EXTENSION: &str = "json";

/// 文档存储能力
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// 确保存储位置存在，重复调用无副作用
    async fn init(&self) -> AppResult<()>;

    /// 写入文档并返回存储键；同一文档重复写入得到同一个键
    async fn store(&self, document: &Document) -> AppResult<String>;

    /// 分页列出文档，反序列化失败的条目会被跳过
    async fn list(&self, page_token: Option<&str>, limit: Option<usize>) -> AppResult<Page<Document>>;
}

/// 根据配置创建存储后端
pub fn create_blob_store(config: &Config) -> AppResult<Arc<dyn BlobStore>> {
    match config.storage_backend {
        StorageBackend::Local => Ok(Arc::new(LocalBlobStore::new(&config.storage_dir))),
        StorageBackend::Gcs => Ok(Arc::new(GcsBlobStore::new(config)?)),
    }
}

/// 由 subject / topic / id 推导存储键
///
/// 空白和文件名不安全的字符都替换成 `_`，结果是纯函数，不依赖任何状态
pub fn storage_key(subject: &str, topic: &str, id: &uuid::Uuid) -> String {
    format!(
        "{}_{}_{}.{}",
        sanitize_token(subject),
        sanitize_token(topic),
        id,
        KEY_EXTENSION
    )
}

fn sanitize_token(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut last_was_sep = false;

    for c in value.trim().chars() {
        let unsafe_char = c.is_whitespace() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|');
        if unsafe_char {
            if !last_was_sep {
                out.push('_');
            }
            last_was_sep = true;
        } else {
            out.push(c);
            last_was_sep = false;
        }
    }

    out
}

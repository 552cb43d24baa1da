use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use super::{storage_key, BlobStore, DEFAULT_PAGE_LIMIT, KEY_EXTENSION};
use crate::error::{AppError, AppResult};
use crate::models::{Document, Page};

/// 本地目录存储
///
/// 分页令牌是十进制的偏移量
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 按文件名排序的所有存储键
    async fn sorted_keys(&self) -> AppResult<Vec<String>> {
        let display = self.root.display().to_string();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::file_system(&display, e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::file_system(&display, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some(KEY_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                keys.push(name.to_string());
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn load(&self, key: &str) -> AppResult<Document> {
        let path = self.root.join(key);
        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| AppError::file_system(path.display().to_string(), e))?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn init(&self) -> AppResult<()> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AppError::file_system(self.root.display().to_string(), e))?;
        debug!("本地存储目录已就绪: {}", self.root.display());
        Ok(())
    }

    async fn store(&self, document: &Document) -> AppResult<String> {
        let key = storage_key(&document.subject, &document.topic, &document.id);
        let path = self.root.join(&key);
        let body = serde_json::to_vec_pretty(document)
            .map_err(|e| AppError::storage(format!("序列化文档失败: {}", e)))?;

        fs::write(&path, body)
            .await
            .map_err(|e| AppError::storage(format!("写入 {} 失败: {}", path.display(), e)))?;

        debug!("文档已保存: {}", key);
        Ok(key)
    }

    async fn list(&self, page_token: Option<&str>, limit: Option<usize>) -> AppResult<Page<Document>> {
        let offset = match page_token {
            None => 0,
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| AppError::validation("分页参数无效", format!("pageToken: {}", token)))?,
        };
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).max(1);

        let keys = self.sorted_keys().await?;
        if keys.is_empty() {
            return Ok(Page::empty());
        }
        let total = keys.len();

        let mut items = Vec::new();
        for key in keys.iter().skip(offset).take(limit) {
            match self.load(key).await {
                Ok(doc) => items.push(doc),
                Err(e) => warn!("⚠️ 跳过无法读取的文档 {}: {}", key, e),
            }
        }

        // offset 和 limit 都来自调用方，可能接近 usize::MAX
        let next = offset.saturating_add(limit);
        Ok(Page {
            items,
            next_page_token: (next < total).then(|| next.to_string()),
            total: Some(total),
        })
    }
}

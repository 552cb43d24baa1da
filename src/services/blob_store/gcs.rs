use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{storage_key, BlobStore, DEFAULT_PAGE_LIMIT};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{Document, Page};

/// Google Cloud Storage 存储（JSON API）
///
/// 分页令牌直接使用服务端返回的 `nextPageToken`
pub struct GcsBlobStore {
    client: Client,
    endpoint: Url,
    bucket: String,
    project: String,
    access_token: String,
}

/// `objects.list` 的响应
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectMeta>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectMeta {
    name: String,
}

impl GcsBlobStore {
    pub fn new(config: &Config) -> AppResult<Self> {
        if config.gcs_bucket.is_empty() {
            return Err(AppError::Config("使用 gcs 存储时必须设置 gcs_bucket".to_string()));
        }
        let endpoint = Url::parse(&config.gcs_endpoint)
            .map_err(|e| AppError::Config(format!("gcs_endpoint 无效 ({}): {}", config.gcs_endpoint, e)))?;

        Ok(Self {
            client: Client::new(),
            endpoint,
            bucket: config.gcs_bucket.clone(),
            project: config.gcs_project.clone(),
            access_token: config.gcs_access_token.clone(),
        })
    }

    /// 拼接 URL，每一段都会被正确转义
    fn url(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Config(format!("gcs_endpoint 不能作为基础 URL: {}", self.endpoint)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.access_token.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.access_token)
        }
    }

    async fn download(&self, name: &str) -> AppResult<Document> {
        let url = self.url(&["storage", "v1", "b", &self.bucket, "o", name])?;
        let response = self
            .authorized(self.client.get(url).query(&[("alt", "media")]))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::storage(format!("下载 {} 失败: HTTP {}", name, response.status())));
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl BlobStore for GcsBlobStore {
    async fn init(&self) -> AppResult<()> {
        let url = self.url(&["storage", "v1", "b", &self.bucket])?;
        let response = self.authorized(self.client.get(url)).send().await?;

        match response.status() {
            status if status.is_success() => {
                debug!("GCS 存储桶已存在: {}", self.bucket);
                Ok(())
            }
            StatusCode::NOT_FOUND => {
                info!("📦 GCS 存储桶 {} 不存在，正在创建...", self.bucket);
                let url = self.url(&["storage", "v1", "b"])?;
                let response = self
                    .authorized(self.client.post(url).query(&[("project", self.project.as_str())]))
                    .json(&serde_json::json!({ "name": self.bucket }))
                    .send()
                    .await?;

                // 409 说明并发创建时别人先建好了
                if response.status().is_success() || response.status() == StatusCode::CONFLICT {
                    Ok(())
                } else {
                    Err(AppError::storage(format!(
                        "创建存储桶 {} 失败: HTTP {}",
                        self.bucket,
                        response.status()
                    )))
                }
            }
            status => Err(AppError::storage(format!(
                "检查存储桶 {} 失败: HTTP {}",
                self.bucket, status
            ))),
        }
    }

    async fn store(&self, document: &Document) -> AppResult<String> {
        let key = storage_key(&document.subject, &document.topic, &document.id);
        let url = self.url(&["upload", "storage", "v1", "b", &self.bucket, "o"])?;
        let body = serde_json::to_vec(document)
            .map_err(|e| AppError::storage(format!("序列化文档失败: {}", e)))?;

        let response = self
            .authorized(
                self.client
                    .post(url)
                    .query(&[("uploadType", "media"), ("name", key.as_str())]),
            )
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::storage(format!("上传 {} 失败: HTTP {}", key, response.status())));
        }

        debug!("文档已上传: gs://{}/{}", self.bucket, key);
        Ok(key)
    }

    async fn list(&self, page_token: Option<&str>, limit: Option<usize>) -> AppResult<Page<Document>> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).max(1);
        let url = self.url(&["storage", "v1", "b", &self.bucket, "o"])?;

        let mut query = vec![("maxResults", limit.to_string())];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let response = self
            .authorized(self.client.get(url).query(&query))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::storage(format!(
                "列出存储桶 {} 失败: HTTP {}",
                self.bucket,
                response.status()
            )));
        }
        let listing: ObjectList = response.json().await?;

        let mut items = Vec::with_capacity(listing.items.len());
        for object in listing.items.iter().filter(|o| o.name.ends_with(".json")) {
            match self.download(&object.name).await {
                Ok(doc) => items.push(doc),
                Err(e) => warn!("⚠️ 跳过无法读取的文档 {}: {}", object.name, e),
            }
        }

        Ok(Page {
            items,
            next_page_token: listing.next_page_token,
            total: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;

    fn gcs_config(endpoint: &str) -> Config {
        Config {
            storage_backend: StorageBackend::Gcs,
            gcs_bucket: "mind maps".to_string(),
            gcs_endpoint: endpoint.to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_requires_bucket() {
        let config = Config {
            gcs_bucket: String::new(),
            ..gcs_config("https://storage.googleapis.com")
        };
        assert!(matches!(GcsBlobStore::new(&config), Err(AppError::Config(_))));
    }

    #[test]
    fn test_object_url_is_escaped() {
        let store = GcsBlobStore::new(&gcs_config("http://localhost:4443/")).unwrap();
        let url = store
            .url(&["storage", "v1", "b", &store.bucket, "o", "Math_Linear_Algebra_x.json"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:4443/storage/v1/b/mind%20maps/o/Math_Linear_Algebra_x.json"
        );
    }
}

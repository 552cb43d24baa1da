//! 应用入口 - 编排层
//!
//! 负责初始化存储、生成服务和批量处理器，并提供两种运行方式：
//! - `run`：按配置处理一次输入文件
//! - `serve`：启动 HTTP 服务

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::api;
use crate::config::Config;
use crate::models::Report;
use crate::orchestrator::batch_processor::BatchProcessor;
use crate::services::{create_blob_store, BlobStore, LlmService, MindMapGenerator};
use crate::utils::logging;
use crate::workflow::MindMapFlow;

/// 应用主结构
pub struct App {
    config: Config,
    processor: Arc<BatchProcessor>,
}

impl App {
    /// 使用真实的 LLM 服务和配置中的存储后端初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        logging::log_startup(config.max_concurrent, config.batch_size);

        let store = create_blob_store(&config).context("创建存储后端失败")?;
        let generator: Arc<dyn MindMapGenerator> = Arc::new(LlmService::new(&config));

        Self::with_services(config, generator, store).await
    }

    /// 使用给定的生成服务和存储初始化应用
    pub async fn with_services(
        config: Config,
        generator: Arc<dyn MindMapGenerator>,
        store: Arc<dyn BlobStore>,
    ) -> Result<Self> {
        store.init().await.context("初始化存储失败")?;
        info!("✓ 存储已就绪 ({:?})", config.storage_backend);

        let flow = MindMapFlow::new(
            generator,
            store,
            config.retry_policy(),
            config.generation_timeout(),
        );
        let processor = Arc::new(BatchProcessor::new(Arc::new(flow)));

        Ok(Self { config, processor })
    }

    pub fn processor(&self) -> Arc<BatchProcessor> {
        self.processor.clone()
    }

    /// 按配置处理一次输入文件
    pub async fn run(&self) -> Result<Report> {
        let report = self
            .processor
            .process_mind_maps(
                &self.config.input_path,
                &self.config.output_path,
                self.config.max_concurrent,
                self.config.batch_size,
            )
            .await
            .with_context(|| format!("处理 {} 失败", self.config.input_path))?;

        Ok(report)
    }

    /// 启动 HTTP 服务，直到进程退出
    pub async fn serve(&self) -> Result<()> {
        if self.config.api_key.is_empty() {
            warn!("⚠️ 未设置 API_KEY，所有接口都不做鉴权");
        }

        let state = api::AppState::new(self.processor.clone(), self.config.clone());
        let router = api::build_router(state);

        let addr = format!("{}:{}", self.config.server_host, self.config.server_port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("无法监听 {}", addr))?;

        info!("🌐 HTTP 服务已启动: http://{}", addr);
        axum::serve(listener, router).await.context("HTTP 服务异常退出")?;

        Ok(())
    }
}

//! 思维导图生成流程 - 流程层
//!
//! 核心职责：定义"一行"的完整处理流程
//!
//! 流程顺序：
//! 1. 检查输入行 → 失败直接记为 Failure，不调用生成服务
//! 2. 重试包裹下调用生成服务（每次尝试有硬超时）
//! 3. 校验完整文档结构
//! 4. 写入存储
//!
//! 任何一步失败都只影响本行，转换为 Failure 结果返回，绝不向上抛出。

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{Document, InputRow, Outcome};
use crate::services::validator::{check_row_usable, validate_document_or_throw};
use crate::services::{BlobStore, MindMapGenerator};
use crate::utils::logging::truncate_text;
use crate::utils::{retry, FailedAttempt, RetryPolicy};
use crate::workflow::row_ctx::RowCtx;

/// 思维导图生成流程
///
/// - 不持有批次状态，可以在多个并发任务间共享
/// - 只依赖业务能力（services）
pub struct MindMapFlow {
    generator: Arc<dyn MindMapGenerator>,
    store: Arc<dyn BlobStore>,
    retry_policy: RetryPolicy,
    generation_timeout: Duration,
}

impl MindMapFlow {
    pub fn new(
        generator: Arc<dyn MindMapGenerator>,
        store: Arc<dyn BlobStore>,
        retry_policy: RetryPolicy,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            generator,
            store,
            retry_policy,
            generation_timeout,
        }
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    /// 处理一行，总是返回一个结果
    pub async fn run(&self, row: &InputRow, ctx: &RowCtx) -> Outcome {
        info!("{} 主题: {} / {}", ctx, truncate_text(&row.subject, 40), truncate_text(&row.topic, 60));

        // ========== 步骤 1: 检查输入 ==========
        if let Err(e) = check_row_usable(row) {
            warn!("{} ⚠️ 输入行无效，跳过生成: {}", ctx, e);
            return Outcome::failure(&row.topic, e.to_string());
        }

        // ========== 步骤 2: 生成（带重试） ==========
        let document = match self.generate_with_retry(row, ctx).await {
            Ok(document) => document,
            Err(e) => {
                error!("{} ❌ 生成失败: {}", ctx, e);
                return Outcome::failure(&row.topic, e.to_string());
            }
        };

        // ========== 步骤 3: 校验完整文档 ==========
        if let Err(e) = self.check_document(&document) {
            // 生成服务已经校验过，这里失败说明转换逻辑有问题
            error!("{} ❌ [内部错误] 转换后的文档未通过校验: {}", ctx, e);
            return Outcome::failure(&row.topic, e.to_string());
        }

        // ========== 步骤 4: 写入存储 ==========
        match self.store.store(&document).await {
            Ok(key) => {
                info!("{} ✓ 已保存: {} ({} 个节点)", ctx, key, document.root.count());
                Outcome::success(&row.topic)
            }
            Err(e) => {
                error!("{} ❌ 生成成功但保存失败: {}", ctx, e);
                Outcome::failure(&row.topic, e.to_string())
            }
        }
    }

    /// 在重试策略下调用生成服务，每次尝试都有独立的硬超时
    async fn generate_with_retry(&self, row: &InputRow, ctx: &RowCtx) -> AppResult<Document> {
        let timeout = self.generation_timeout;
        let generator = &self.generator;

        retry(
            &self.retry_policy,
            |attempt: &FailedAttempt| {
                warn!(
                    "{} ⚠️ 第 {} 次尝试失败 (剩余重试 {} 次): {}",
                    ctx, attempt.attempt_number, attempt.retries_left, attempt.message
                );
            },
            |attempt_number| async move {
                if attempt_number > 1 {
                    info!("{} 🔁 第 {} 次尝试生成...", ctx, attempt_number);
                }
                match tokio::time::timeout(timeout, generator.generate(&row.subject, &row.topic)).await {
                    Ok(result) => result,
                    Err(_) => Err(AppError::timeout("思维导图生成", timeout)),
                }
            },
        )
        .await
    }

    fn check_document(&self, document: &Document) -> AppResult<()> {
        let value = serde_json::to_value(document)
            .map_err(|e| AppError::validation("思维导图文档无法序列化", e.to_string()))?;
        validate_document_or_throw(&value)?;
        Ok(())
    }
}

//! 批量处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块负责把一整个输入文件变成一份结果报告。
//!
//! ## 核心功能
//!
//! 1. **读取输入**：读取全部输入行，读取失败直接终止
//! 2. **分批处理**：按 `batch_size` 切分，上一批完成后再开始下一批
//! 3. **并发控制**：批内使用 Semaphore 限制同时在途的行数
//! 4. **按位重组**：结果按原始行号放回报告，与完成顺序无关
//! 5. **阶段存档**：每批完成后写出累计结果，写失败只记日志
//! 6. **最终输出**：写出完整报告，失败向上抛出
//!
//! ## 设计特点
//!
//! - **向下委托**：单行处理完全交给 `MindMapFlow`
//! - **故障隔离**：单行失败只会变成 Failure 结果，不会取消其他行

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::error::AppResult;
use crate::models::{read_rows, write_outcomes, Document, InputRow, Outcome, Page, Report};
use crate::utils::logging;
use crate::workflow::{MindMapFlow, RowCtx};

/// 一次批处理的完整结果
///
/// 即使最终文件写入失败，内存中的报告仍然是准确的
#[derive(Debug)]
pub struct BatchRun {
    pub report: Report,
    /// 最终结果文件的写入结果
    pub final_write: AppResult<()>,
}

/// 批量处理器
pub struct BatchProcessor {
    flow: Arc<MindMapFlow>,
}

impl BatchProcessor {
    pub fn new(flow: Arc<MindMapFlow>) -> Self {
        Self { flow }
    }

    /// 处理输入文件中的所有行，并把报告写到 `output_path`
    ///
    /// - 读取输入失败或写最终结果失败时返回错误
    /// - 单行失败记录在报告中，不会返回错误
    pub async fn process_mind_maps(
        &self,
        input_path: &str,
        output_path: &str,
        max_concurrent: usize,
        batch_size: Option<usize>,
    ) -> AppResult<Report> {
        let run = self
            .run_batch(input_path, output_path, max_concurrent, batch_size)
            .await?;
        run.final_write?;
        Ok(run.report)
    }

    /// 与 [`Self::process_mind_maps`] 相同，但最终写入失败时仍返回报告
    pub async fn run_batch(
        &self,
        input_path: &str,
        output_path: &str,
        max_concurrent: usize,
        batch_size: Option<usize>,
    ) -> AppResult<BatchRun> {
        let max_concurrent = max_concurrent.max(1);

        // 读取失败是整体失败，后续步骤都不执行
        let rows = read_rows(input_path).await?;
        let total = rows.len();
        logging::log_rows_loaded(total, input_path);

        let chunk_size = match batch_size {
            Some(size) if size > 0 => size,
            _ => total.max(1),
        };
        let total_batches = total.div_ceil(chunk_size);
        let semaphore = Arc::new(Semaphore::new(max_concurrent));
        let mut report: Report = Vec::with_capacity(total);

        // 分批处理
        for (batch_idx, chunk) in rows.chunks(chunk_size).enumerate() {
            let batch_start = batch_idx * chunk_size;
            let batch_num = batch_idx + 1;

            logging::log_batch_start(batch_num, total_batches, batch_start + 1, batch_start + chunk.len(), total);

            let outcomes = self.process_batch(chunk, batch_start, semaphore.clone()).await;
            let success = outcomes.iter().filter(|o| o.is_success()).count();
            logging::log_batch_complete(batch_num, success, outcomes.len());

            report.extend(outcomes);
            self.write_checkpoint(output_path, &report).await;
        }

        let final_write = write_outcomes(output_path, &report).await;
        match &final_write {
            Ok(()) => {
                let success = report.iter().filter(|o| o.is_success()).count();
                logging::print_final_stats(success, report.len() - success, report.len(), output_path);
            }
            Err(e) => error!("❌ 写入最终结果失败 ({}): {}", output_path, e),
        }

        Ok(BatchRun { report, final_write })
    }

    /// 处理单个批次，返回顺序与 `rows` 一致的结果
    async fn process_batch(&self, rows: &[InputRow], batch_start: usize, semaphore: Arc<Semaphore>) -> Vec<Outcome> {
        let mut in_flight = FuturesUnordered::new();

        // 为本批创建并发任务
        for (offset, row) in rows.iter().enumerate() {
            let ctx = RowCtx::new(batch_start + offset, row);
            let flow = self.flow.clone();
            let row = row.clone();
            let semaphore = semaphore.clone();

            let handle = tokio::spawn(async move {
                // 信号量从不关闭，acquire 不会失败
                let _permit = semaphore.acquire_owned().await;
                flow.run(&row, &ctx).await
            });
            in_flight.push(async move { (offset, handle.await) });
        }

        // 完成顺序不确定，按偏移量放回对应位置
        let mut slots: Vec<Option<Outcome>> = vec![None; rows.len()];
        while let Some((offset, joined)) = in_flight.next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("[行 {}] 任务执行失败: {}", batch_start + offset + 1, e);
                    Outcome::failure(&rows[offset].topic, format!("任务执行失败: {}", e))
                }
            };
            slots[offset] = Some(outcome);
        }

        slots
            .into_iter()
            .zip(rows)
            .map(|(slot, row)| slot.unwrap_or_else(|| Outcome::failure(&row.topic, "未产生处理结果")))
            .collect()
    }

    /// 写出累计结果，失败只记录日志
    async fn write_checkpoint(&self, output_path: &str, report: &[Outcome]) {
        let path = checkpoint_path(output_path, report.len());
        match write_outcomes(&path, report).await {
            Ok(()) => info!("💾 已保存阶段结果: {} ({} 行)", path, report.len()),
            Err(e) => warn!("⚠️ 保存阶段结果失败，继续处理: {}", e),
        }
    }

    /// 分页列出已生成的思维导图
    pub async fn get_all_mind_maps(&self, page_token: Option<&str>, limit: Option<usize>) -> AppResult<Page<Document>> {
        info!("📚 列出思维导图: pageToken={:?}, limit={:?}", page_token, limit);
        let page = self.flow.store().list(page_token, limit).await?;
        info!("✓ 返回 {} 个思维导图", page.items.len());
        Ok(page)
    }
}

/// 阶段结果文件路径：`<output>.partial.<已处理行数>`
pub fn checkpoint_path(output_path: &str, processed: usize) -> String {
    format!("{}.partial.{}", output_path, processed)
}

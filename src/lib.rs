//! # Mindmap Batch
//!
//! 调用大模型把"学科 / 主题"批量生成为思维导图，并按内容地址保存为 JSON 文档
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 数据层（Models）
//! - `models/` - 输入行、结果、思维导图文档、分页结构
//! - `models/loaders` - CSV 行读写
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个文档
//! - `LlmService` - 生成思维导图能力
//! - `BlobStore` - 保存 / 分页列出能力（本地目录或 GCS）
//! - `validator` - 结构校验能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一行"的完整处理流程
//! - `RowCtx` - 上下文封装（行号 + 主题）
//! - `MindMapFlow` - 流程编排（检查 → 生成(重试) → 校验 → 保存）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 分批、并发控制、阶段存档、最终报告
//! - `orchestrator/app` - 应用初始化与运行方式
//!
//! ### ⑤ 接口层（API）
//! - `api/` - HTTP 路由、鉴权
//!
//! ## 模块结构

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, ValidationError};
pub use models::{Document, InputRow, Node, Outcome, OutcomeStatus, Page, Report};
pub use orchestrator::{App, BatchProcessor};
pub use services::{BlobStore, MindMapGenerator};
pub use workflow::{MindMapFlow, RowCtx};

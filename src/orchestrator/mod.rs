//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 初始化存储和生成服务
//! - 命令行批处理 / HTTP 服务两种运行方式
//!
//! ### `batch_processor` - 批量处理器
//! - 读取输入行（Vec<InputRow>）
//! - 分批 + 控制并发数量（Semaphore）
//! - 按原始行号重组结果，阶段存档，写出最终报告
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<InputRow>)
//!     ↓
//! workflow::MindMapFlow (处理单行)
//!     ↓
//! services (能力层：generate / validate / store)
//! ```

pub mod app;
pub mod batch_processor;

pub use app::App;
pub use batch_processor::{checkpoint_path, BatchProcessor, BatchRun};

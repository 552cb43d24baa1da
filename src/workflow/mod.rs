pub mod mindmap_flow;
pub mod row_ctx;

pub use mindmap_flow::MindMapFlow;
pub use row_ctx::RowCtx;

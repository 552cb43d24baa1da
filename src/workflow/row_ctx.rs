//! 行处理上下文
//!
//! 封装"我正在处理第几行、哪个主题"这一信息

use std::fmt::Display;

use crate::models::InputRow;

/// 行处理上下文
#[derive(Debug, Clone)]
pub struct RowCtx {
    /// 行在输入中的位置（从 0 开始，决定结果在报告中的位置）
    pub index: usize,

    /// 学科
    pub subject: String,

    /// 主题
    pub topic: String,
}

impl RowCtx {
    pub fn new(index: usize, row: &InputRow) -> Self {
        Self {
            index,
            subject: row.subject.clone(),
            topic: row.topic.clone(),
        }
    }

    /// 日志中显示的行号（从 1 开始）
    pub fn line(&self) -> usize {
        self.index + 1
    }
}

impl Display for RowCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[行 {}]", self.line())
    }
}

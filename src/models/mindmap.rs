use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 思维导图节点
///
/// 每个节点（包括根节点）都有独立生成的 id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: Uuid,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Node>>,
}

impl Node {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            children: None,
        }
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = Some(children);
        self
    }

    /// 以当前节点为根的子树节点总数
    pub fn count(&self) -> usize {
        1 + self
            .children
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(Node::count)
            .sum::<usize>()
    }
}

/// 持久化的思维导图文档
///
/// 创建后不可变，存储后由 BlobStore 持有
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub subject: String,
    pub topic: String,
    pub root: Node,
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// 用已经转换好的节点树创建新文档
    pub fn new(subject: impl Into<String>, topic: impl Into<String>, root: Node) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject: subject.into(),
            topic: topic.into(),
            root,
            created_at: Utc::now(),
        }
    }
}

//! 结构校验服务 - 业务能力层
//!
//! 生成服务返回的 JSON 不可信，访问任何字段前都要先做结构检查。
//! 所有函数都是无状态的纯函数，可在并发任务间随意共享。

use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::models::{InputRow, Node};

/// 检查原始生成结果：`{ root: { text, children?: [...] } }`
///
/// 任何不匹配都返回 false，不会 panic
pub fn validate_raw_document(data: &Value) -> bool {
    match data.get("root") {
        Some(root) => is_raw_node(root),
        None => false,
    }
}

fn is_raw_node(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    if !matches!(obj.get("text"), Some(Value::String(_))) {
        return false;
    }
    match obj.get("children") {
        None => true,
        Some(Value::Array(children)) => children.iter().all(is_raw_node),
        Some(_) => false,
    }
}

/// 把原始节点转换为带 id 的节点
///
/// 每个节点生成新的 id；没有字符串 `text` 的子节点会被直接丢弃。
/// 节点本身缺少 `text` 时返回 None。
pub fn translate(raw: &Value) -> Option<Node> {
    let text = raw.get("text")?.as_str()?;
    let mut node = Node::new(text);

    if let Some(children) = raw.get("children").and_then(Value::as_array) {
        if !children.is_empty() {
            node.children = Some(children.iter().filter_map(translate).collect());
        }
    }

    Some(node)
}

/// 检查完整的持久化文档结构
pub fn validate_document(doc: &Value) -> bool {
    document_issues(doc).is_empty()
}

/// 检查完整的持久化文档结构，失败时返回所有诊断信息
pub fn validate_document_or_throw(doc: &Value) -> Result<(), ValidationError> {
    let issues = document_issues(doc);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new("思维导图文档结构无效", issues))
    }
}

fn document_issues(doc: &Value) -> Vec<String> {
    let mut issues = Vec::new();
    let Some(obj) = doc.as_object() else {
        issues.push("$: 必须是对象".to_string());
        return issues;
    };

    check_uuid(obj, "id", "id", &mut issues);
    check_string(obj, "subject", "subject", &mut issues);
    check_string(obj, "topic", "topic", &mut issues);

    match obj.get("createdAt") {
        Some(Value::String(ts)) => {
            if chrono::DateTime::parse_from_rfc3339(ts).is_err() {
                issues.push(format!("createdAt: 不是合法的 ISO-8601 时间 ({})", ts));
            }
        }
        Some(_) => issues.push("createdAt: 必须是字符串".to_string()),
        None => issues.push("createdAt: 缺失".to_string()),
    }

    match obj.get("root") {
        Some(root) => node_issues(root, "root", &mut issues),
        None => issues.push("root: 缺失".to_string()),
    }

    issues
}

fn node_issues(value: &Value, path: &str, issues: &mut Vec<String>) {
    let Some(obj) = value.as_object() else {
        issues.push(format!("{}: 必须是对象", path));
        return;
    };

    check_uuid(obj, "id", &format!("{}.id", path), issues);
    check_string(obj, "text", &format!("{}.text", path), issues);

    match obj.get("children") {
        None => {}
        Some(Value::Array(children)) => {
            for (i, child) in children.iter().enumerate() {
                node_issues(child, &format!("{}.children[{}]", path, i), issues);
            }
        }
        Some(_) => issues.push(format!("{}.children: 必须是数组", path)),
    }
}

fn check_string(obj: &Map<String, Value>, key: &str, path: &str, issues: &mut Vec<String>) {
    match obj.get(key) {
        Some(Value::String(_)) => {}
        Some(_) => issues.push(format!("{}: 必须是字符串", path)),
        None => issues.push(format!("{}: 缺失", path)),
    }
}

fn check_uuid(obj: &Map<String, Value>, key: &str, path: &str, issues: &mut Vec<String>) {
    match obj.get(key) {
        Some(Value::String(id)) => {
            if uuid::Uuid::parse_str(id).is_err() {
                issues.push(format!("{}: 不是合法的 UUID ({})", path, id));
            }
        }
        Some(_) => issues.push(format!("{}: 必须是字符串", path)),
        None => issues.push(format!("{}: 缺失", path)),
    }
}

// ========== 输入行校验 ==========

/// 对外接口使用的严格校验：只允许 `subject`、`topic` 两个非空字符串字段
pub fn validate_input_row(row: &Value) -> bool {
    input_row_issues(row).is_empty()
}

pub fn validate_input_row_or_throw(row: &Value) -> Result<(), ValidationError> {
    let issues = input_row_issues(row);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new("输入行结构无效", issues))
    }
}

fn input_row_issues(row: &Value) -> Vec<String> {
    let mut issues = Vec::new();
    let Some(obj) = row.as_object() else {
        issues.push("$: 必须是对象".to_string());
        return issues;
    };

    for key in ["subject", "topic"] {
        match obj.get(key) {
            Some(Value::String(s)) if !s.is_empty() => {}
            Some(Value::String(_)) => issues.push(format!("{}: 不能为空", key)),
            Some(_) => issues.push(format!("{}: 必须是字符串", key)),
            None => issues.push(format!("{}: 缺失", key)),
        }
    }

    for key in obj.keys().filter(|k| *k != "subject" && *k != "topic") {
        issues.push(format!("{}: 不允许的字段", key));
    }

    issues
}

/// 编排层的防御性检查：两个字段 trim 之后都不能为空
pub fn check_row_usable(row: &InputRow) -> Result<(), ValidationError> {
    let mut issues = Vec::new();
    if row.subject.trim().is_empty() {
        issues.push("subject: 不能为空".to_string());
    }
    if row.topic.trim().is_empty() {
        issues.push("topic: 不能为空".to_string());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new("输入行无效", issues))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;
    use serde_json::json;

    #[test]
    fn test_validate_raw_document_accepts_nested_tree() {
        let raw = json!({
            "root": {
                "text": "Algebra",
                "children": [
                    { "text": "Equations", "children": [{ "text": "Linear" }] },
                    { "text": "Polynomials" }
                ]
            }
        });
        assert!(validate_raw_document(&raw));
    }

    #[test]
    fn test_validate_raw_document_rejects_bad_shapes() {
        assert!(!validate_raw_document(&json!({})));
        assert!(!validate_raw_document(&json!({ "root": "Algebra" })));
        assert!(!validate_raw_document(&json!({ "root": { "text": 1 } })));
        assert!(!validate_raw_document(
            &json!({ "root": { "text": "a", "children": { "text": "b" } } })
        ));
        assert!(!validate_raw_document(
            &json!({ "root": { "text": "a", "children": [{ "text": "b", "children": [{}] }] } })
        ));
    }

    #[test]
    fn test_translate_drops_children_without_text() {
        let raw = json!({
            "text": "Algebra",
            "children": [
                { "text": "Equations" },
                { "label": "no text" },
                { "text": 42 },
                { "text": "Functions", "children": [{ "oops": true }, { "text": "Domain" }] }
            ]
        });

        let node = translate(&raw).unwrap();
        let children = node.children.as_ref().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].text, "Equations");
        assert!(children[0].children.is_none());
        assert_eq!(children[1].children.as_ref().unwrap().len(), 1);
        assert_eq!(children[1].children.as_ref().unwrap()[0].text, "Domain");
    }

    #[test]
    fn test_translate_assigns_unique_ids() {
        let raw = json!({ "text": "a", "children": [{ "text": "b" }, { "text": "c" }] });
        let node = translate(&raw).unwrap();
        let children = node.children.unwrap();

        assert_ne!(node.id, children[0].id);
        assert_ne!(children[0].id, children[1].id);
    }

    #[test]
    fn test_translate_empty_children_array_is_leaf() {
        let node = translate(&json!({ "text": "a", "children": [] })).unwrap();
        assert!(node.children.is_none());
    }

    #[test]
    fn test_validate_translated_document() {
        let raw = json!({ "root": { "text": "Algebra", "children": [{ "text": "Equations" }] } });
        let root = translate(&raw["root"]).unwrap();
        let doc = Document::new("Math", "Algebra", root);
        let value = serde_json::to_value(&doc).unwrap();

        assert!(validate_document(&value));
        assert!(validate_document_or_throw(&value).is_ok());
    }

    #[test]
    fn test_validate_document_reports_every_issue() {
        let value = json!({
            "id": "not-a-uuid",
            "subject": "Math",
            "root": { "text": 3, "children": "x" },
            "createdAt": "yesterday"
        });

        let err = validate_document_or_throw(&value).unwrap_err();
        assert!(err.issues.iter().any(|i| i.starts_with("id:")));
        assert!(err.issues.iter().any(|i| i == "topic: 缺失"));
        assert!(err.issues.iter().any(|i| i.starts_with("createdAt:")));
        assert!(err.issues.iter().any(|i| i == "root.id: 缺失"));
        assert!(err.issues.iter().any(|i| i == "root.text: 必须是字符串"));
        assert!(err.issues.iter().any(|i| i == "root.children: 必须是数组"));
    }

    #[test]
    fn test_validate_input_row_strict() {
        assert!(validate_input_row(&json!({ "subject": "Math", "topic": "Algebra" })));
        assert!(!validate_input_row(&json!({ "subject": "", "topic": "Algebra" })));
        assert!(!validate_input_row(&json!({ "subject": "Math" })));
        assert!(!validate_input_row(
            &json!({ "subject": "Math", "topic": "Algebra", "extra": 1 })
        ));

        let err = validate_input_row_or_throw(&json!({ "subject": 1, "topic": "x", "k": 0 }))
            .unwrap_err();
        assert_eq!(err.issues.len(), 2);
    }

    #[test]
    fn test_check_row_usable_trims() {
        assert!(check_row_usable(&InputRow::new("Math", "Algebra")).is_ok());
        let err = check_row_usable(&InputRow::new("  ", "\t")).unwrap_err();
        assert_eq!(err.issues.len(), 2);
    }
}

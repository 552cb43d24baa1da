//! 集成测试共用的假服务

#![allow(dead_code)]

use async_trait::async_trait;
use mindmap_batch::utils::RetryPolicy;
use mindmap_batch::{
    AppError, AppResult, BatchProcessor, BlobStore, Document, InputRow, MindMapFlow,
    MindMapGenerator, Node, Page,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Behavior = dyn Fn(&str, u32) -> AppResult<()> + Send + Sync;
type DelayFn = dyn Fn(&str) -> Duration + Send + Sync;

/// 可编排行为的生成服务
///
/// `behavior(topic, attempt)` 返回 Ok 时生成一个根节点为 topic 的文档
pub struct MockGenerator {
    behavior: Box<Behavior>,
    delay: Box<DelayFn>,
    calls: Mutex<HashMap<String, u32>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockGenerator {
    pub fn new(behavior: impl Fn(&str, u32) -> AppResult<()> + Send + Sync + 'static) -> Self {
        Self {
            behavior: Box::new(behavior),
            delay: Box::new(|_| Duration::ZERO),
            calls: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(|_, _| Ok(()))
    }

    pub fn with_delay(mut self, delay: impl Fn(&str) -> Duration + Send + Sync + 'static) -> Self {
        self.delay = Box::new(delay);
        self
    }

    pub fn calls_for(&self, topic: &str) -> u32 {
        self.calls.lock().unwrap().get(topic).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MindMapGenerator for MockGenerator {
    async fn generate(&self, subject: &str, topic: &str) -> AppResult<Document> {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(topic.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep((self.delay)(topic)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        (self.behavior)(topic, attempt)?;
        Ok(Document::new(
            subject,
            topic,
            Node::new(topic).with_children(vec![Node::new(format!("{} 基础", topic))]),
        ))
    }
}

/// 内存存储，记录 store 调用次数
#[derive(Default)]
pub struct MockStore {
    documents: Mutex<Vec<Document>>,
    store_calls: AtomicUsize,
    fail_store: bool,
}

impl MockStore {
    pub fn failing() -> Self {
        Self {
            fail_store: true,
            ..Self::default()
        }
    }

    pub fn store_calls(&self) -> usize {
        self.store_calls.load(Ordering::SeqCst)
    }

    pub fn documents(&self) -> Vec<Document> {
        self.documents.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobStore for MockStore {
    async fn init(&self) -> AppResult<()> {
        Ok(())
    }

    async fn store(&self, document: &Document) -> AppResult<String> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_store {
            return Err(AppError::storage("disk full"));
        }
        self.documents.lock().unwrap().push(document.clone());
        Ok(mindmap_batch::services::storage_key(
            &document.subject,
            &document.topic,
            &document.id,
        ))
    }

    async fn list(&self, page_token: Option<&str>, limit: Option<usize>) -> AppResult<Page<Document>> {
        let docs = self.documents();
        let offset: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let limit = limit.unwrap_or(10);
        let next = offset.saturating_add(limit);
        Ok(Page {
            items: docs.iter().skip(offset).take(limit).cloned().collect(),
            next_page_token: (next < docs.len()).then(|| next.to_string()),
            total: Some(docs.len()),
        })
    }
}

/// 重试等待缩短到毫秒级的策略
pub fn fast_policy(retries: u32) -> RetryPolicy {
    RetryPolicy::default()
        .with_retries(retries)
        .with_timeouts(Duration::from_millis(1), Duration::from_millis(5))
}

pub fn processor_with(
    generator: Arc<MockGenerator>,
    store: Arc<dyn BlobStore>,
    retries: u32,
    timeout: Duration,
) -> BatchProcessor {
    let flow = MindMapFlow::new(generator, store, fast_policy(retries), timeout);
    BatchProcessor::new(Arc::new(flow))
}

pub fn processor(generator: Arc<MockGenerator>, store: Arc<dyn BlobStore>, retries: u32) -> BatchProcessor {
    processor_with(generator, store, retries, Duration::from_secs(5))
}

/// 写一个带表头的输入 CSV
pub fn write_input(path: &Path, rows: &[InputRow]) {
    let mut content = String::from("subject,topic\n");
    for row in rows {
        content.push_str(&format!("{},{}\n", row.subject, row.topic));
    }
    std::fs::write(path, content).unwrap();
}

/// 读取结果 CSV，返回 (topic, status, error)
pub fn read_output(path: &Path) -> Vec<(String, String, String)> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader
        .records()
        .map(|r| {
            let r = r.unwrap();
            (r[0].to_string(), r[1].to_string(), r[2].to_string())
        })
        .collect()
}

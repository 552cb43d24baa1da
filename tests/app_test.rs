mod common;

use common::{read_output, write_input, MockGenerator};
use mindmap_batch::services::LocalBlobStore;
use mindmap_batch::{App, BlobStore, Config, InputRow};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_app_runs_configured_batch() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.csv");
    let output = dir.path().join("report.csv");
    let storage = dir.path().join("mindmaps");
    write_input(&input, &[InputRow::new("Physics", "Optics"), InputRow::new("Physics", "Waves")]);

    let config = Config {
        input_path: input.to_str().unwrap().to_string(),
        output_path: output.to_str().unwrap().to_string(),
        retries: 0,
        ..Config::default()
    };
    let store = Arc::new(LocalBlobStore::new(&storage));
    let app = App::with_services(config, Arc::new(MockGenerator::succeeding()), store.clone())
        .await
        .unwrap();

    // init 会创建存储目录
    assert!(storage.is_dir());

    let report = app.run().await.unwrap();
    assert_eq!(report.len(), 2);
    assert!(report.iter().all(|o| o.is_success()));
    assert_eq!(read_output(&output).len(), 2);

    let page = store.list(None, None).await.unwrap();
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total, Some(2));
}

#[tokio::test]
async fn test_app_run_fails_on_missing_input() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        input_path: dir.path().join("nope.csv").to_str().unwrap().to_string(),
        output_path: dir.path().join("report.csv").to_str().unwrap().to_string(),
        ..Config::default()
    };
    let app = App::with_services(
        config,
        Arc::new(MockGenerator::succeeding()),
        Arc::new(LocalBlobStore::new(dir.path().join("mindmaps"))),
    )
    .await
    .unwrap();

    let err = app.run().await.unwrap_err();
    assert!(format!("{:#}", err).contains("nope.csv"));
}

//! Tests for completion sinks and the completion-log processor

use std::sync::Arc;

use prometheus_task_queue::core::{CompletionLogProcessor, CompletionSink, Principal, Task, TaskProcessor};
use prometheus_task_queue::infra::{FileSink, InMemorySink};
use serde_json::json;

#[test]
fn test_file_sink_appends_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("task.log");
    let sink = FileSink::new(&path).unwrap();

    sink.append("first\n").unwrap();
    sink.append("second\n").unwrap();

    let contents = std::fs::read_to_string(sink.path()).unwrap();
    assert_eq!(contents, "first\nsecond\n");
}

#[test]
fn test_in_memory_sink() {
    let sink = InMemorySink::new();
    assert!(sink.is_empty());
    sink.append("line\n").unwrap();
    assert_eq!(sink.len(), 1);
    assert_eq!(sink.lines(), vec!["line\n".to_string()]);
}

#[tokio::test]
async fn test_completion_log_processor_line() {
    let sink = Arc::new(InMemorySink::new());
    let processor = CompletionLogProcessor::new(sink.clone());
    let p = Principal::new("u1").unwrap();

    processor
        .process(&p, Task::new(json!({"user_id": "u1"})))
        .await
        .unwrap();

    let lines = sink.lines();
    assert_eq!(lines.len(), 1);
    let stamp = lines[0]
        .strip_prefix("u1-task completed at-")
        .and_then(|rest| rest.strip_suffix('\n'))
        .unwrap();
    assert!(stamp.parse::<u128>().unwrap() > 0);
}

#[test]
fn test_file_sink_keeps_existing_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("task.log");
    std::fs::write(&path, "earlier\n").unwrap();

    let sink = FileSink::new(&path).unwrap();
    sink.append("later\n").unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "earlier\nlater\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_completion_log_processor_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(FileSink::new(dir.path().join("task.log")).unwrap());
    let processor = CompletionLogProcessor::new(sink.clone());
    let p = Principal::new("u7").unwrap();

    let runs = (0..8).map(|i| {
        let processor = processor.clone();
        let p = p.clone();
        tokio::spawn(async move { processor.process(&p, Task::new(json!({"n": i}))).await })
    });
    for run in futures::future::join_all(runs).await {
        run.unwrap().unwrap();
    }

    let contents = std::fs::read_to_string(sink.path()).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 8);
    assert!(lines.iter().all(|l| l.starts_with("u7-task completed at-")));
}

use spindle::capture::{ProfileSink, WriteBuffer};
use spindle::domain::{Pid, Tid};
use spindle::export::ChromeTraceExporter;
use spindle::reader::TraceReader;
use std::path::Path;
use std::process::Command;

fn write_sample_trace(path: &Path) {
    let sink = ProfileSink::create_file(path, 0.5).unwrap();
    let mut buffer = WriteBuffer::new(vec![0u8; 4096], Pid(10), Tid(11)).unwrap();
    buffer.name_process(&sink, "sample").unwrap();
    buffer.name_thread(&sink, "main").unwrap();
    buffer.begin(&sink, "parse", "file=a.txt", 200).unwrap();
    buffer.end(&sink, 400).unwrap();
    buffer.quit(&sink).unwrap();
    sink.quit().unwrap();
}

#[test]
fn test_export_creates_valid_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.spall");
    write_sample_trace(&path);

    let trace = TraceReader::open(&path).unwrap().read_all().unwrap();
    let exporter = ChromeTraceExporter::from_trace(&trace).expect("Failed to convert trace");
    let mut buffer = Vec::new();
    exporter.export(&mut buffer).expect("Failed to export trace");

    let json_str = String::from_utf8(buffer).expect("Invalid UTF-8");
    let parsed: serde_json::Value = serde_json::from_str(&json_str).expect("Invalid JSON");

    assert_eq!(parsed["displayTimeUnit"], "ms");
    let events = parsed["traceEvents"].as_array().unwrap();
    assert_eq!(events.len(), 4);
    assert_eq!(events[0]["name"], "process_name");
    assert_eq!(events[2]["name"], "parse");
    assert_eq!(events[2]["ts"], 100.0);
    assert_eq!(events[3]["ph"], "E");
    assert_eq!(events[3]["ts"], 200.0);
}

#[test]
fn test_cli_summarizes_and_exports() {
    let dir = tempfile::tempdir().unwrap();
    let trace = dir.path().join("sample.spall");
    let json = dir.path().join("sample.json");
    write_sample_trace(&trace);

    let output = Command::new(env!("CARGO_BIN_EXE_spindle"))
        .arg(&trace)
        .arg("--events")
        .arg("--export")
        .arg(&json)
        .output()
        .expect("Failed to run spindle");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 chunks, 4 events, 1 threads"), "stdout: {stdout}");
    assert!(stdout.contains("B parse (file=a.txt)"));

    let parsed: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&json).unwrap()).unwrap();
    assert_eq!(parsed["traceEvents"].as_array().unwrap().len(), 4);
}

#[test]
fn test_cli_rejects_non_trace_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("not-a-trace.bin");
    std::fs::write(&path, vec![0x42; 64]).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_spindle"))
        .arg(&path)
        .output()
        .expect("Failed to run spindle");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_cli_tolerates_truncated_tail() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cut.spall");
    write_sample_trace(&path);
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_spindle"))
        .arg(&path)
        .arg("--quiet")
        .output()
        .expect("Failed to run spindle");
    assert!(output.status.success());
}

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use cellfit_core::{v1, ErrorInfo, TraceEvent, TraceSink};
use serde::Serialize;

pub const TRACE_SINK_ENV: &str = "CELLFIT_TRACE_SINK";
pub const TRACE_FILE_ENV: &str = "CELLFIT_TRACE_FILE";

pub fn sink_from_env() -> Option<Box<dyn TraceSink>> {
    let mode = std::env::var(TRACE_SINK_ENV).ok()?;
    match mode.trim().to_ascii_lowercase().as_str() {
        "stdout" => Some(Box::new(StdoutSink)),
        "file" => {
            let path = std::env::var(TRACE_FILE_ENV).ok().filter(|v| !v.trim().is_empty())?;
            Some(Box::new(FileSink::new(PathBuf::from(path))))
        }
        _ => None,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TraceEnvelope {
    source: &'static str,
    event_type: String,
    detail: Option<String>,
}

impl From<&TraceEvent> for TraceEnvelope {
    fn from(event: &TraceEvent) -> Self {
        Self {
            source: "cellfit",
            event_type: format!("{:?}", event.event_type),
            detail: event.detail.clone(),
        }
    }
}

/// Resizes a `v1` request, tracing to the sink selected by `CELLFIT_TRACE_SINK`
/// when the request sets `debug`.
pub fn resize_v1(request: v1::ResizeRequest) -> Result<v1::ResizeResponse, ErrorInfo> {
    let sink = sink_from_env();
    v1::resize_with_trace(request, sink.as_deref())
}

fn envelope_line(event: &TraceEvent) -> serde_json::Result<String> {
    serde_json::to_string(&TraceEnvelope::from(event))
}

pub struct StdoutSink;

impl TraceSink for StdoutSink {
    fn emit(&self, event: TraceEvent) {
        if let Ok(line) = envelope_line(&event) {
            println!("{}", line);
        }
    }
}

pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn write_line(&self, line: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("creating trace log parent directory")?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .context("opening trace file")?;
        writeln!(file, "{}", line).context("writing trace line")?;
        Ok(())
    }
}

impl TraceSink for FileSink {
    fn emit(&self, event: TraceEvent) {
        if let Ok(line) = envelope_line(&event) {
            let _ = self.write_line(&line);
        }
    }
}

#[cfg(test)]
mod tests {
    use cellfit_core::{resize_with_trace, ResizeRequest, ResizeTarget, SearchConfig, TraceEventType};

    use super::*;

    #[test]
    fn file_sink_writes_one_json_line_per_event() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("trace").join("cellfit.jsonl");
        let sink = FileSink::new(path.clone());

        let request = ResizeRequest::new(768, 1023, ResizeTarget::height(384.0)).with_config(SearchConfig {
            debug: true,
            ..SearchConfig::default()
        });
        resize_with_trace(&request, Some(&sink))?;

        let contents = std::fs::read_to_string(&path)?;
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?;
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0]["eventType"], "Start");
        assert_eq!(lines[0]["source"], "cellfit");
        assert_eq!(lines[1]["detail"], "0.5");
        assert_eq!(lines[4]["eventType"], "Selected");
        Ok(())
    }

    #[test]
    fn file_sink_appends() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("cellfit.jsonl");
        let sink = FileSink::new(path.clone());
        for _ in 0..2 {
            sink.emit(TraceEvent {
                event_type: TraceEventType::Start,
                detail: None,
            });
        }
        assert_eq!(std::fs::read_to_string(&path)?.lines().count(), 2);
        Ok(())
    }

    #[test]
    fn envelope_line_tags_source_and_event() -> Result<()> {
        let line = envelope_line(&TraceEvent {
            event_type: TraceEventType::ScaleResolved,
            detail: Some("0.25".to_string()),
        })?;
        let value: serde_json::Value = serde_json::from_str(&line)?;
        assert_eq!(
            value,
            serde_json::json!({ "source": "cellfit", "eventType": "ScaleResolved", "detail": "0.25" })
        );
        assert!(!line.contains('\n'));
        Ok(())
    }

    #[test]
    fn stdout_sink_accepts_events() {
        StdoutSink.emit(TraceEvent {
            event_type: TraceEventType::Start,
            detail: None,
        });
    }

    // Environment variables are process-wide, so every case shares one test.
    #[test]
    fn sink_is_selected_from_env() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("env.jsonl");

        std::env::remove_var(TRACE_SINK_ENV);
        std::env::remove_var(TRACE_FILE_ENV);
        assert!(sink_from_env().is_none());

        std::env::set_var(TRACE_SINK_ENV, " Stdout ");
        assert!(sink_from_env().is_some());

        std::env::set_var(TRACE_SINK_ENV, "syslog");
        assert!(sink_from_env().is_none());

        std::env::set_var(TRACE_SINK_ENV, "file");
        assert!(sink_from_env().is_none());
        std::env::set_var(TRACE_FILE_ENV, "  ");
        assert!(sink_from_env().is_none());

        std::env::set_var(TRACE_FILE_ENV, &path);
        let sink = sink_from_env().expect("file sink");
        sink.emit(TraceEvent {
            event_type: TraceEventType::Start,
            detail: None,
        });
        assert_eq!(std::fs::read_to_string(&path)?.lines().count(), 1);

        let request: v1::ResizeRequest = serde_json::from_value(serde_json::json!({
            "height": 64, "width": 64, "target_height": 16, "debug": true
        }))?;
        let response = resize_v1(request).expect("resize");
        assert_eq!(response.denominator, 4);
        let lines = std::fs::read_to_string(&path)?;
        assert_eq!(lines.lines().count(), 6);
        assert!(lines.lines().last().unwrap_or_default().contains("Selected"));

        std::env::remove_var(TRACE_SINK_ENV);
        std::env::remove_var(TRACE_FILE_ENV);
        Ok(())
    }
}

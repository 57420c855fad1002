//! Event Source: JSON lines to events
use crate::config::ParseMode;
use crate::data_model::Event;
use crate::error::{PregoError, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::warn;

/// Lazy, non-restartable sequence of events read from a line-oriented stream.
pub struct EventSource<R> {
    lines: Lines<R>,
    mode: ParseMode,
    line_number: u64,
}

impl<R> EventSource<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R, mode: ParseMode) -> Self {
        Self {
            lines: reader.lines(),
            mode,
            line_number: 0,
        }
    }

    /// Next event, or `None` once the stream is closed.
    ///
    /// Cancel safe: dropping the future before it resolves loses no input.
    pub async fn next_event(&mut self) -> Option<Result<Event>> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(err) => return Some(Err(PregoError::Io(err))),
            };
            self.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }
            return Some(self.decode(&line));
        }
    }

    /// 1-based number of the last line read.
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    fn decode(&self, line: &str) -> Result<Event> {
        let message = match serde_json::from_str::<serde_json::Value>(line) {
            Ok(value) => match Event::try_from(value) {
                Ok(event) => return Ok(event),
                Err(other) => format!("expected a JSON object, got {}", kind(&other)),
            },
            Err(err) => err.to_string(),
        };

        match self.mode {
            ParseMode::Strict => Err(PregoError::Decode {
                line: self.line_number,
                message,
            }),
            ParseMode::Lenient => {
                warn!(line = self.line_number, %message, "malformed input line, using empty event");
                Ok(Event::degenerate())
            }
        }
    }
}

fn kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn collect(input: &'static str, mode: ParseMode) -> Vec<Result<Event>> {
        let mut source = EventSource::new(input.as_bytes(), mode);
        let mut out = Vec::new();
        while let Some(event) = source.next_event().await {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn test_reads_events_in_order() {
        let events = collect("{\"x\":1}\n{\"x\":5}\n", ParseMode::Lenient).await;
        let xs: Vec<_> = events
            .into_iter()
            .map(|e| e.unwrap().get("x").cloned().unwrap())
            .collect();
        assert_eq!(xs, vec![json!(1), json!(5)]);
    }

    #[tokio::test]
    async fn test_lenient_mode_yields_degenerate_event() {
        let events = collect("{\"x\":1}\nnot json\n[1,2]\n{\"x\":2}", ParseMode::Lenient).await;
        assert_eq!(events.len(), 4);
        assert!(events[1].as_ref().unwrap().is_degenerate());
        assert!(events[2].as_ref().unwrap().is_degenerate());
        assert_eq!(events[3].as_ref().unwrap().get("x"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_strict_mode_reports_line_number() {
        let events = collect("{\"x\":1}\n\n{oops\n", ParseMode::Strict).await;
        assert_eq!(events.len(), 2);
        match &events[1] {
            Err(PregoError::Decode { line, .. }) => assert_eq!(*line, 3),
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped() {
        let events = collect("\n   \n{\"a\":true}\n", ParseMode::Strict).await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_ok());
    }
}

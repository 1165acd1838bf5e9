use super::{Reporter, TestReport};
use std::io;

/// Serialises the report as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReporter {
    pretty: bool,
}

impl JsonReporter {
    /// Indented output instead of a single line.
    #[must_use]
    pub const fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Reporter for JsonReporter {
    fn render(&self, report: &TestReport, out: &mut dyn io::Write) -> io::Result<()> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut *out, report)?;
        } else {
            serde_json::to_writer(&mut *out, report)?;
        }
        writeln!(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::sample_report;
    use serde_json::{json, Value};

    #[test]
    fn renders_camel_case_document() {
        let text = JsonReporter::default().render_to_string(&sample_report());
        assert_eq!(text.lines().count(), 1);

        let doc: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(doc["state"], json!("timedOut"));
        assert_eq!(doc["elapsedMs"], json!(1500));
        assert_eq!(
            doc["instances"][0],
            json!({
                "id": "producer-0",
                "kind": "producer",
                "topic": "foo",
                "sent": 1000,
                "status": "completed",
                "startedMs": 1,
                "finishedMs": 250
            })
        );
        assert_eq!(doc["instances"][1]["status"], json!("aborted"));
        assert_eq!(doc["instances"][1]["startedMs"], Value::Null);
    }

    #[test]
    fn pretty_output_spans_lines() {
        let text = JsonReporter::pretty().render_to_string(&sample_report());
        assert!(text.lines().count() > 1);
    }
}

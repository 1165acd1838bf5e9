use super::{InstanceReport, Reporter, TestReport};
use std::io;
use std::time::Duration;

/// Plain text summary, one line per instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct HumanReporter;

fn secs(d: Option<Duration>) -> String {
    d.map_or_else(|| "-".to_string(), |d| format!("{:.3}s", d.as_secs_f64()))
}

impl HumanReporter {
    fn line(instance: &InstanceReport) -> String {
        let count = match (instance.sent, instance.received) {
            (Some(sent), _) => format!("sent={sent}"),
            (None, Some(received)) => format!("received={received}"),
            (None, None) => String::new(),
        };
        let mut line = format!(
            "{id} kind={kind} topic={topic} {count} status={status} start={start} finish={finish}",
            id = instance.id,
            kind = instance.kind,
            topic = instance.topic,
            status = instance.status,
            start = secs(instance.started),
            finish = secs(instance.finished),
        );
        if let Some(error) = &instance.error {
            line.push_str(" error=\"");
            line.push_str(error);
            line.push('"');
        }
        line
    }
}

impl Reporter for HumanReporter {
    fn render(&self, report: &TestReport, out: &mut dyn io::Write) -> io::Result<()> {
        writeln!(
            out,
            "run {state} after {elapsed:.3}s: sent={sent} received={received}",
            state = report.state,
            elapsed = report.elapsed.as_secs_f64(),
            sent = report.total_sent(),
            received = report.total_received(),
        )?;
        for instance in &report.instances {
            writeln!(out, "  {}", Self::line(instance))?;
        }
        Ok(())
    }
}

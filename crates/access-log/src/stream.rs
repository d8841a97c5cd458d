use crate::record::AccessRecord;
use crate::AccessLogSink;
use std::io::Write;
use std::sync::Mutex;
use tracing::error;

/// Writes each [`AccessRecord`] as one JSON line to any `Write`
/// implementation, e.g. stdout, a file, or a test buffer. Synchronous
/// and mutex-guarded: suited to sinks with no backpressure concerns
/// of their own.
pub struct StreamSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> StreamSink<W> {
    pub fn new(writer: W) -> Self {
        StreamSink {
            writer: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send> AccessLogSink for StreamSink<W> {
    fn submit(&self, record: AccessRecord) {
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(err) => {
                error!(error = %err, "failed to serialize access record");
                return;
            }
        };
        let mut writer = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(err) = writeln!(writer, "{line}") {
            error!(error = %err, "failed to write access record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;

    fn record(sub: &str) -> AccessRecord {
        AccessRecord {
            ts: Utc::now(),
            principal_sub: sub.into(),
            operation: "api:read".into(),
            resource: "doc:42".into(),
            allow: false,
            policies: vec![],
        }
    }

    #[test]
    fn writes_one_json_line_per_record() {
        let buf: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));

        struct SharedBuf(Arc<Mutex<Vec<u8>>>);
        impl Write for SharedBuf {
            fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().write(data)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let sink = StreamSink::new(SharedBuf(buf.clone()));
        sink.submit(record("alice"));
        sink.submit(record("bob"));

        let contents = buf.lock().unwrap().clone();
        let text = String::from_utf8(contents).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: AccessRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.principal_sub, "alice");
        let parsed: AccessRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed.principal_sub, "bob");
    }
}

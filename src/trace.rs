use serde::Serialize;
use std::collections::VecDeque;

/// Entries kept by a [`DebugLog`]
pub const DEBUG_LOG_CAPACITY: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    pub msg: String,
    pub data: String,
}

/// The search page's debug panel: most recent entry first, bounded.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct DebugLog {
    entries: VecDeque<TraceEntry>,
}

impl DebugLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message with a JSON payload
    pub fn log<T: Serialize + ?Sized>(&mut self, msg: impl Into<String>, data: &T) {
        let data = match serde_json::to_value(data) {
            Ok(serde_json::Value::String(text)) => text,
            Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_default(),
            Err(err) => format!("<unserializable: {err}>"),
        };
        self.push(msg.into(), data);
    }

    /// Record a message without a payload, shown as `null`
    pub fn note(&mut self, msg: impl Into<String>) {
        self.push(msg.into(), "null".to_string());
    }

    fn push(&mut self, msg: String, data: String) {
        tracing::debug!(target: "folio::trace", "{msg} {data}");
        self.entries.push_front(TraceEntry { msg, data });
        self.entries.truncate(DEBUG_LOG_CAPACITY);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> impl Iterator<Item = &TraceEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any entry's message starts with `prefix`
    pub fn contains(&self, prefix: &str) -> bool {
        self.entries.iter().any(|entry| entry.msg.starts_with(prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_newest_first_and_bounded() {
        let mut log = DebugLog::new();
        for i in 0..25 {
            log.note(format!("entry {i}"));
        }
        assert_eq!(log.len(), DEBUG_LOG_CAPACITY);
        assert_eq!(log.entries().next().unwrap().msg, "entry 24");
        assert_eq!(log.entries().last().unwrap().msg, "entry 5");
    }

    #[test]
    fn test_payload_rendering() {
        let mut log = DebugLog::new();
        log.log("text", "plain string");
        log.log("object", &json!({"length": 2}));
        log.log("nothing", &serde_json::Value::Null);
        log.note("note");

        let entries: Vec<_> = log.entries().collect();
        assert_eq!(entries[0].data, "null");
        assert_eq!(entries[1].data, "null");
        assert_eq!(entries[2].data, "{\n  \"length\": 2\n}");
        assert_eq!(entries[3].data, "plain string");
        assert!(log.contains("obj"));

        log.clear();
        assert!(log.is_empty());
    }
}

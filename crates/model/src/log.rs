use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One log row as returned by the server, before any interpretation.
///
/// `messages` and `row_indexes` are usually JSON-encoded text, but older
/// rows and hand-inserted ones may hold plain strings or real arrays.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawLogRecord {
    #[serde(default)]
    pub success: Value,
    #[serde(default)]
    pub docname: Option<String>,
    #[serde(default)]
    pub messages: Value,
    #[serde(default)]
    pub exception: Option<String>,
    #[serde(default)]
    pub row_indexes: Value,
}

/// Source rows that contributed to a log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowIndexes {
    Parsed(Vec<u64>),
    /// Unparsable value, kept verbatim for display.
    Raw(String),
}

impl fmt::Display for RowIndexes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowIndexes::Parsed(rows) => {
                let joined = rows
                    .iter()
                    .map(u64::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                f.write_str(&joined)
            }
            RowIndexes::Raw(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    pub title: Option<String>,
    pub message: String,
}

/// Outcome of importing one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub row_indexes: RowIndexes,
    pub succeeded: bool,
    /// Present iff `succeeded`.
    pub document_name: Option<String>,
    pub messages: Vec<LogMessage>,
    pub exception_trace: Option<String>,
}

impl LogRecord {
    pub fn success(rows: Vec<u64>, document_name: impl Into<String>) -> Self {
        LogRecord {
            row_indexes: RowIndexes::Parsed(rows),
            succeeded: true,
            document_name: Some(document_name.into()),
            messages: Vec::new(),
            exception_trace: None,
        }
    }

    pub fn failure(rows: Vec<u64>, messages: Vec<LogMessage>, trace: Option<String>) -> Self {
        LogRecord {
            row_indexes: RowIndexes::Parsed(rows),
            succeeded: false,
            document_name: None,
            messages,
            exception_trace: trace,
        }
    }
}

impl From<RawLogRecord> for LogRecord {
    fn from(raw: RawLogRecord) -> Self {
        let succeeded = is_truthy(&raw.success);

        LogRecord {
            row_indexes: parse_row_indexes(&raw.row_indexes),
            succeeded,
            document_name: raw
                .docname
                .filter(|name| succeeded && !name.is_empty()),
            messages: if succeeded {
                Vec::new()
            } else {
                parse_messages(&raw.messages)
            },
            exception_trace: raw.exception.filter(|trace| !succeeded && !trace.is_empty()),
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => matches!(s.trim(), "1" | "true" | "True"),
        _ => false,
    }
}

fn parse_row_indexes(value: &Value) -> RowIndexes {
    match value {
        Value::String(text) => match serde_json::from_str::<Vec<u64>>(text) {
            Ok(rows) => RowIndexes::Parsed(rows),
            Err(_) => RowIndexes::Raw(text.clone()),
        },
        Value::Array(items) => items
            .iter()
            .map(Value::as_u64)
            .collect::<Option<Vec<_>>>()
            .map(RowIndexes::Parsed)
            .unwrap_or_else(|| RowIndexes::Raw(value.to_string())),
        Value::Null => RowIndexes::Raw(String::new()),
        other => RowIndexes::Raw(other.to_string()),
    }
}

fn parse_messages(value: &Value) -> Vec<LogMessage> {
    let decoded = match value {
        Value::Null => return Vec::new(),
        Value::String(text) if text.trim().is_empty() => return Vec::new(),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(parsed) => parsed,
            Err(_) => return vec![plain_message(text)],
        },
        other => other.clone(),
    };

    match decoded {
        Value::Array(items) => items.iter().filter_map(message_from_value).collect(),
        other => message_from_value(&other).into_iter().collect(),
    }
}

fn message_from_value(value: &Value) -> Option<LogMessage> {
    match value {
        Value::Object(map) => Some(LogMessage {
            title: map
                .get("title")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            message: match map.get("message") {
                Some(Value::String(text)) => text.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            },
        }),
        // The server's message log stores each entry as a JSON string.
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(inner @ Value::Object(_)) => message_from_value(&inner),
            _ => Some(plain_message(text)),
        },
        Value::Null => None,
        other => Some(plain_message(&other.to_string())),
    }
}

fn plain_message(text: &str) -> LogMessage {
    LogMessage {
        title: None,
        message: text.to_string(),
    }
}

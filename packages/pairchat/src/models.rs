//! Data models shared between the repository and the wire protocol.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// One persisted chat message. Immutable once written; `id` is the SQLite
/// rowid and is only present after the message has been stored.
///
/// Wire field names are `from`/`to`/`body`/`time` — both are Rust keywords,
/// hence the renames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "from")]
    pub from_user: String,
    #[serde(rename = "to")]
    pub to_user: String,
    pub body: String,
    /// RFC 3339 wall-clock timestamp, captured at format time.
    pub time: String,
}

/// Normalize an inbound raw message into the canonical stored/broadcast
/// record. Copies `from`/`to`/`body` verbatim — no length or emptiness
/// checks — and stamps the current wall-clock time.
pub fn format_message(from: &str, to: &str, body: &str) -> StoredMessage {
    StoredMessage {
        id: None,
        from_user: from.to_string(),
        to_user: to.to_string(),
        body: body.to_string(),
        time: Utc::now().to_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_copies_fields_verbatim() {
        let msg = format_message("Alice", "Bob", "hi there");
        assert_eq!(msg.from_user, "Alice");
        assert_eq!(msg.to_user, "Bob");
        assert_eq!(msg.body, "hi there");
        assert!(msg.id.is_none());
    }

    #[test]
    fn format_permits_empty_body() {
        let msg = format_message("Alice", "Bob", "");
        assert_eq!(msg.body, "");
    }

    #[test]
    fn format_stamps_parseable_time() {
        let msg = format_message("Alice", "Bob", "x");
        chrono::DateTime::parse_from_rfc3339(&msg.time).unwrap();
    }

    #[test]
    fn stored_message_wire_names() {
        let msg = StoredMessage {
            id: Some(42),
            from_user: "Alice".into(),
            to_user: "Bob".into(),
            body: "Hello!".into(),
            time: "2024-01-01T00:00:00+00:00".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["from"], "Alice");
        assert_eq!(json["to"], "Bob");
        assert_eq!(json["body"], "Hello!");
        assert_eq!(json["time"], "2024-01-01T00:00:00+00:00");
        let rt: StoredMessage = serde_json::from_value(json).unwrap();
        assert_eq!(rt.id, Some(42));
        assert_eq!(rt, msg);
    }

    #[test]
    fn stored_message_id_absent_until_persisted() {
        let json = serde_json::to_value(format_message("A", "B", "x")).unwrap();
        assert!(json.get("id").is_none());
        // Inbound payloads without an id still deserialize
        let parsed: StoredMessage = serde_json::from_value(serde_json::json!({
            "from": "A", "to": "B", "body": "x", "time": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(parsed.id.is_none());
    }
}

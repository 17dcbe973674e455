//! Change event types decoded from a MongoDB change stream.
//!
//! This module defines the shape of the events the server emits, keeping the
//! parts whose layout depends on the collection (event id, document key) opaque.

use std::fmt;

use chrono::{TimeZone, Utc};
use mongodb::bson::{self, Bson, DateTime, Document, Timestamp};
use serde::Deserialize;

/// A value whose shape is only known at runtime.
///
/// The resume token and the document key differ between server versions and
/// between collections (an `ObjectId`, a string, a compound key...), so they
/// are kept as a tagged value instead of a fixed struct.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(from = "Bson")]
pub enum EventValue {
    /// Absent or explicit `null`.
    #[default]
    Null,
    /// A plain string.
    Text(String),
    /// Anything else: a sub-document, an `ObjectId`, a number...
    Structured(Bson),
}

impl From<Bson> for EventValue {
    fn from(value: Bson) -> Self {
        match value {
            Bson::Null | Bson::Undefined => Self::Null,
            Bson::String(text) => Self::Text(text),
            other => Self::Structured(other),
        }
    }
}

impl EventValue {
    /// Returns the value as a display string.
    ///
    /// Strings are shown bare, object ids as hex and everything else as
    /// relaxed Extended JSON. `Null` is the empty string.
    pub fn display(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Text(text) => text.clone(),
            Self::Structured(Bson::ObjectId(oid)) => oid.to_hex(),
            Self::Structured(other) => extjson(other.clone()),
        }
    }

    fn as_document(&self) -> Option<&Document> {
        match self {
            Self::Structured(Bson::Document(doc)) => Some(doc),
            _ => None,
        }
    }
}

/// The database and collection an event occurred in.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Namespace {
    pub db: String,
    /// Missing for database level events such as `dropDatabase`.
    #[serde(default)]
    pub coll: Option<String>,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.coll {
            Some(coll) => write!(f, "{}.{}", self.db, coll),
            None => write!(f, "{}", self.db),
        }
    }
}

/// A single change event as emitted by the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// The resume token of this event.
    #[serde(rename = "_id", default)]
    pub id: EventValue,
    #[serde(default)]
    pub wall_time: Option<DateTime>,
    #[serde(default)]
    pub cluster_time: Option<Timestamp>,
    pub operation_type: String,
    #[serde(rename = "ns", default)]
    pub namespace: Option<Namespace>,
    #[serde(default)]
    pub document_key: EventValue,
    /// Only present for some operation types; never assume it is there.
    #[serde(default)]
    pub full_document: Option<Document>,
}

impl ChangeEvent {
    /// Decodes a raw change stream document.
    pub fn from_document(doc: Document) -> Result<Self, bson::de::Error> {
        bson::from_document(doc)
    }

    /// The event id as shown to users: the `_data` string of the resume
    /// token when it has that shape.
    pub fn id_display(&self) -> String {
        match self.id.as_document().and_then(|doc| doc.get_str("_data").ok()) {
            Some(data) => data.to_string(),
            None => self.id.display(),
        }
    }

    /// The time the server recorded the event.
    ///
    /// Servers before 6.0 do not send `wallTime`; the cluster time is used then.
    pub fn wall_clock_display(&self) -> String {
        let millis = match (self.wall_time, self.cluster_time) {
            (Some(wall), _) => wall.timestamp_millis(),
            (None, Some(cluster)) => i64::from(cluster.time) * 1000,
            (None, None) => return String::new(),
        };

        Utc.timestamp_millis_opt(millis)
            .single()
            .map(|time| time.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string())
            .unwrap_or_default()
    }

    /// The affected document's key. A lone `_id` is shown as its value.
    pub fn document_key_display(&self) -> String {
        match self.document_key.as_document() {
            Some(doc) if doc.len() == 1 => match doc.get("_id") {
                Some(id) => EventValue::from(id.clone()).display(),
                None => self.document_key.display(),
            },
            _ => self.document_key.display(),
        }
    }

    /// The full document as relaxed Extended JSON, or an empty string when
    /// the event carries none.
    pub fn full_document_text(&self) -> String {
        self.full_document
            .as_ref()
            .map(|doc| extjson(Bson::Document(doc.clone())))
            .unwrap_or_default()
    }
}

/// Renders a value as single-line relaxed Extended JSON.
pub(crate) fn extjson(value: Bson) -> String {
    value.into_relaxed_extjson().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, oid::ObjectId};

    fn insert_event() -> Document {
        doc! {
            "_id": { "_data": "8263A1B2C3000000012B022C0100296E5A1004" },
            "operationType": "insert",
            "clusterTime": Timestamp { time: 1_735_786_000, increment: 1 },
            "wallTime": DateTime::from_millis(1_735_787_045_123),
            "ns": { "db": "shop", "coll": "orders" },
            "documentKey": { "_id": "abc" },
            "fullDocument": { "_id": "abc", "total": 12 },
        }
    }

    #[test]
    fn test_decode_insert() {
        let event = ChangeEvent::from_document(insert_event()).unwrap();

        assert_eq!(event.operation_type, "insert");
        assert_eq!(event.id_display(), "8263A1B2C3000000012B022C0100296E5A1004");
        assert_eq!(event.document_key_display(), "abc");
        assert_eq!(event.namespace.unwrap().to_string(), "shop.orders");
        assert_eq!(event.full_document.unwrap().get_i32("total").unwrap(), 12);
    }

    #[test]
    fn test_wall_clock_display() {
        let event = ChangeEvent::from_document(insert_event()).unwrap();
        assert_eq!(event.wall_clock_display(), "2025-01-02 03:04:05.123 UTC");
    }

    #[test]
    fn test_wall_clock_falls_back_to_cluster_time() {
        let mut raw = insert_event();
        raw.remove("wallTime");
        let event = ChangeEvent::from_document(raw).unwrap();
        assert_eq!(event.wall_clock_display(), "2025-01-02 02:46:40.000 UTC");

        let mut raw = insert_event();
        raw.remove("wallTime");
        raw.remove("clusterTime");
        let event = ChangeEvent::from_document(raw).unwrap();
        assert_eq!(event.wall_clock_display(), "");
    }

    #[test]
    fn test_delete_without_full_document() {
        let oid = ObjectId::new();
        let raw = doc! {
            "_id": { "_data": "token" },
            "operationType": "delete",
            "ns": { "db": "shop", "coll": "orders" },
            "documentKey": { "_id": oid },
        };
        let event = ChangeEvent::from_document(raw).unwrap();

        assert!(event.full_document.is_none());
        assert_eq!(event.full_document_text(), "");
        assert_eq!(event.document_key_display(), oid.to_hex());
    }

    #[test]
    fn test_null_full_document() {
        let mut raw = insert_event();
        raw.insert("operationType", "update");
        raw.insert("fullDocument", Bson::Null);
        let event = ChangeEvent::from_document(raw).unwrap();
        assert!(event.full_document.is_none());
    }

    #[test]
    fn test_compound_document_key() {
        let mut raw = insert_event();
        raw.insert("documentKey", doc! { "region": "eu", "_id": 7 });
        let event = ChangeEvent::from_document(raw).unwrap();
        assert_eq!(event.document_key_display(), r#"{"region":"eu","_id":7}"#);
    }

    #[test]
    fn test_opaque_values() {
        assert_eq!(EventValue::from(Bson::Null), EventValue::Null);
        assert_eq!(EventValue::from(Bson::String("t".into())), EventValue::Text("t".into()));
        assert_eq!(EventValue::from(Bson::Int32(3)).display(), "3");
        assert_eq!(EventValue::Null.display(), "");

        let mut raw = insert_event();
        raw.insert("_id", "plain-token");
        let event = ChangeEvent::from_document(raw).unwrap();
        assert_eq!(event.id_display(), "plain-token");
    }

    #[test]
    fn test_database_namespace() {
        let mut raw = insert_event();
        raw.insert("operationType", "dropDatabase");
        raw.insert("ns", doc! { "db": "shop" });
        let event = ChangeEvent::from_document(raw).unwrap();
        assert_eq!(event.namespace.unwrap().to_string(), "shop");
    }

    #[test]
    fn test_missing_operation_type_is_an_error() {
        let mut raw = insert_event();
        raw.remove("operationType");
        assert!(ChangeEvent::from_document(raw).is_err());
    }
}

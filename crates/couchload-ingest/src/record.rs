//! Document model shared by every reader
//!
//! A [`Record`] keeps the two fields the destination treats specially, the
//! identifier and the inline attachment, as typed members. Every other column
//! or JSON key lives in an ordered field bag, so arbitrary source shapes stay
//! representable without losing their order.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};

/// Reserved identifier field of the destination
pub const ID_FIELD: &str = "_id";

/// Reserved inline-attachment field of the destination
pub const ATTACHMENTS_FIELD: &str = "_attachments";

/// Field used when a non-object entry is wrapped into a record
pub const SCALAR_WRAP_FIELD: &str = "value";

/// Binary payload embedded into a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub content_type: String,
    /// Base64 (standard alphabet, padded)
    pub data: String,
}

impl Attachment {
    /// Encode raw bytes as an attachment
    pub fn from_bytes(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: &[u8],
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data: BASE64.encode(bytes),
        }
    }
}

#[derive(Serialize)]
struct InlineAttachment<'a> {
    content_type: &'a str,
    data: &'a str,
}

/// One document on its way to the collection
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    id: Option<String>,
    fields: Map<String, Value>,
    attachment: Option<Attachment>,
}

impl Record {
    /// Empty record with no identifier
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from a JSON object.
    ///
    /// An `_id` key that coerces to a non-empty string becomes the record's
    /// identifier; otherwise it stays in the field bag untouched.
    pub fn from_map(mut map: Map<String, Value>) -> Self {
        let id = map.get(ID_FIELD).and_then(coerce_identifier);
        if id.is_some() {
            map.remove(ID_FIELD);
        }

        Self {
            id,
            fields: map,
            attachment: None,
        }
    }

    /// Build a record from any JSON value, wrapping non-objects as `{"value": v}`
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::from_map(map),
            other => Self::wrap_scalar(other),
        }
    }

    /// Wrap a non-object value as `{"value": v}`
    pub fn wrap_scalar(value: Value) -> Self {
        let mut fields = Map::new();
        fields.insert(SCALAR_WRAP_FIELD.to_string(), value);
        Self {
            id: None,
            fields,
            attachment: None,
        }
    }

    /// Append or replace a field. `_id` goes through the same lifting as [`Record::from_map`].
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if name == ID_FIELD {
            if let Some(id) = coerce_identifier(&value) {
                self.id = Some(id);
                return;
            }
        }
        self.fields.insert(name, value);
    }

    /// Attach a binary payload
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn has_id(&self) -> bool {
        self.id.is_some()
    }

    /// Identifiers are only ever assigned by the normalizer.
    ///
    /// A blank or `null` `_id` left in the field bag by the reader is dropped,
    /// so the document carries a single identifier.
    pub(crate) fn set_id(&mut self, id: String) {
        self.fields.remove(ID_FIELD);
        self.id = Some(id);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    /// Render the document exactly as it is sent to the bulk endpoint
    pub fn to_document(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    /// Bag entries shadowed by a typed member are not written
    fn is_serialized(&self, name: &str) -> bool {
        match name {
            ID_FIELD => self.id.is_none(),
            ATTACHMENTS_FIELD => self.attachment.is_none(),
            _ => true,
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let typed = usize::from(self.id.is_some()) + usize::from(self.attachment.is_some());
        let bag = self.fields.keys().filter(|name| self.is_serialized(name)).count();
        let mut map = serializer.serialize_map(Some(bag + typed))?;

        if let Some(ref id) = self.id {
            map.serialize_entry(ID_FIELD, id)?;
        }

        for (name, value) in &self.fields {
            if self.is_serialized(name) {
                map.serialize_entry(name, value)?;
            }
        }

        if let Some(ref attachment) = self.attachment {
            let mut inline = std::collections::BTreeMap::new();
            inline.insert(
                attachment.name.as_str(),
                InlineAttachment {
                    content_type: &attachment.content_type,
                    data: &attachment.data,
                },
            );
            map.serialize_entry(ATTACHMENTS_FIELD, &inline)?;
        }

        map.end()
    }
}

/// Coerce a field value into a document identifier.
///
/// Strings are taken as-is, numbers and booleans use their JSON text and
/// nested values their compact JSON. `null` and `""` yield `None`.
pub fn coerce_identifier(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_coerce_identifier() {
        assert_eq!(coerce_identifier(&json!("abc")), Some("abc".to_string()));
        assert_eq!(coerce_identifier(&json!(42)), Some("42".to_string()));
        assert_eq!(coerce_identifier(&json!(1.5)), Some("1.5".to_string()));
        assert_eq!(coerce_identifier(&json!(true)), Some("true".to_string()));
        assert_eq!(coerce_identifier(&json!({"a": 1})), Some(r#"{"a":1}"#.to_string()));
        assert_eq!(coerce_identifier(&json!(null)), None);
        assert_eq!(coerce_identifier(&json!("")), None);
    }

    #[test]
    fn test_from_map_lifts_id() {
        let record = Record::from_map(object(json!({"_id": "doc-1", "name": "a"})));
        assert_eq!(record.id(), Some("doc-1"));
        assert!(record.get(ID_FIELD).is_none());
        assert_eq!(record.get("name"), Some(&json!("a")));
    }

    #[test]
    fn test_from_map_keeps_null_id_in_fields() {
        let record = Record::from_map(object(json!({"_id": null, "name": "a"})));
        assert!(!record.has_id());
        assert_eq!(record.get(ID_FIELD), Some(&Value::Null));
    }

    #[test]
    fn test_from_value_wraps_scalars() {
        assert_eq!(
            Record::from_value(json!("Action")).to_document().unwrap(),
            json!({"value": "Action"})
        );
        assert_eq!(
            Record::from_value(json!([1, 2])).to_document().unwrap(),
            json!({"value": [1, 2]})
        );
    }

    #[test]
    fn test_document_puts_id_first_and_keeps_field_order() {
        let mut record = Record::from_map(object(json!({"zeta": 1, "alpha": 2})));
        record.set_id("7".to_string());

        let rendered = serde_json::to_string(&record).unwrap();
        assert_eq!(rendered, r#"{"_id":"7","zeta":1,"alpha":2}"#);
    }

    #[test]
    fn test_attachment_renders_inline() {
        let record = Record::new().with_attachment(Attachment::from_bytes(
            "report.pdf",
            "application/pdf",
            b"%PDF",
        ));

        assert_eq!(
            record.to_document().unwrap(),
            json!({
                "_attachments": {
                    "report.pdf": {"content_type": "application/pdf", "data": "JVBERg=="}
                }
            })
        );
    }

    #[test]
    fn test_assigned_id_replaces_blank_id_field() {
        let mut record = Record::from_map(object(json!({"_id": null, "sku": "A"})));
        record.set_id("A".to_string());

        let rendered = serde_json::to_string(&record).unwrap();
        assert_eq!(rendered, r#"{"_id":"A","sku":"A"}"#);
        assert!(record.get(ID_FIELD).is_none());
    }

    #[test]
    fn test_blank_id_field_without_identifier_is_kept() {
        let mut record = Record::new();
        record.insert("_id", json!(""));
        record.insert("name", json!("a"));

        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"_id":"","name":"a"}"#);
    }

    #[test]
    fn test_insert_id_field_sets_identifier() {
        let mut record = Record::new();
        record.insert("_id", json!("row-9"));
        record.insert("name", json!("x"));
        assert_eq!(record.id(), Some("row-9"));
        assert_eq!(record.field_names().collect::<Vec<_>>(), vec!["name"]);
    }
}

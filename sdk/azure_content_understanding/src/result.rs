//! Decoding of operation payloads into a schema-less document tree.
//!
//! Field sets vary per analyzer, so results are exposed as a
//! [`ResultDocument`] wrapping a JSON tree rather than a fixed struct. The
//! accessors cover the shape every analyzer shares: a `contents` array whose
//! items carry `markdown` and `fields`.

use azure_content_understanding_core::error::{
    ContentUnderstandingError, ContentUnderstandingResult,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The structured payload of a completed operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultDocument(Value);

impl ResultDocument {
    /// Wraps an already parsed JSON value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Borrow the underlying JSON tree.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Take ownership of the underlying JSON tree.
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Look up a top-level key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Look up a value by JSON pointer (RFC 6901), e.g. `/contents/0/fields`.
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        self.0.pointer(pointer)
    }

    /// The `contents` array, or an empty slice if the document has none.
    pub fn contents(&self) -> &[Value] {
        self.0
            .get("contents")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Extracted fields of the first content item.
    pub fn fields(&self) -> Option<&Map<String, Value>> {
        self.contents().first()?.get("fields")?.as_object()
    }

    /// Markdown rendering of the first content item.
    pub fn markdown(&self) -> Option<&str> {
        self.contents().first()?.get("markdown")?.as_str()
    }

    /// Pretty-printed JSON, suitable for writing the result to disk.
    pub fn to_pretty_string(&self) -> ContentUnderstandingResult<String> {
        Ok(serde_json::to_string_pretty(&self.0)?)
    }
}

impl From<Value> for ResultDocument {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl AsRef<Value> for ResultDocument {
    fn as_ref(&self) -> &Value {
        &self.0
    }
}

/// Parse a raw response body into a [`ResultDocument`].
///
/// No semantic validation is done on the contents.
///
/// # Errors
///
/// Returns [`ContentUnderstandingError::MalformedResponse`] if the body is not
/// valid JSON.
pub fn decode(raw: &[u8]) -> ContentUnderstandingResult<ResultDocument> {
    serde_json::from_slice(raw)
        .map(ResultDocument)
        .map_err(|e| ContentUnderstandingError::malformed("response body is not valid JSON", e))
}

/// Read a response body and deserialize it into a typed model.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> ContentUnderstandingResult<T> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| {
        ContentUnderstandingError::malformed("response body does not match the expected shape", e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ResultDocument {
        ResultDocument::new(json!({
            "analyzerId": "invoice",
            "contents": [{
                "markdown": "# Invoice\nContoso",
                "fields": {
                    "VendorName": {"type": "string", "valueString": "Contoso"}
                }
            }]
        }))
    }

    #[test]
    fn decode_nested_document() {
        let doc = decode(br#"{"a": {"b": [1, 2, {"c": true}]}, "d": null}"#).expect("valid JSON");
        assert_eq!(doc.pointer("/a/b/2/c"), Some(&json!(true)));
        assert_eq!(doc.get("d"), Some(&Value::Null));
    }

    #[test]
    fn decode_accepts_scalar_root() {
        let doc = decode(b"42").expect("valid JSON");
        assert_eq!(doc.as_value(), &json!(42));
    }

    #[test]
    fn decode_rejects_invalid_json() {
        let err = decode(b"<html>gateway error</html>").expect_err("should fail");
        assert!(
            matches!(err, ContentUnderstandingError::MalformedResponse { .. }),
            "got {err:?}"
        );
    }

    #[test]
    fn decode_rejects_empty_body() {
        let err = decode(b"").expect_err("should fail");
        assert!(matches!(
            err,
            ContentUnderstandingError::MalformedResponse { .. }
        ));
    }

    #[test]
    fn accessors_read_first_content() {
        let doc = sample();
        assert_eq!(doc.contents().len(), 1);
        assert_eq!(doc.markdown(), Some("# Invoice\nContoso"));
        let fields = doc.fields().expect("fields present");
        assert_eq!(fields["VendorName"]["valueString"], "Contoso");
    }

    #[test]
    fn accessors_tolerate_missing_contents() {
        let doc = ResultDocument::new(json!({"id": "op-1"}));
        assert!(doc.contents().is_empty());
        assert!(doc.fields().is_none());
        assert!(doc.markdown().is_none());
    }

    #[test]
    fn serializes_transparently() {
        let doc = sample();
        let text = doc.to_pretty_string().expect("serializable");
        let back: Value = serde_json::from_str(&text).expect("round trip");
        assert_eq!(&back, doc.as_value());
    }
}

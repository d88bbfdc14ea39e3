use crate::errors::EnvelopeError;
use hyper::body::Bytes;
use serde_json::Value;

/// A page event batch that passed envelope validation.
///
/// The body is kept byte-for-byte as received: it is what gets forwarded to
/// every destination and what a dead-letter record stores.
#[derive(Clone, Debug)]
pub struct EventBatch {
    body: Bytes,
    page_ids: Vec<Option<String>>,
}

impl EventBatch {
    /// Requires `object == "page"` and a non-empty `entry` array.
    pub fn parse(body: Bytes) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_slice(&body)?;

        if value.get("object").and_then(Value::as_str) != Some("page") {
            return Err(EnvelopeError::NotPage);
        }

        let entries = value
            .get("entry")
            .and_then(Value::as_array)
            .filter(|entries| !entries.is_empty())
            .ok_or(EnvelopeError::NoEntries)?;

        let page_ids = entries
            .iter()
            .map(|entry| match entry.get("id") {
                Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
                Some(Value::Number(id)) => Some(id.to_string()),
                _ => None,
            })
            .collect();

        Ok(Self { body, page_ids })
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The body as text. Parsing succeeded, so this is valid UTF-8.
    pub fn payload(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// One slot per entry, `None` where the entry carries no usable id.
    pub fn page_ids(&self) -> &[Option<String>] {
        &self.page_ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &'static str) -> Result<EventBatch, EnvelopeError> {
        EventBatch::parse(Bytes::from_static(body.as_bytes()))
    }

    #[test]
    fn test_parse_page_batch() {
        let body = r#"{"object":"page","entry":[{"id":"123","time":1},{"id":456},{"time":2},{"id":""}]}"#;
        let batch = parse(body).unwrap();

        assert_eq!(
            batch.page_ids(),
            &[Some("123".to_string()), Some("456".to_string()), None, None]
        );
        assert_eq!(batch.body().as_ref(), body.as_bytes());
        assert_eq!(batch.payload(), body);
    }

    #[test]
    fn test_body_kept_verbatim() {
        // Whitespace and key order must survive for downstream signature checks
        let body = "{ \"entry\": [ {\"id\": \"1\"} ],\n  \"object\": \"page\" }";
        let batch = parse(body).unwrap();
        assert_eq!(batch.body().as_ref(), body.as_bytes());
    }

    #[test]
    fn test_rejects_wrong_shape() {
        assert!(matches!(
            parse(r#"{"object":"user","entry":[{"id":"1"}]}"#),
            Err(EnvelopeError::NotPage)
        ));
        assert!(matches!(
            parse(r#"{"entry":[{"id":"1"}]}"#),
            Err(EnvelopeError::NotPage)
        ));
        assert!(matches!(
            parse(r#"{"object":"page"}"#),
            Err(EnvelopeError::NoEntries)
        ));
        assert!(matches!(
            parse(r#"{"object":"page","entry":[]}"#),
            Err(EnvelopeError::NoEntries)
        ));
        assert!(matches!(
            parse(r#"{"object":"page","entry":{"id":"1"}}"#),
            Err(EnvelopeError::NoEntries)
        ));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            parse(r#"{"object":"page","#),
            Err(EnvelopeError::Malformed(_))
        ));
        assert!(matches!(parse(""), Err(EnvelopeError::Malformed(_))));
    }
}

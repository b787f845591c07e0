use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ResourceList {
    pub resources: Vec<String>,
    /// Cursor for the next page; absent or empty on the last one.
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResourceBody {
    pub resource: serde_json::Value,
}

/// Pulls a human-readable message out of an error body.
///
/// Accepts `{"error": "..."}`, `{"error": {"message": "..."}}` and
/// `{"errors": [{"message": "..."}]}`.
pub fn error_message(body: &serde_json::Value) -> Option<String> {
    let error = body.get("error");
    error
        .and_then(|e| e.as_str())
        .or_else(|| error.and_then(|e| e.get("message")).and_then(|m| m.as_str()))
        .or_else(|| {
            body.get("errors")
                .and_then(|e| e.as_array())
                .and_then(|arr| arr.first())
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
        })
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(
            error_message(&json!({"error": "boom"})).as_deref(),
            Some("boom")
        );
        assert_eq!(
            error_message(&json!({"error": {"message": "nested"}})).as_deref(),
            Some("nested")
        );
        assert_eq!(
            error_message(&json!({"errors": [{"code": 1, "message": "first"}]})).as_deref(),
            Some("first")
        );
        assert_eq!(error_message(&json!({"ok": false})), None);
    }

    #[test]
    fn test_resource_list_without_cursor() {
        let list: ResourceList = serde_json::from_value(json!({"resources": ["a", "b"]})).unwrap();
        assert_eq!(list.resources, vec!["a", "b"]);
        assert!(list.next.is_none());
    }
}

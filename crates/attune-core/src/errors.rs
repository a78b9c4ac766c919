/// Failure to turn a raw inbound frame into a typed [`crate::wire::InboundMessage`].
///
/// Parse errors are local: the frame is dropped and the connection is
/// unaffected.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("frame has no string `type` field")]
    MissingType,
}

impl ParseError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "invalid_json",
            Self::NotAnObject => "not_an_object",
            Self::MissingType => "missing_type",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_json_kind() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ParseError::InvalidJson(source);
        assert!(err.to_string().starts_with("frame is not valid JSON"));
        assert_eq!(err.error_kind(), "invalid_json");
    }

    #[test]
    fn missing_type_display() {
        assert_eq!(
            ParseError::MissingType.to_string(),
            "frame has no string `type` field"
        );
    }
}

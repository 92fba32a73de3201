//! Request bodies of the render and disassemble endpoints, and their
//! validation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::error::ValidationError;

/// Template sources must be strictly shorter than this many bytes.
pub const MAX_SOURCE_LEN: usize = 2048;

/// Body of `POST /api/render`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RenderRequest {
    /// Template blob, possibly holding several `--- name` files.
    pub source: String,
    /// Data exposed to the template. Absent means `{}`.
    #[serde(default = "empty_object")]
    #[ts(type = "unknown")]
    pub data: Value,
}

/// Body of `POST /api/disasm`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DisasmRequest {
    /// Template blob, possibly holding several `--- name` files.
    pub source: String,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

fn check_source(source: &str) -> Result<(), ValidationError> {
    if source.len() >= MAX_SOURCE_LEN {
        return Err(ValidationError::SourceTooBig);
    }
    Ok(())
}

/// Decode and validate a render request body.
pub fn parse_render(body: &[u8]) -> Result<RenderRequest, ValidationError> {
    let request: RenderRequest = serde_json::from_slice(body)?;
    check_source(&request.source)?;
    Ok(request)
}

/// Decode and validate a disassemble request body.
pub fn parse_disasm(body: &[u8]) -> Result<DisasmRequest, ValidationError> {
    let request: DisasmRequest = serde_json::from_slice(body)?;
    check_source(&request.source)?;
    Ok(request)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn data_defaults_to_empty_object() {
        let request = parse_render(br#"{"source": "x"}"#).unwrap();
        assert_eq!(request.data, json!({}));
    }

    #[test]
    fn source_length_boundary() {
        let ok = json!({"source": "a".repeat(MAX_SOURCE_LEN - 1)}).to_string();
        assert!(parse_disasm(ok.as_bytes()).is_ok());

        let too_big = json!({"source": "a".repeat(MAX_SOURCE_LEN)}).to_string();
        let err = parse_disasm(too_big.as_bytes()).unwrap_err();
        assert_eq!(err.to_string(), "template source is too big");
    }

    #[test]
    fn length_counts_bytes() {
        let source = "é".repeat(MAX_SOURCE_LEN / 2);
        let body = json!({"source": source}).to_string();
        assert!(matches!(
            parse_disasm(body.as_bytes()),
            Err(ValidationError::SourceTooBig)
        ));
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = parse_render(b"{not json").unwrap_err();
        assert!(matches!(err, ValidationError::Malformed(_)));
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn wrong_types_are_rejected() {
        assert!(parse_render(br#"{"source": 42}"#).is_err());
        assert!(parse_disasm(br#"{"data": {}}"#).is_err());
    }
}

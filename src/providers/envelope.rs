//! Resolution of the heterogeneous upstream response envelope.
//!
//! The same logical call can come back in several shapes depending on the
//! upstream API revision. Resolution is an ordered pattern match over a closed
//! set of recognized shapes, encoding decreasing trust: a field the API
//! contract promises to populate beats a heuristic scan beats a best-effort
//! text parse. First success wins; strategies are never merged.

use crate::error::ExtractError;
use serde::Deserialize;
use serde_json::Value;

/// Full, shape-variable payload returned by the upstream completion call.
/// The raw value is retained so an exhausted resolution can be logged whole.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    raw: Value,
    fields: EnvelopeFields,
}

#[derive(Debug, Clone, Default)]
struct EnvelopeFields {
    /// Already-parsed structured output, when the upstream honors the declared
    /// schema natively.
    output_parsed: Option<Value>,
    output: Option<Vec<OutputItem>>,
    output_text: Option<String>,
    /// Legacy chat.completions shape.
    choices: Option<Vec<LegacyChoice>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Option<Vec<ContentPart>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ContentPart {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    parsed: Option<Value>,
    #[serde(default)]
    json: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct LegacyChoice {
    #[serde(default)]
    message: Option<LegacyMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct LegacyMessage {
    #[serde(default)]
    function_call: Option<LegacyFunctionCall>,
}

#[derive(Debug, Clone, Deserialize)]
struct LegacyFunctionCall {
    name: String,
    /// JSON-encoded argument string, per the legacy function-call contract.
    arguments: String,
}

/// The recognized extraction outcomes, tagged by the strategy that produced
/// them.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    DirectParsed(Value),
    ScannedContent(Value),
    RawTextJson(Value),
    FunctionCall { name: String, arguments: Value },
}

impl Extraction {
    /// The structured payload for the protocol-shaped variants. Function
    /// calls carry no document and are dispatched separately.
    pub fn into_document(self) -> Option<Value> {
        match self {
            Self::DirectParsed(v) | Self::ScannedContent(v) | Self::RawTextJson(v) => Some(v),
            Self::FunctionCall { .. } => None,
        }
    }
}

impl ResponseEnvelope {
    pub fn from_value(raw: Value) -> Self {
        // Lenient, field by field: a field that fails to type is the same as
        // an absent field, and never poisons its siblings.
        let fields = EnvelopeFields {
            output_parsed: raw.get("output_parsed").cloned(),
            output: raw
                .get("output")
                .and_then(|v| Vec::<OutputItem>::deserialize(v).ok()),
            output_text: raw
                .get("output_text")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned),
            choices: raw
                .get("choices")
                .and_then(|v| Vec::<LegacyChoice>::deserialize(v).ok()),
        };
        Self { raw, fields }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Locate the structured output, trying successive strategies in a fixed
    /// priority order until one yields a value.
    pub fn resolve(&self) -> Result<Extraction, ExtractError> {
        if let Some(value) = self.direct_parsed() {
            return Ok(Extraction::DirectParsed(value));
        }

        if let Some(value) = self.scan_output_content() {
            return Ok(Extraction::ScannedContent(value));
        }

        if let Some(value) = self.parse_output_text() {
            return Ok(Extraction::RawTextJson(value));
        }

        if let Some(extraction) = self.legacy_function_call() {
            return Ok(extraction);
        }

        Err(ExtractError::NoStructuredOutput)
    }

    /// Strategy 1: the contract-promised field, used immediately when present
    /// and non-empty.
    fn direct_parsed(&self) -> Option<Value> {
        match self.fields.output_parsed.as_ref() {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) if map.is_empty() => None,
            Some(value) => Some(value.clone()),
        }
    }

    /// Strategy 2: scan the first output item's content parts for one flagged
    /// as structured JSON: either an explicit `type: "output_json"` marker or
    /// a `parsed`/`json` payload field. First match wins. A marker without a
    /// payload yields nothing and resolution moves on.
    fn scan_output_content(&self) -> Option<Value> {
        let first = self.fields.output.as_ref()?.first()?;
        let part = first.content.as_ref()?.iter().find(|part| {
            part.kind.as_deref() == Some("output_json")
                || part.parsed.is_some()
                || part.json.is_some()
        })?;
        part.parsed.clone().or_else(|| part.json.clone())
    }

    /// Strategy 3: best-effort parse of the raw text field. A parse failure
    /// is non-fatal; the text was plain prose, keep going.
    fn parse_output_text(&self) -> Option<Value> {
        let text = self.fields.output_text.as_deref()?;
        serde_json::from_str(text).ok()
    }

    /// Strategy 4: legacy function-call directive. Undecodable arguments are
    /// logged and skipped rather than aborting the whole resolution.
    fn legacy_function_call(&self) -> Option<Extraction> {
        let call = self
            .fields
            .choices
            .as_ref()?
            .first()?
            .message
            .as_ref()?
            .function_call
            .as_ref()?;

        match serde_json::from_str::<Value>(&call.arguments) {
            Ok(arguments) => Some(Extraction::FunctionCall {
                name: call.name.clone(),
                arguments,
            }),
            Err(e) => {
                tracing::warn!(
                    name = call.name.as_str(),
                    "function call arguments were not valid JSON: {e}"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolve(raw: Value) -> Result<Extraction, ExtractError> {
        ResponseEnvelope::from_value(raw).resolve()
    }

    #[test]
    fn direct_parsed_beats_a_scannable_output_list() {
        let extraction = resolve(json!({
            "output_parsed": {"date": "2026-08-25"},
            "output": [
                {"content": [{"type": "output_json", "parsed": {"date": "1999-01-01"}}]}
            ]
        }))
        .unwrap();
        assert_eq!(
            extraction,
            Extraction::DirectParsed(json!({"date": "2026-08-25"}))
        );
    }

    #[test]
    fn null_and_empty_object_do_not_count_as_direct_output() {
        let extraction = resolve(json!({
            "output_parsed": null,
            "output_text": "{\"summary\": \"hi\"}"
        }))
        .unwrap();
        assert_eq!(extraction, Extraction::RawTextJson(json!({"summary": "hi"})));

        let extraction = resolve(json!({
            "output_parsed": {},
            "output_text": "{\"summary\": \"hi\"}"
        }))
        .unwrap();
        assert!(matches!(extraction, Extraction::RawTextJson(_)));
    }

    #[test]
    fn scans_first_output_item_for_the_json_marker() {
        let extraction = resolve(json!({
            "output": [{
                "content": [
                    {"type": "text", "text": "thinking..."},
                    {"type": "output_json", "parsed": {"date": "2026-08-25"}}
                ]
            }]
        }))
        .unwrap();
        assert_eq!(
            extraction,
            Extraction::ScannedContent(json!({"date": "2026-08-25"}))
        );
    }

    #[test]
    fn scan_accepts_a_payload_field_without_the_marker() {
        let extraction = resolve(json!({
            "output": [{"content": [{"json": {"date": "2026-08-25"}}]}]
        }))
        .unwrap();
        assert_eq!(
            extraction,
            Extraction::ScannedContent(json!({"date": "2026-08-25"}))
        );
    }

    #[test]
    fn scan_prefers_parsed_over_json_payload() {
        let extraction = resolve(json!({
            "output": [{"content": [{"parsed": {"a": 1}, "json": {"b": 2}}]}]
        }))
        .unwrap();
        assert_eq!(extraction, Extraction::ScannedContent(json!({"a": 1})));
    }

    #[test]
    fn marker_without_payload_falls_through_to_text() {
        let extraction = resolve(json!({
            "output": [{"content": [{"type": "output_json"}]}],
            "output_text": "{\"date\": \"2026-08-25\"}"
        }))
        .unwrap();
        assert_eq!(
            extraction,
            Extraction::RawTextJson(json!({"date": "2026-08-25"}))
        );
    }

    #[test]
    fn only_the_first_output_item_is_scanned() {
        let result = resolve(json!({
            "output": [
                {"content": [{"type": "text", "text": "tool ran"}]},
                {"content": [{"type": "output_json", "parsed": {"date": "x"}}]}
            ]
        }));
        assert!(matches!(result, Err(ExtractError::NoStructuredOutput)));
    }

    #[test]
    fn unparsable_text_is_non_fatal_and_reaches_the_function_call_check() {
        let extraction = resolve(json!({
            "output_text": "I could not produce JSON today, sorry.",
            "choices": [{
                "message": {
                    "function_call": {
                        "name": "getFrozenTreatIdeas",
                        "arguments": "{\"ingredients\": [\"milk\"]}"
                    }
                }
            }]
        }))
        .unwrap();
        assert_eq!(
            extraction,
            Extraction::FunctionCall {
                name: "getFrozenTreatIdeas".into(),
                arguments: json!({"ingredients": ["milk"]}),
            }
        );
    }

    #[test]
    fn unparsable_text_with_nothing_else_is_a_hard_failure_not_a_panic() {
        let result = resolve(json!({"output_text": "plain prose"}));
        assert!(matches!(result, Err(ExtractError::NoStructuredOutput)));
    }

    #[test]
    fn undecodable_function_arguments_are_skipped() {
        let result = resolve(json!({
            "choices": [{
                "message": {
                    "function_call": {"name": "getFrozenTreatIdeas", "arguments": "not json"}
                }
            }]
        }));
        assert!(matches!(result, Err(ExtractError::NoStructuredOutput)));
    }

    #[test]
    fn empty_envelope_is_a_hard_failure() {
        let result = resolve(json!({}));
        assert!(matches!(result, Err(ExtractError::NoStructuredOutput)));
    }

    #[test]
    fn mistyped_fields_degrade_to_absent_instead_of_erroring() {
        // `output` as a string is not the recognized shape; resolution should
        // continue with the other strategies.
        let extraction = resolve(json!({
            "output": "weird",
            "output_text": "{\"ok\": true}"
        }))
        .unwrap();
        assert_eq!(extraction, Extraction::RawTextJson(json!({"ok": true})));
    }

    #[test]
    fn raw_envelope_is_retained_for_diagnosis() {
        let raw = json!({"surprise": {"deeply": ["nested"]}});
        let envelope = ResponseEnvelope::from_value(raw.clone());
        assert_eq!(envelope.raw(), &raw);
    }

    #[test]
    fn into_document_returns_payload_for_protocol_variants_only() {
        assert_eq!(
            Extraction::DirectParsed(json!({"a": 1})).into_document(),
            Some(json!({"a": 1}))
        );
        assert_eq!(
            Extraction::FunctionCall {
                name: "x".into(),
                arguments: json!({}),
            }
            .into_document(),
            None
        );
    }
}

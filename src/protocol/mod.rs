pub mod fallback;
pub mod schema;

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};

/// The structured output document this subsystem exists to produce: a dated,
/// time-blocked set of action items plus optional enrichments.
///
/// Constructed once per request, either from a successfully parsed model
/// response or from the local fallback generator, and never mutated after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyProtocol {
    /// YYYY-MM-DD
    pub date: String,
    pub summary: String,
    pub blocks: Vec<ProtocolBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub busy: Option<Vec<BusyWindow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pantry_ideas: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminders: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<MediaSuggestion>>,
    /// Which tools produced the document (calendar, weather, ...). The local
    /// fallback generator plants its marker here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolBlock {
    pub id: String,
    pub title: BlockTitle,
    pub items: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// Closed set of block titles. An unrecognized title is a schema violation,
/// not a silent pass-through; serde rejects it at deserialization.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BlockTitle {
    Morning,
    Afternoon,
    Evening,
    General,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(rename = "tempF", skip_serializing_if = "Option::is_none")]
    pub temp_f: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusyWindow {
    /// ISO timestamp
    pub start: String,
    /// ISO timestamp
    pub end: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSuggestion {
    pub label: String,
    pub url: String,
}

impl DailyProtocol {
    /// Convert a loosely-typed candidate into a validated document.
    ///
    /// Serde enforces the field shapes and the block-title enum; the only
    /// check left on top is the non-empty-blocks invariant.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProtocolError> {
        let doc: DailyProtocol =
            serde_json::from_value(value).map_err(|e| ProtocolError::Schema(e.to_string()))?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.blocks.is_empty() {
            return Err(ProtocolError::EmptyBlocks);
        }
        Ok(())
    }

    pub fn is_fallback(&self) -> bool {
        self.sources
            .as_ref()
            .is_some_and(|s| s.iter().any(|m| m == fallback::FALLBACK_SOURCE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_doc() -> serde_json::Value {
        json!({
            "date": "2026-08-25",
            "summary": "An easy day.",
            "blocks": [
                {"id": "b1", "title": "morning", "items": ["hydrate"]}
            ]
        })
    }

    #[test]
    fn minimal_document_validates() {
        let doc = DailyProtocol::from_value(minimal_doc()).unwrap();
        assert_eq!(doc.date, "2026-08-25");
        assert_eq!(doc.blocks[0].title, BlockTitle::Morning);
        assert!(!doc.is_fallback());
    }

    #[test]
    fn unknown_block_title_is_rejected_not_coerced() {
        let mut value = minimal_doc();
        value["blocks"][0]["title"] = json!("midnight");
        let err = DailyProtocol::from_value(value).unwrap_err();
        assert!(matches!(err, ProtocolError::Schema(_)));
    }

    #[test]
    fn empty_blocks_are_rejected() {
        let mut value = minimal_doc();
        value["blocks"] = json!([]);
        let err = DailyProtocol::from_value(value).unwrap_err();
        assert!(matches!(err, ProtocolError::EmptyBlocks));
    }

    #[test]
    fn missing_required_key_is_a_schema_error() {
        let value = json!({"summary": "no date", "blocks": []});
        let err = DailyProtocol::from_value(value).unwrap_err();
        assert!(matches!(err, ProtocolError::Schema(_)));
    }

    #[test]
    fn enrichments_round_trip() {
        let value = json!({
            "date": "2026-08-25",
            "summary": "Busy one.",
            "blocks": [
                {"id": "b1", "title": "general", "items": ["breathe"], "rationale": "packed calendar"}
            ],
            "weather": {"tempF": 98.0, "summary": "hot", "location": "Austin, TX"},
            "busy": [{"start": "2026-08-25T09:00:00Z", "end": "2026-08-25T10:00:00Z", "label": "standup"}],
            "pantry_ideas": ["eggs + rice bowl"],
            "reminders": ["water before noon"],
            "media": [{"label": "stretch video", "url": "https://youtu.be/x"}],
            "sources": ["calendar", "weather"]
        });
        let doc = DailyProtocol::from_value(value.clone()).unwrap();
        assert_eq!(serde_json::to_value(&doc).unwrap(), value);
    }

    #[test]
    fn block_title_display_is_lowercase() {
        assert_eq!(BlockTitle::Afternoon.to_string(), "afternoon");
    }
}

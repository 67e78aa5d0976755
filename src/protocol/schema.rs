use serde_json::{Value, json};

/// Name under which the schema is declared to the model.
pub const SCHEMA_NAME: &str = "DailyProtocol";

/// Top-level keys the model must always populate. Earlier deployments
/// disagreed on which enrichments were required; this is the canonical set,
/// the rest stay nullable.
pub const REQUIRED_KEYS: [&str; 6] = [
    "date",
    "summary",
    "blocks",
    "weather",
    "pantry_ideas",
    "busy",
];

/// Strict JSON Schema declared on every protocol request. Undeclared
/// properties are forbidden at every level so the model cannot smuggle extra
/// fields past validation.
pub fn output_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": REQUIRED_KEYS,
        "properties": {
            "date": { "type": "string" },
            "summary": { "type": "string" },
            "blocks": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["id", "title", "items"],
                    "properties": {
                        "id": { "type": "string" },
                        "title": {
                            "type": "string",
                            "enum": ["morning", "afternoon", "evening", "general"]
                        },
                        "items": { "type": "array", "items": { "type": "string" } },
                        "rationale": { "type": "string", "nullable": true }
                    }
                }
            },
            "weather": {
                "type": "object",
                "additionalProperties": false,
                "nullable": true,
                "properties": {
                    "location": { "type": "string", "nullable": true },
                    "tempF": { "type": "number", "nullable": true },
                    "summary": { "type": "string", "nullable": true },
                    "humidity": { "type": "number", "nullable": true }
                }
            },
            "busy": {
                "type": "array",
                "nullable": true,
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["start", "end"],
                    "properties": {
                        "start": { "type": "string" },
                        "end": { "type": "string" },
                        "label": { "type": "string", "nullable": true }
                    }
                }
            },
            "pantry_ideas": {
                "type": "array",
                "nullable": true,
                "items": { "type": "string" }
            },
            "reminders": {
                "type": "array",
                "nullable": true,
                "items": { "type": "string" }
            },
            "media": {
                "type": "array",
                "nullable": true,
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["label", "url"],
                    "properties": {
                        "label": { "type": "string" },
                        "url": { "type": "string" }
                    }
                }
            },
            "sources": {
                "type": "array",
                "nullable": true,
                "items": { "type": "string" }
            }
        }
    })
}

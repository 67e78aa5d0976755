use serde::{Deserialize, Serialize};

/// Which downstream call the UI should make next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentMode {
    /// Open-ended chat turn.
    Chat,
    /// Regenerate / refresh the structured protocol.
    Protocol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Topic {
    Dinner,
    Schedule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIntent {
    pub mode: IntentMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<Topic>,
    /// Canned clarifying reply for recognized topics; lets the UI answer
    /// without a model call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
}

const DINNER_REPLY: &str = "Would you like recipe ideas, a pantry check, or outfit/restaurant \
                            suggestions for tonight's weather?";

const PROTOCOL_TRIGGERS: [&str; 4] = ["meeting", "calendar", "schedule", "update"];

/// Pure dispatch gate over a free-text user message. Fixed substring triggers,
/// no learning, no external calls.
pub fn detect_user_intent(input: &str) -> UserIntent {
    let normalized = input.to_lowercase();

    if normalized.contains("dinner") {
        return UserIntent {
            mode: IntentMode::Chat,
            topic: Some(Topic::Dinner),
            reply: Some(DINNER_REPLY.to_string()),
        };
    }

    if PROTOCOL_TRIGGERS.iter().any(|t| normalized.contains(t)) {
        return UserIntent {
            mode: IntentMode::Protocol,
            topic: Some(Topic::Schedule),
            reply: None,
        };
    }

    UserIntent {
        mode: IntentMode::Chat,
        topic: None,
        reply: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dinner_routes_to_chat_with_canned_reply() {
        let intent = detect_user_intent("what's for dinner tonight?");
        assert_eq!(intent.mode, IntentMode::Chat);
        assert_eq!(intent.topic, Some(Topic::Dinner));
        assert!(intent.reply.unwrap().contains("recipe ideas"));
    }

    #[test]
    fn schedule_words_route_to_protocol() {
        for message in [
            "update my schedule",
            "another MEETING today",
            "check my calendar please",
        ] {
            let intent = detect_user_intent(message);
            assert_eq!(intent.mode, IntentMode::Protocol, "for {message:?}");
            assert_eq!(intent.topic, Some(Topic::Schedule));
            assert!(intent.reply.is_none());
        }
    }

    #[test]
    fn everything_else_defaults_to_plain_chat() {
        let intent = detect_user_intent("hello");
        assert_eq!(intent.mode, IntentMode::Chat);
        assert!(intent.topic.is_none());
        assert!(intent.reply.is_none());
    }

    #[test]
    fn matching_is_case_insensitive() {
        let intent = detect_user_intent("DINNER?");
        assert_eq!(intent.topic, Some(Topic::Dinner));
    }

    #[test]
    fn dinner_wins_over_schedule_triggers() {
        // "dinner" is checked first; a message containing both stays chat.
        let intent = detect_user_intent("move my dinner meeting");
        assert_eq!(intent.mode, IntentMode::Chat);
        assert_eq!(intent.topic, Some(Topic::Dinner));
    }
}

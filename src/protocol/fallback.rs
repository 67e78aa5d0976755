use super::{BlockTitle, DailyProtocol, ProtocolBlock};
use crate::context::Context;
use chrono::Local;

/// Literal marker planted in `sources` so downstream consumers can tell a
/// locally synthesized document from a model-produced one.
pub const FALLBACK_SOURCE: &str = "local-fallback";

/// Produce a minimal but schema-valid protocol purely from local context,
/// with no network access. Deterministic given `{sleep_hours, pantry}`;
/// only the embedded date varies between calls.
pub fn fallback_protocol(ctx: &Context) -> DailyProtocol {
    fallback_protocol_for_date(ctx, &Local::now().format("%Y-%m-%d").to_string())
}

/// Date-injectable variant so callers (and tests) can pin the output.
pub fn fallback_protocol_for_date(ctx: &Context, date: &str) -> DailyProtocol {
    let sleep = ctx
        .sleep_hours
        .map_or_else(|| "an unknown number of".to_string(), |h| format!("{h}"));

    let blocks = vec![
        ProtocolBlock {
            id: "fallback-morning".into(),
            title: BlockTitle::Morning,
            items: vec![
                format!("You reported {sleep} hours of sleep — start with water and ten minutes of light."),
                "Protein-forward breakfast before the first screen.".into(),
            ],
            rationale: None,
        },
        ProtocolBlock {
            id: "fallback-afternoon".into(),
            title: BlockTitle::Afternoon,
            items: vec![
                "Take a five-minute walk between blocks of focused work.".into(),
            ],
            rationale: None,
        },
        ProtocolBlock {
            id: "fallback-evening".into(),
            title: BlockTitle::Evening,
            items: vec![
                "Screens off an hour before bed.".into(),
                "Magnesium drink if the day ran long.".into(),
            ],
            rationale: None,
        },
    ];

    let pantry_ideas = if ctx.pantry.is_empty() {
        Vec::new()
    } else {
        vec![format!(
            "On hand: {} — keep dinner simple with what's already there.",
            ctx.pantry.join(", ")
        )]
    };

    DailyProtocol {
        date: date.to_string(),
        summary: "Offline day plan — generated locally without live calendar or weather.".into(),
        blocks,
        weather: None,
        busy: None,
        pantry_ideas: Some(pantry_ideas),
        reminders: None,
        media: None,
        sources: Some(vec![FALLBACK_SOURCE.to_string()]),
    }
}

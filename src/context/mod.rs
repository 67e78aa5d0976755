use serde::{Deserialize, Serialize};

/// Client-assembled snapshot of user signals used to personalize a protocol.
///
/// Every field is optional: an absent signal degrades suggestion quality but
/// must never fail the request. Wire names match the deployed app contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(rename = "sleepHours", skip_serializing_if = "Option::is_none")]
    pub sleep_hours: Option<f64>,
    #[serde(rename = "meetingsToday", skip_serializing_if = "Option::is_none")]
    pub meetings_today: Option<u32>,
    #[serde(rename = "cyclePhase", skip_serializing_if = "Option::is_none")]
    pub cycle_phase: Option<CyclePhase>,
    #[serde(default)]
    pub pantry: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherSignal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CyclePhase {
    Pms,
    Follicular,
    Ovulation,
    Luteal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherSignal {
    #[serde(rename = "tempF", skip_serializing_if = "Option::is_none")]
    pub temp_f: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Sentinel used when the host reports no sleep signal.
pub const DEFAULT_SLEEP_HOURS: f64 = 8.0;

/// Host-platform capability seam: health, calendar and similar device APIs
/// live in the surrounding application, not in this crate. Implementations
/// return `None` when a signal is unavailable rather than erroring.
pub trait SignalSource: Send + Sync {
    fn read_sleep_hours(&self) -> Option<f64>;
    fn read_meeting_count(&self) -> Option<u32>;
}

/// Fixed signal values, used by the CLI (flags) and by tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSignals {
    pub sleep_hours: Option<f64>,
    pub meetings_today: Option<u32>,
}

impl SignalSource for StaticSignals {
    fn read_sleep_hours(&self) -> Option<f64> {
        self.sleep_hours
    }

    fn read_meeting_count(&self) -> Option<u32> {
        self.meetings_today
    }
}

impl Context {
    /// Assemble a context from ambient signals plus the stored pantry list.
    /// Missing signals fall back to sentinels instead of failing.
    pub fn assemble(signals: &dyn SignalSource, pantry: Vec<String>) -> Self {
        Self {
            sleep_hours: Some(signals.read_sleep_hours().unwrap_or(DEFAULT_SLEEP_HOURS)),
            meetings_today: Some(signals.read_meeting_count().unwrap_or(0)),
            cycle_phase: None,
            pantry,
            weather: None,
        }
    }

    /// Render the `<context>` block embedded in chat prompts. Absent fields
    /// surface as `unknown` so the model sees a stable shape.
    pub fn prompt_block(&self) -> String {
        let sleep = self
            .sleep_hours
            .map_or_else(|| "unknown".to_string(), |h| format!("{h}"));
        let meetings = self
            .meetings_today
            .map_or_else(|| "unknown".to_string(), |m| format!("{m}"));
        let cycle = self
            .cycle_phase
            .map_or_else(|| "unknown".to_string(), |p| p.to_string());
        let pantry = if self.pantry.is_empty() {
            "unknown".to_string()
        } else {
            self.pantry.join(", ")
        };
        let weather = self.weather.as_ref().map_or_else(
            || "unknown".to_string(),
            |w| match (&w.summary, w.temp_f) {
                (Some(summary), Some(temp)) => format!("{summary}, {temp}F"),
                (Some(summary), None) => summary.clone(),
                (None, Some(temp)) => format!("{temp}F"),
                (None, None) => "unknown".to_string(),
            },
        );

        format!(
            "<context>\n\
             sleepHours: {sleep}\n\
             meetingsToday: {meetings}\n\
             cyclePhase: {cycle}\n\
             pantry: {pantry}\n\
             weather: {weather}\n\
             </context>"
        )
    }
}

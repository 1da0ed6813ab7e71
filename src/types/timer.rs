use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Pomodoro,
    Swift,
    Deep,
    Custom,
}

impl Preset {
    /// Segment durations for the built-in presets; `Custom` has none and
    /// takes its durations from the user-supplied set.
    pub fn built_in(self) -> Option<Durations> {
        match self {
            Preset::Pomodoro => Some(Durations {
                focus_minutes: 25,
                short_break_minutes: 5,
                long_break_minutes: 15,
                cycles_before_long: 4,
            }),
            Preset::Swift => Some(Durations {
                focus_minutes: 15,
                short_break_minutes: 3,
                long_break_minutes: 10,
                cycles_before_long: 4,
            }),
            Preset::Deep => Some(Durations {
                focus_minutes: 50,
                short_break_minutes: 10,
                long_break_minutes: 25,
                cycles_before_long: 3,
            }),
            Preset::Custom => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Focus,
    ShortBreak,
    LongBreak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Durations {
    pub focus_minutes: u32,
    pub short_break_minutes: u32,
    pub long_break_minutes: u32,
    pub cycles_before_long: u32,
}

impl Durations {
    /// Each value is clamped independently, so one out-of-range field does
    /// not invalidate the rest of a custom set.
    pub fn clamped(self) -> Self {
        Self {
            focus_minutes: self.focus_minutes.clamp(1, 240),
            short_break_minutes: self.short_break_minutes.clamp(1, 60),
            long_break_minutes: self.long_break_minutes.clamp(1, 120),
            cycles_before_long: self.cycles_before_long.clamp(1, 12),
        }
    }
}

impl Default for Durations {
    fn default() -> Self {
        Self {
            focus_minutes: 25,
            short_break_minutes: 5,
            long_break_minutes: 15,
            cycles_before_long: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerPrefs {
    pub auto_start_next: bool,
    pub sound: bool,
    pub notifications: bool,
}

impl Default for TimerPrefs {
    fn default() -> Self {
        Self {
            auto_start_next: false,
            sound: true,
            notifications: true,
        }
    }
}

/// One completed focus segment, appended to the session log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusSession {
    pub user: String,
    #[serde(with = "time::serde::rfc3339")]
    pub ended_at: OffsetDateTime,
    pub seconds: u64,
}

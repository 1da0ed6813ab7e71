use crate::types::timer::{Durations, Phase, Preset, TimerPrefs};

use time::OffsetDateTime;

/// Upper bound on boundary replays during restore. A snapshot further behind
/// than this freezes paused instead of firing a burst of stale boundaries.
pub(crate) const CATCH_UP_REPLAY_CAP: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseCompletion {
    pub finished: Phase,
    pub next: Phase,
    pub cycle: u32,
}

/// Deadline-based countdown through the focus/break cycle. The absolute
/// `deadline` is the source of truth while running; `remaining_seconds` is a
/// derived display value that doubles as the frozen value while paused.
/// Pure state: all wall-clock access comes in through `now` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerState {
    pub preset: Preset,
    pub custom: Durations,
    pub prefs: TimerPrefs,
    pub phase: Phase,
    pub cycle: u32,
    pub running: bool,
    pub deadline: Option<OffsetDateTime>,
    pub remaining_seconds: u64,
}

impl TimerState {
    pub fn new(preset: Preset, custom: Durations, prefs: TimerPrefs) -> Self {
        let mut state = Self {
            preset,
            custom: custom.clamped(),
            prefs,
            phase: Phase::Focus,
            cycle: 0,
            running: false,
            deadline: None,
            remaining_seconds: 0,
        };
        state.remaining_seconds = state.phase_seconds(Phase::Focus);
        state
    }

    pub fn durations(&self) -> Durations {
        self.preset.built_in().unwrap_or(self.custom)
    }

    pub(crate) fn phase_seconds(&self, phase: Phase) -> u64 {
        let durations = self.durations();
        let minutes = match phase {
            Phase::Focus => durations.focus_minutes,
            Phase::ShortBreak => durations.short_break_minutes,
            Phase::LongBreak => durations.long_break_minutes,
        };
        u64::from(minutes) * 60
    }

    /// Resumes from the frozen remainder, or arms a full phase when the
    /// remainder has run out.
    pub fn start(&mut self, now: OffsetDateTime) {
        if self.running {
            return;
        }
        if self.remaining_seconds == 0 {
            self.remaining_seconds = self.phase_seconds(self.phase);
        }
        self.deadline = Some(now + time::Duration::seconds(self.remaining_seconds as i64));
        self.running = true;
    }

    pub fn pause(&mut self, now: OffsetDateTime) {
        if !self.running {
            return;
        }
        if let Some(deadline) = self.deadline {
            let left = deadline - now;
            self.remaining_seconds = if left.is_positive() {
                left.whole_seconds() as u64
            } else {
                0
            };
        }
        self.deadline = None;
        self.running = false;
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.preset, self.custom, self.prefs);
    }

    /// Jumps to the next phase as if the current one had just expired.
    pub fn skip(&mut self, now: OffsetDateTime) -> PhaseCompletion {
        self.complete_phase(now)
    }

    fn next_phase(&self) -> (Phase, u32) {
        match self.phase {
            Phase::Focus => {
                let completed = self.cycle + 1;
                if completed >= self.durations().cycles_before_long {
                    (Phase::LongBreak, 0)
                } else {
                    (Phase::ShortBreak, completed)
                }
            }
            Phase::ShortBreak | Phase::LongBreak => (Phase::Focus, self.cycle),
        }
    }

    fn complete_phase(&mut self, boundary: OffsetDateTime) -> PhaseCompletion {
        let finished = self.phase;
        let (next, cycle) = self.next_phase();
        self.phase = next;
        self.cycle = cycle;
        let full = self.phase_seconds(next);
        self.remaining_seconds = full;
        if self.running && self.prefs.auto_start_next {
            // Chain from the boundary, not from the observation time, so a
            // late tick does not stretch the next phase.
            self.deadline = Some(boundary + time::Duration::seconds(full as i64));
        } else {
            self.running = false;
            self.deadline = None;
        }
        PhaseCompletion {
            finished,
            next,
            cycle,
        }
    }

    /// Recomputes the remainder from the deadline; crossing it performs the
    /// phase transition. Never decrements a counter, so skipped or throttled
    /// ticks cost nothing.
    pub fn tick(&mut self, now: OffsetDateTime) -> Option<PhaseCompletion> {
        if !self.running {
            return None;
        }
        let deadline = self.deadline?;
        let left = deadline - now;
        if left.is_positive() {
            self.remaining_seconds = left.whole_seconds() as u64;
            return None;
        }
        self.remaining_seconds = 0;
        Some(self.complete_phase(deadline))
    }

    /// Replays every boundary that elapsed while nobody was looking, so a
    /// restored timer lands in the phase it would logically be in.
    pub fn catch_up(&mut self, now: OffsetDateTime) -> Vec<PhaseCompletion> {
        let mut completions = Vec::new();
        for _ in 0..CATCH_UP_REPLAY_CAP {
            match self.tick(now) {
                Some(completion) => completions.push(completion),
                None => return completions,
            }
        }
        if self.running {
            self.running = false;
            self.deadline = None;
            self.remaining_seconds = self.phase_seconds(self.phase);
        }
        completions
    }
}

impl Default for TimerState {
    fn default() -> Self {
        Self::new(Preset::Pomodoro, Durations::default(), TimerPrefs::default())
    }
}

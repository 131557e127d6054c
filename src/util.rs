//! Small helpers shared across the compiler: log channels and phase timing.

use std::time::Instant;

/// Log targets for the compiler's independent observability channels.
/// Each is level-checked at the call site; a disabled channel costs a
/// single branch.
pub mod loggers {
    /// Per-phase start/end records with elapsed times.
    pub const PHASES: &str = "tregex::phases";

    /// One line per compilation request, with the pattern being compiled.
    pub const COMPILATIONS: &str = "tregex::compilations";

    /// Messages for recoverable stage bailouts.
    pub const BAILOUT: &str = "tregex::bailout";

    /// Structured JSON records of automaton sizes, on success and failure.
    pub const AUTOMATON_SIZES: &str = "tregex::automaton_sizes";
}

/// \return whether per-phase timing records should be produced at all.
pub fn should_log_phases() -> bool {
    log::log_enabled!(target: loggers::PHASES, log::Level::Trace)
}

/// A stack of running phase timers. Only allocated when the phases channel
/// is enabled; every `start` must be matched by an `end` in LIFO order.
#[derive(Debug, Default)]
pub struct PhaseTimer {
    stack: Vec<(String, Instant)>,
}

impl PhaseTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, phase: &str) {
        log::trace!(target: loggers::PHASES, "{} Start", phase);
        self.stack.push((phase.to_string(), Instant::now()));
    }

    pub fn end(&mut self, phase: &str) {
        let (name, started) = self.stack.pop().expect("phase end without matching start");
        debug_assert_eq!(name, phase, "phases must nest");
        log::trace!(
            target: loggers::PHASES,
            "{} End, elapsed: {}",
            phase,
            elapsed_to_string(started)
        );
    }
}

/// Format the time elapsed since `start` for the phase log.
fn elapsed_to_string(start: Instant) -> String {
    let elapsed = start.elapsed();
    let micros = elapsed.as_micros();
    if micros >= 1000 {
        format!("{:.3}ms", micros as f64 / 1000.0)
    } else {
        format!("{micros}\u{00b5}s")
    }
}

/// \return the char for a code point, saturating at U+FFFD.
pub fn to_char_sat(c: u32) -> char {
    char::from_u32(c).unwrap_or('\u{FFFD}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_timer_balances() {
        let mut t = PhaseTimer::new();
        t.start("Parser");
        t.start("NFA");
        t.end("NFA");
        t.end("Parser");
        assert!(t.stack.is_empty());
    }

    #[test]
    fn char_saturation() {
        assert_eq!(to_char_sat('a' as u32), 'a');
        assert_eq!(to_char_sat(0xD800), '\u{FFFD}');
    }
}

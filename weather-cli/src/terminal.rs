use std::io::{self, Write};

use weather_core::{DisplaySurface, LookupPhase, ScreenState};

/// Prints the screen as one line per finished lookup.
pub struct TerminalDisplay<W> {
    out: W,
    /// (request, phase) last printed; stale or repeated renders are skipped.
    shown: Option<(u64, LookupPhase)>,
    last_phase: LookupPhase,
}

impl TerminalDisplay<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalDisplay<W> {
    pub fn new(out: W) -> Self {
        Self { out, shown: None, last_phase: LookupPhase::Idle }
    }

    pub fn last_phase(&self) -> LookupPhase {
        self.last_phase
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(state: &ScreenState) -> Option<String> {
        match state.phase {
            LookupPhase::Succeeded => state.weather.as_ref().map(|w| {
                format!(
                    "{}  {}  {}  (updated {})",
                    glyph(&w.icon),
                    w.temperature,
                    w.city,
                    w.updated_at.format("%H:%M"),
                )
            }),
            LookupPhase::Failed => state.error.as_ref().map(|e| format!("✗ {e}")),
            LookupPhase::Idle | LookupPhase::Pending => None,
        }
    }
}

impl<W: Write + Send> DisplaySurface for TerminalDisplay<W> {
    fn render(&mut self, state: &ScreenState) {
        self.last_phase = state.phase;

        let key = (state.latest_request, state.phase);
        if self.shown == Some(key) {
            return;
        }
        let Some(line) = Self::line(state) else { return };

        if let Err(err) = writeln!(self.out, "{line}").and_then(|_| self.out.flush()) {
            tracing::warn!(error = %err, "failed to write to terminal");
            return;
        }
        self.shown = Some(key);
    }
}

fn glyph(icon: &str) -> &'static str {
    match icon {
        "sun.max" => "☀",
        "cloud.bolt" => "⛈",
        "cloud.drizzle" => "🌦",
        "cloud.rain" => "🌧",
        "cloud.snow" => "🌨",
        "cloud.fog" => "🌫",
        _ => "☁",
    }
}

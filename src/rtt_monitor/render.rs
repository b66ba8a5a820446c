//! Snapshot renderers
//!
//! The scheduler hands every completed-cycle [`Snapshot`] to a [`Renderer`].
//! Rendering failures are logged and swallowed; they never stop probing.

use std::fmt;
use std::io::{self, Write};

use chrono::Local;
use crossterm::{
    cursor, queue,
    style::{Color, Print, ResetColor, SetForegroundColor, Stylize},
    terminal::{Clear, ClearType},
};
use tracing::warn;

use super::config::DisplayColor;
use super::sample::Classification;
use super::snapshot::{Snapshot, TargetSnapshot};
use super::target::Target;

/// Consumer of per-cycle snapshots
pub trait Renderer {
    fn render(&mut self, snapshot: &Snapshot);
}

impl<F> Renderer for F
where
    F: FnMut(&Snapshot),
{
    fn render(&mut self, snapshot: &Snapshot) {
        self(snapshot)
    }
}

/// Text pieces of one status line
#[derive(Debug, Clone, PartialEq)]
pub struct LineParts {
    pub stamp: String,
    pub name: String,
    pub counters: String,
    pub latest: String,
    pub classification: Option<Classification>,
}

impl LineParts {
    pub fn from_snapshot(t: &TargetSnapshot) -> Self {
        let stamp = t
            .last_timestamp
            .map(|ts| ts.with_timezone(&Local).format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".to_string());

        let counters = format!(
            "sent {:<5} │ lost {:<4} ({:5.2}%) │ avg {:6.1}ms │ range {:.1}–{:.1}ms",
            t.sent,
            t.loss_count,
            t.loss_rate_percent,
            t.mean_rtt_ms.unwrap_or(0.0),
            t.rtt_min_ms.unwrap_or(0.0),
            t.rtt_max_ms.unwrap_or(0.0),
        );

        let latest = match (t.last_classification, t.last_latency_ms) {
            (None, _) => "waiting".to_string(),
            (Some(Classification::Loss), _) | (_, None) => "*** loss".to_string(),
            (Some(c @ (Classification::Good | Classification::Bad)), Some(ms)) => {
                format!("{:5.1}ms {}", ms, c.as_str())
            }
            (Some(Classification::Normal), Some(ms)) => format!("{:5.1}ms", ms),
        };

        Self {
            stamp,
            name: t.name.clone(),
            counters,
            latest,
            classification: t.last_classification,
        }
    }
}

impl fmt::Display for LineParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {:<10} {} │ {}",
            self.stamp, self.name, self.counters, self.latest
        )
    }
}

/// Multi-line status block redrawn in place every cycle
pub struct TerminalRenderer<W: Write> {
    out: W,
    colors: Vec<Option<DisplayColor>>,
    lines_drawn: u16,
}

impl TerminalRenderer<io::Stdout> {
    pub fn stdout(targets: &[Target]) -> Self {
        Self::new(io::stdout(), targets)
    }
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W, targets: &[Target]) -> Self {
        Self {
            out,
            colors: targets.iter().map(Target::color).collect(),
            lines_drawn: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn draw(&mut self, snapshot: &Snapshot) -> io::Result<()> {
        if self.lines_drawn > 0 {
            queue!(
                self.out,
                cursor::MoveToPreviousLine(self.lines_drawn),
                Clear(ClearType::FromCursorDown)
            )?;
        }

        for (i, target) in snapshot.targets.iter().enumerate() {
            let parts = LineParts::from_snapshot(target);
            let name = format!("{:<10}", parts.name);

            queue!(self.out, Print(format!("[{}] ", parts.stamp)))?;
            match self.colors.get(i).copied().flatten() {
                Some(DisplayColor { r, g, b }) => queue!(
                    self.out,
                    SetForegroundColor(Color::Rgb { r, g, b }),
                    Print(name),
                    ResetColor
                )?,
                None => queue!(self.out, Print(name))?,
            }
            queue!(self.out, Print(format!(" {} │ ", parts.counters)))?;

            let latest = match parts.classification {
                Some(Classification::Good) => parts.latest.green(),
                Some(Classification::Bad) => parts.latest.yellow(),
                Some(Classification::Loss) => parts.latest.red().bold(),
                _ => parts.latest.stylize(),
            };
            queue!(self.out, Print(latest), Clear(ClearType::UntilNewLine), Print("\n"))?;
        }

        self.lines_drawn = snapshot.targets.len().min(u16::MAX as usize) as u16;
        self.out.flush()
    }
}

impl<W: Write> Renderer for TerminalRenderer<W> {
    fn render(&mut self, snapshot: &Snapshot) {
        if let Err(e) = self.draw(snapshot) {
            warn!("Terminal render failed: {}", e);
        }
    }
}

/// One JSON document per snapshot, newline separated
pub struct JsonLinesRenderer<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, snapshot: &Snapshot) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, snapshot)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}

impl<W: Write> Renderer for JsonLinesRenderer<W> {
    fn render(&mut self, snapshot: &Snapshot) {
        if let Err(e) = self.write(snapshot) {
            warn!("JSON render failed: {}", e);
        }
    }
}

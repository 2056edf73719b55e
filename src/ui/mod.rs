//! Progress reporting for ingestion runs
//!
//! The engine talks to a [`Ui`]: the terminal dashboard when `--tui` is
//! given, [`SilentUi`] otherwise (and in tests).

mod components;

use anyhow::Result;
use crossterm::event::{self, Event as CrosstermEvent, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::time::Duration;

use components::{LogPanel, ProgressPanel, StatusPanel};

/// Stages of a run, shown in the status panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Reading,
    Resolving,
    Reconciling,
    Translating,
    Complete,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Reading => write!(f, "Reading menu source"),
            Phase::Resolving => write!(f, "Resolving restaurant and week"),
            Phase::Reconciling => write!(f, "Writing meals"),
            Phase::Translating => write!(f, "Patching translations"),
            Phase::Complete => write!(f, "Complete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
}

#[derive(Debug, Clone, Default)]
pub struct Progress {
    pub current: u64,
    pub total: u64,
    pub label: String,
}

impl Progress {
    pub fn new(current: u64, total: u64, label: impl Into<String>) -> Self {
        Self {
            current,
            total,
            label: label.into(),
        }
    }

    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.current as f64 / self.total as f64
        }
    }
}

/// Sink for run progress. Implementations must never fail the run.
pub trait Ui {
    fn set_phase(&mut self, phase: Phase);
    fn set_info(&mut self, info: impl Into<String>);
    fn set_progress(&mut self, current: u64, total: u64, label: impl Into<String>);
    fn clear_progress(&mut self);
    fn log(&mut self, message: impl Into<String>);
    fn warn(&mut self, message: impl Into<String>);
}

/// Full-screen dashboard on the alternate screen
pub struct UiApp {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    status: StatusPanel,
    progress: ProgressPanel,
    log: LogPanel,
}

impl UiApp {
    pub fn new() -> Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        stdout.execute(EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;

        Ok(Self {
            terminal,
            status: StatusPanel::new(),
            progress: ProgressPanel::new(),
            log: LogPanel::new(),
        })
    }

    fn draw(&mut self) -> Result<()> {
        let status = &self.status;
        let progress = &self.progress;
        let log = &self.log;

        self.terminal.draw(|frame| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(5), // status
                    Constraint::Length(3), // progress
                    Constraint::Min(5),    // log
                ])
                .split(frame.area());

            status.render(frame, chunks[0]);
            progress.render(frame, chunks[1]);
            log.render(frame, chunks[2]);
        })?;

        Ok(())
    }

    /// Show the final line, wait for a key, then restore the terminal
    pub fn finish(mut self, summary: &str) -> Result<()> {
        self.set_phase(Phase::Complete);
        self.clear_progress();
        self.log(summary);
        self.log("Press q, Esc or Enter to exit...");
        self.draw()?;

        loop {
            if !event::poll(Duration::from_millis(100))? {
                continue;
            }
            if let CrosstermEvent::Key(KeyEvent {
                code, modifiers, ..
            }) = event::read()?
            {
                let ctrl_c =
                    code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL);
                if ctrl_c || matches!(code, KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter) {
                    break;
                }
            }
        }

        self.restore()
    }

    pub fn restore(mut self) -> Result<()> {
        terminal::disable_raw_mode()?;
        self.terminal.backend_mut().execute(LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Ui for UiApp {
    fn set_phase(&mut self, phase: Phase) {
        self.status.set_phase(phase);
        self.draw().ok();
    }

    fn set_info(&mut self, info: impl Into<String>) {
        self.status.set_info(info);
        self.draw().ok();
    }

    fn set_progress(&mut self, current: u64, total: u64, label: impl Into<String>) {
        self.progress
            .set_progress(Progress::new(current, total, label));
        self.draw().ok();
    }

    fn clear_progress(&mut self) {
        self.progress.clear();
        self.draw().ok();
    }

    fn log(&mut self, message: impl Into<String>) {
        self.log.add(LogLevel::Info, message);
        self.draw().ok();
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.log.add(LogLevel::Warn, message);
        self.draw().ok();
    }
}

impl Drop for UiApp {
    fn drop(&mut self) {
        // best effort, restore() may already have run
        terminal::disable_raw_mode().ok();
        self.terminal
            .backend_mut()
            .execute(LeaveAlternateScreen)
            .ok();
        self.terminal.show_cursor().ok();
    }
}

/// No-op UI for non-interactive use and tests
#[derive(Default)]
pub struct SilentUi;

impl SilentUi {
    pub fn new() -> Self {
        Self
    }
}

impl Ui for SilentUi {
    fn set_phase(&mut self, _phase: Phase) {}
    fn set_info(&mut self, _info: impl Into<String>) {}
    fn set_progress(&mut self, _current: u64, _total: u64, _label: impl Into<String>) {}
    fn clear_progress(&mut self) {}
    fn log(&mut self, _message: impl Into<String>) {}
    fn warn(&mut self, _message: impl Into<String>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_ratio() {
        assert_eq!(Progress::new(0, 0, "empty").ratio(), 0.0);
        assert_eq!(Progress::new(2, 5, "Tue").ratio(), 0.4);
    }

    #[test]
    fn test_phase_labels() {
        assert_eq!(Phase::Translating.to_string(), "Patching translations");
        assert_eq!(Phase::Complete.to_string(), "Complete");
    }
}

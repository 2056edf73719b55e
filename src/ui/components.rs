//! Panels of the ingest dashboard

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, List, ListItem, Paragraph};
use ratatui::Frame;
use std::collections::VecDeque;

use super::{LogLevel, Phase, Progress};

/// Current phase plus the restaurant/week being worked on
pub struct StatusPanel {
    phase: Phase,
    info: String,
}

impl StatusPanel {
    pub fn new() -> Self {
        Self {
            phase: Phase::Reading,
            info: String::new(),
        }
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub fn set_info(&mut self, info: impl Into<String>) {
        self.info = info.into();
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let phase_style = match self.phase {
            Phase::Complete => Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
            _ => Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        };

        let phase_indicator = match self.phase {
            Phase::Reading => "◐",
            Phase::Resolving => "⌕",
            Phase::Reconciling => "⚙",
            Phase::Translating => "⇄",
            Phase::Complete => "✓",
        };

        let lines = vec![
            Line::from(vec![
                Span::styled(format!(" {} ", phase_indicator), phase_style),
                Span::styled(self.phase.to_string(), phase_style),
            ]),
            Line::from(""),
            Line::from(vec![
                Span::raw("   "),
                Span::styled(&self.info, Style::default().fg(Color::Gray)),
            ]),
        ];

        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Menu Ingest ")
            .border_style(Style::default().fg(Color::Blue));

        frame.render_widget(Paragraph::new(lines).block(block), area);
    }
}

/// Day-by-day progress bar
pub struct ProgressPanel {
    progress: Option<Progress>,
}

impl ProgressPanel {
    pub fn new() -> Self {
        Self { progress: None }
    }

    pub fn set_progress(&mut self, progress: Progress) {
        self.progress = Some(progress);
    }

    pub fn clear(&mut self) {
        self.progress = None;
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::LEFT | Borders::RIGHT)
            .border_style(Style::default().fg(Color::Blue));

        let Some(progress) = &self.progress else {
            frame.render_widget(Paragraph::new("").block(block), area);
            return;
        };

        let label = if progress.total > 0 {
            format!(
                "{}: day {}/{}",
                progress.label, progress.current, progress.total
            )
        } else {
            progress.label.clone()
        };

        let gauge = Gauge::default()
            .block(block)
            .gauge_style(Style::default().fg(Color::Cyan).bg(Color::DarkGray))
            .ratio(progress.ratio().min(1.0))
            .label(label);

        frame.render_widget(gauge, area);
    }
}

/// Activity log; warnings stay highlighted as they scroll
pub struct LogPanel {
    entries: VecDeque<(LogLevel, String)>,
    max_entries: usize,
}

impl LogPanel {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries: 200,
        }
    }

    pub fn add(&mut self, level: LogLevel, message: impl Into<String>) {
        self.entries.push_back((level, message.into()));
        if self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Activity ")
            .border_style(Style::default().fg(Color::Blue));

        // -2 for borders
        let visible_height = area.height.saturating_sub(2) as usize;
        let start = self.entries.len().saturating_sub(visible_height);
        let last = self.entries.len().saturating_sub(1);

        let items: Vec<ListItem> = self
            .entries
            .iter()
            .enumerate()
            .skip(start)
            .map(|(i, (level, entry))| {
                let style = match level {
                    LogLevel::Warn => Style::default().fg(Color::Yellow),
                    LogLevel::Info if i == last => Style::default().fg(Color::White),
                    LogLevel::Info => Style::default().fg(Color::DarkGray),
                };
                let marker = if *level == LogLevel::Warn { "!" } else { " " };
                ListItem::new(Span::styled(format!("{} {}", marker, entry), style))
            })
            .collect();

        frame.render_widget(List::new(items).block(block), area);
    }
}

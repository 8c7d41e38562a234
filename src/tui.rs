use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs, Wrap},
};
use serde_json::Value;
use std::io::stdout;

use crate::repository::Collection;
use crate::service::ApplicationService;

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    identifier: String,
    label: String,
}

fn text_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value[key].as_str().unwrap_or("?")
}

fn job_posting_entries(records: &[Value]) -> Vec<Entry> {
    records
        .iter()
        .map(|record| Entry {
            identifier: text_field(record, "identifier").to_string(),
            label: format!("{} | {}", text_field(record, "title"), text_field(record, "company")),
        })
        .collect()
}

fn cv_entries(records: &[Value]) -> Vec<Entry> {
    records
        .iter()
        .map(|record| Entry {
            identifier: text_field(record, "identifier").to_string(),
            label: format!("{} | {}", text_field(record, "name"), text_field(record, "profession")),
        })
        .collect()
}

struct AppState {
    collection: Collection,
    job_postings: Vec<Entry>,
    cvs: Vec<Entry>,
    selected: usize,
    scroll_offset: u16,
    detail: String,
}

impl AppState {
    fn new(job_postings: Vec<Entry>, cvs: Vec<Entry>) -> Self {
        let collection = if job_postings.is_empty() && !cvs.is_empty() {
            Collection::Cvs
        } else {
            Collection::JobPostings
        };
        Self {
            collection,
            job_postings,
            cvs,
            selected: 0,
            scroll_offset: 0,
            detail: String::new(),
        }
    }

    fn entries(&self) -> &[Entry] {
        match self.collection {
            Collection::JobPostings => &self.job_postings,
            Collection::Cvs => &self.cvs,
        }
    }

    fn current(&self) -> Option<&Entry> {
        self.entries().get(self.selected)
    }

    fn next(&mut self) {
        if self.selected + 1 < self.entries().len() {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }

    fn toggle_collection(&mut self) {
        self.collection = match self.collection {
            Collection::JobPostings => Collection::Cvs,
            Collection::Cvs => Collection::JobPostings,
        };
        self.selected = 0;
        self.scroll_offset = 0;
    }

    /// Markdown of the selected record, plus its saved optimizations for a
    /// job posting. A missing mirror is regenerated by the service.
    fn load_detail(&mut self, service: &ApplicationService) {
        let Some(entry) = self.current() else {
            self.detail = "Nothing saved yet".to_string();
            return;
        };
        let identifier = entry.identifier.clone();

        let mut detail = match service.get_markdown(self.collection, &identifier) {
            Ok(Some(markdown)) => markdown,
            Ok(None) => format!("'{}' is no longer in the collection index", identifier),
            Err(e) => format!("Failed to load '{}': {:#}", identifier, e),
        };

        if self.collection == Collection::JobPostings {
            detail.push_str("\n---\n\nCV optimizations\n\n");
            match service.get_cv_optimizations(Some(&identifier)) {
                Ok(optimizations) if optimizations.is_empty() => detail.push_str("  (none saved)\n"),
                Ok(optimizations) => {
                    for optimization in &optimizations {
                        detail.push_str(&format!(
                            "  {}  from CV {}\n",
                            text_field(optimization, "identifier"),
                            text_field(optimization, "base_cv_identifier"),
                        ));
                    }
                }
                Err(e) => detail.push_str(&format!("  Failed to list: {:#}\n", e)),
            }
        }

        self.detail = detail;
    }
}

pub fn run_browse(service: &ApplicationService) -> Result<()> {
    let job_postings = job_posting_entries(&service.get_job_postings()?);
    let cvs = cv_entries(&service.get_cvs()?);
    if job_postings.is_empty() && cvs.is_empty() {
        println!("No job postings or CVs saved.");
        return Ok(());
    }

    let mut state = AppState::new(job_postings, cvs);
    state.load_detail(service);

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, service);

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    service: &ApplicationService,
) -> Result<()> {
    let mut list_state = ListState::default();
    list_state.select(Some(0));

    loop {
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let prev = (state.collection, state.selected);
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Down | KeyCode::Char('j') => state.next(),
                KeyCode::Up | KeyCode::Char('k') => state.prev(),
                KeyCode::Char('J') | KeyCode::PageDown => state.scroll_down(),
                KeyCode::Char('K') | KeyCode::PageUp => state.scroll_up(),
                KeyCode::Tab => state.toggle_collection(),
                _ => {}
            }
            if (state.collection, state.selected) != prev {
                list_state.select(Some(state.selected));
                state.load_detail(service);
            }
        }
    }
    Ok(())
}

fn draw(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    let tab_index = match state.collection {
        Collection::JobPostings => 0,
        Collection::Cvs => 1,
    };
    let tabs = Tabs::new(vec![
        format!(" Job postings ({}) ", state.job_postings.len()),
        format!(" CVs ({}) ", state.cvs.len()),
    ])
    .select(tab_index)
    .highlight_style(Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED));
    frame.render_widget(tabs, rows[0]);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(rows[1]);

    let items: Vec<ListItem> = state
        .entries()
        .iter()
        .map(|entry| ListItem::new(entry.label.clone()))
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(format!(" {} ", state.collection)))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, chunks[0], list_state);

    let title = state
        .current()
        .map(|entry| format!(" {} ", entry.identifier))
        .unwrap_or_else(|| " Detail ".to_string());
    let detail = Paragraph::new(state.detail.as_str())
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));
    frame.render_widget(detail, chunks[1]);

    let help = Paragraph::new(" j/k:navigate  J/K:scroll  Tab:switch collection  q:quit")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, rows[2]);
}

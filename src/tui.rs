use anyhow::Result;
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;

use crate::console::{format_salary, truncate};
use crate::models::VacancyListing;
use crate::reports::Reports;

struct AppState {
    vacancies: Vec<VacancyListing>,
    selected: usize,
    scroll_offset: u16,
    average: Option<f64>,
    pending_delete: bool,
    status: Option<String>,
}

impl AppState {
    fn new(vacancies: Vec<VacancyListing>, average: Option<f64>) -> Self {
        Self {
            vacancies,
            selected: 0,
            scroll_offset: 0,
            average,
            pending_delete: false,
            status: None,
        }
    }

    fn current(&self) -> Option<&VacancyListing> {
        self.vacancies.get(self.selected)
    }

    fn next(&mut self) {
        if !self.vacancies.is_empty() && self.selected < self.vacancies.len() - 1 {
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

    /// Drops the selected row after it was deleted from the store.
    fn remove_current(&mut self) {
        if self.selected < self.vacancies.len() {
            self.vacancies.remove(self.selected);
        }
        if self.selected >= self.vacancies.len() {
            self.selected = self.vacancies.len().saturating_sub(1);
        }
        self.scroll_offset = 0;
    }
}

/// Browses stored vacancies, optionally narrowed to titles containing `keyword`.
pub fn run_browse(reports: Reports<'_>, keyword: Option<&str>) -> Result<()> {
    let vacancies = match keyword {
        Some(k) => reports.search_vacancies(k)?,
        None => reports.all_vacancies()?,
    };
    if vacancies.is_empty() {
        println!("No vacancies found.");
        return Ok(());
    }

    let mut state = AppState::new(vacancies, reports.average_salary()?);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, reports);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    reports: Reports<'_>,
) -> Result<()> {
    let mut list_state = ListState::default();
    list_state.select(Some(0));

    loop {
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }

            if state.pending_delete {
                state.pending_delete = false;
                if key.code == KeyCode::Char('y') {
                    if let Some(id) = state.current().map(|v| v.id) {
                        reports.delete_vacancy(id)?;
                        state.remove_current();
                        state.status = Some(format!("Deleted vacancy #{}", id));
                        if state.vacancies.is_empty() {
                            break;
                        }
                    }
                } else {
                    state.status = Some("Delete cancelled".to_string());
                }
                list_state.select(Some(state.selected));
                continue;
            }

            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Down | KeyCode::Char('j') => state.next(),
                KeyCode::Up | KeyCode::Char('k') => state.prev(),
                KeyCode::Char('J') | KeyCode::PageDown => state.scroll_down(),
                KeyCode::Char('K') | KeyCode::PageUp => state.scroll_up(),
                KeyCode::Char('d') => {
                    state.pending_delete = true;
                    state.status = Some("Delete this vacancy? y to confirm".to_string());
                }
                _ => {}
            }
            list_state.select(Some(state.selected));
        }
    }
    Ok(())
}

fn draw(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(rows[0]);

    // Left panel: vacancy list, salaried rows above the average marked with '+'
    let items: Vec<ListItem> = state
        .vacancies
        .iter()
        .map(|v| {
            let marker = match (v.salary().midpoint(), state.average) {
                (Some(mid), Some(avg)) if mid > avg => "+",
                (None, _) => " ",
                _ => "-",
            };
            ListItem::new(format!(
                "{} #{:<5} {} | {}",
                marker,
                v.id,
                truncate(&v.title, 32),
                truncate(&v.company_name, 18)
            ))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Vacancies ({}) ", state.vacancies.len())),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[0], list_state);

    // Right panel: vacancy detail
    let detail = Paragraph::new(build_detail(state))
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));

    frame.render_widget(detail, chunks[1]);

    let footer = state.status.clone().unwrap_or_else(|| {
        " j/k:navigate  J/K:scroll  d:delete  q:quit   (+ above average salary)".to_string()
    });
    let help = Paragraph::new(footer).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, rows[1]);
}

fn build_detail(state: &AppState) -> Text<'_> {
    let Some(v) = state.current() else {
        return Text::raw("No vacancy selected");
    };

    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(Span::styled(
        v.title.as_str(),
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(format!("at {}", v.company_name)));
    lines.push(Line::from(""));

    let salary = format_salary(v);
    let salary_style = match (v.salary().midpoint(), state.average) {
        (Some(mid), Some(avg)) if mid > avg => Style::default().fg(Color::Green),
        _ if v.salary().is_undisclosed() => Style::default().fg(Color::DarkGray),
        _ => Style::default(),
    };
    lines.push(Line::from(Span::styled(format!("Salary: {}", salary), salary_style)));
    if let (Some(mid), Some(avg)) = (v.salary().midpoint(), state.average) {
        lines.push(Line::from(Span::styled(
            format!("Midpoint {:.0} vs average {:.0}", mid, avg),
            Style::default().fg(Color::DarkGray),
        )));
    }

    lines.push(Line::from(format!("URL: {}", v.display_url())));
    lines.push(Line::from(Span::styled(
        format!("Stored: {}", v.created_at),
        Style::default().fg(Color::DarkGray),
    )));
    lines.push(Line::from(""));

    match v.description.as_deref().filter(|d| !d.is_empty()) {
        Some(text) => {
            lines.push(Line::from(Span::styled(
                "Responsibilities",
                Style::default().add_modifier(Modifier::BOLD),
            )));
            for line in textwrap::fill(text, 70).lines() {
                lines.push(Line::from(format!("  {}", line)));
            }
        }
        None => lines.push(Line::from(Span::styled(
            "(No description)",
            Style::default().fg(Color::DarkGray),
        ))),
    }

    Text::from(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(id: i64, title: &str) -> VacancyListing {
        VacancyListing {
            id,
            company_id: 1,
            company_name: "Acme".to_string(),
            title: title.to_string(),
            salary_from: None,
            salary_to: None,
            currency: None,
            url: Some(format!("https://hh.ru/vacancy/{}", id)),
            description: None,
            created_at: String::new(),
        }
    }

    #[test]
    fn test_navigation_stays_in_bounds() {
        let mut state = AppState::new(vec![listing(1, "A"), listing(2, "B")], None);
        state.prev();
        assert_eq!(state.selected, 0);
        state.next();
        state.next();
        assert_eq!(state.selected, 1);
    }

    #[test]
    fn test_remove_current_moves_selection() {
        let mut state = AppState::new(vec![listing(1, "A"), listing(2, "B")], None);
        state.next();
        state.remove_current();
        assert_eq!(state.selected, 0);
        assert_eq!(state.current().map(|v| v.id), Some(1));
        state.remove_current();
        assert!(state.current().is_none());
    }
}

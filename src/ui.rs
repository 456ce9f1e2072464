use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use matchmaker::dropdown::dropdown_for;
use matchmaker::{
    ApiError, CareerRecord, EducationRecord, EntryRecord, ProfileApi, ProfileWizard, Section, Step, WizardProgress,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::io;

/// One editable line of the current step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRef {
    Scalar(&'static str),
    Entry(usize, &'static str),
}

pub struct App<'a> {
    pub wizard: ProfileWizard<'a, dyn ProfileApi + 'a>,
    pub state: TableState,
    /// Text being typed into the selected field
    pub editing: Option<String>,
    /// Blocking alert; any key dismisses it
    pub alert: Option<String>,
}

impl<'a> App<'a> {
    pub fn new(wizard: ProfileWizard<'a, dyn ProfileApi + 'a>) -> Self {
        let mut state = TableState::default();
        state.select(Some(0));
        Self {
            wizard,
            state,
            editing: None,
            alert: None,
        }
    }

    pub fn section(&self) -> Section {
        self.wizard.step().section()
    }

    pub fn fields(&self) -> Vec<FieldRef> {
        match self.section() {
            Section::Education => entry_fields(self.wizard.draft.education.len(), EducationRecord::FIELDS),
            Section::Career => entry_fields(self.wizard.draft.career.len(), CareerRecord::FIELDS),
            section => Self::scalar_fields(section),
        }
    }

    fn scalar_fields(section: Section) -> Vec<FieldRef> {
        matchmaker::ProfileDraft::fields(section)
            .iter()
            .map(|f| FieldRef::Scalar(f))
            .collect()
    }

    pub fn selected(&self) -> Option<FieldRef> {
        self.state.selected().and_then(|i| self.fields().get(i).copied())
    }

    pub fn value(&self, field: FieldRef) -> String {
        let draft = &self.wizard.draft;
        let raw = match (self.section(), field) {
            (Section::Education, FieldRef::Entry(i, f)) => draft.education.get(i).and_then(|r| r.get(f)),
            (Section::Career, FieldRef::Entry(i, f)) => draft.career.get(i).and_then(|r| r.get(f)),
            (section, FieldRef::Scalar(f)) => draft.get(section, f),
            _ => None,
        };
        raw.unwrap_or_default().to_string()
    }

    /// Value as shown: dropdown ids become their names
    pub fn display_value(&self, field: FieldRef) -> String {
        let value = self.value(field);
        if let FieldRef::Scalar(f) = field {
            if let Some(kind) = dropdown_for(self.section(), f) {
                if let Some(name) = self.wizard.dropdowns.name_for(kind, &value) {
                    return name.to_string();
                }
            }
        }
        value
    }

    fn set_value(&mut self, field: FieldRef, value: String) -> Result<(), ApiError> {
        match (self.section(), field) {
            (Section::Education, FieldRef::Entry(i, f)) => self.wizard.draft.education.update_field(i, f, value),
            (Section::Career, FieldRef::Entry(i, f)) => self.wizard.draft.career.update_field(i, f, value),
            (section, FieldRef::Scalar(f)) => self.wizard.set_field(section, f, value),
            _ => Ok(()),
        }
    }

    fn report(&mut self, result: Result<(), ApiError>) {
        if let Err(e) = result {
            self.alert = Some(e.alert_message());
        }
    }

    pub fn next(&mut self) {
        let len = self.fields().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.fields().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    fn clamp_selection(&mut self) {
        let len = self.fields().len();
        match self.state.selected() {
            _ if len == 0 => self.state.select(None),
            Some(i) if i >= len => self.state.select(Some(len - 1)),
            None => self.state.select(Some(0)),
            _ => {}
        }
    }

    /// Left/Right on a dropdown field picks the neighbouring option
    pub fn cycle_option(&mut self, forward: bool) {
        let Some(FieldRef::Scalar(f)) = self.selected() else { return };
        let Some(kind) = dropdown_for(self.section(), f) else { return };
        let current = self.value(FieldRef::Scalar(f));
        let id = self.wizard.dropdowns.cycle(kind, &current, forward).map(|o| o.id.clone());
        if let Some(id) = id {
            let result = self.set_value(FieldRef::Scalar(f), id);
            self.report(result);
        }
    }

    pub fn append_entry(&mut self) {
        match self.section() {
            Section::Education => self.wizard.draft.education.append(),
            Section::Career => self.wizard.draft.career.append(),
            _ => return,
        }
        self.clamp_selection();
    }

    pub fn remove_entry(&mut self) {
        let Some(FieldRef::Entry(index, _)) = self.selected() else { return };
        match self.section() {
            Section::Education => {
                self.wizard.draft.education.remove(index);
            }
            Section::Career => {
                self.wizard.draft.career.remove(index);
            }
            _ => {}
        }
        self.clamp_selection();
    }

    /// Save the step and move on
    pub fn submit_step(&mut self) {
        match self.wizard.next() {
            Ok(WizardProgress::Moved(_)) => self.state.select(Some(0)),
            Ok(WizardProgress::Finished) => {}
            Err(e) => self.alert = Some(e.alert_message()),
        }
        self.clamp_selection();
    }

    pub fn back(&mut self) {
        if self.wizard.previous() {
            self.state.select(Some(0));
            self.clamp_selection();
        }
    }

    /// Returns true when the app should quit
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.alert.take().is_some() {
            return false;
        }
        if self.wizard.is_finished() {
            return true;
        }

        if let Some(buffer) = self.editing.as_mut() {
            match key.code {
                KeyCode::Char(c) => buffer.push(c),
                KeyCode::Backspace => {
                    buffer.pop();
                }
                KeyCode::Esc => self.editing = None,
                KeyCode::Enter => {
                    let value = self.editing.take().unwrap_or_default();
                    if let Some(field) = self.selected() {
                        let result = self.set_value(field, value);
                        self.report(result);
                    }
                }
                _ => {}
            }
            return false;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Enter => {
                if let Some(field) = self.selected() {
                    self.editing = Some(self.value(field));
                }
            }
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.previous(),
            KeyCode::Left => self.cycle_option(false),
            KeyCode::Right => self.cycle_option(true),
            KeyCode::Char('n') => self.submit_step(),
            KeyCode::Char('p') => self.back(),
            KeyCode::Char('a') => self.append_entry(),
            KeyCode::Char('d') => self.remove_entry(),
            _ => {}
        }
        false
    }
}

fn entry_fields(rows: usize, fields: &'static [&'static str]) -> Vec<FieldRef> {
    (0..rows)
        .flat_map(|i| fields.iter().map(move |f| FieldRef::Entry(i, f)))
        .collect()
}

/// `dateOfBirth` -> `Date of birth`
pub fn label(field: &str) -> String {
    let mut out = String::new();
    for (i, c) in field.chars().enumerate() {
        if i == 0 {
            out.extend(c.to_uppercase());
        } else if c.is_uppercase() {
            out.push(' ');
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press && app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Step tabs
            Constraint::Min(0),    // Fields
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);
    if app.wizard.is_finished() {
        render_finished(f, chunks[1]);
    } else {
        render_fields(f, chunks[1], app);
    }
    render_status_bar(f, chunks[2], app);

    if let Some(message) = &app.alert {
        render_alert(f, f.size(), message);
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let current = app.wizard.step();

    let mut tab_spans = vec![];
    for (i, step) in (1..=Step::COUNT).filter_map(Step::from_index).enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if step == current {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else if step.index() < current.index() || app.wizard.is_finished() {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(format!("{}. {}", step.index(), step.section().title()), style));
    }

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_fields(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Field", "Value"].iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    let header = Row::new(header_cells).style(Style::default().bg(Color::DarkGray)).height(1);

    let selected = app.state.selected();
    let required = app.wizard.step().required_fields();
    let rows: Vec<Row> = app
        .fields()
        .into_iter()
        .enumerate()
        .map(|(i, field)| {
            let (name, f) = match field {
                FieldRef::Scalar(f) => (label(f), f),
                FieldRef::Entry(row, f) => (format!("#{} {}", row + 1, label(f)), f),
            };
            let name = if required.contains(&f) { format!("{} *", name) } else { name };

            let value = match (&app.editing, selected) {
                (Some(buffer), Some(s)) if s == i => Cell::from(format!("{}▏", buffer))
                    .style(Style::default().fg(Color::Black).bg(Color::Yellow)),
                _ => {
                    let shown = app.display_value(field);
                    let style = if dropdown_for(app.section(), f).is_some() {
                        Style::default().fg(Color::Cyan)
                    } else {
                        Style::default().fg(Color::White)
                    };
                    Cell::from(truncate(&shown, 60)).style(style)
                }
            };

            Row::new(vec![Cell::from(name), value]).height(1)
        })
        .collect();

    let title = format!(
        " Step {}/{}: {} ",
        app.wizard.sequencer().current(),
        app.wizard.sequencer().last(),
        app.section().title()
    );
    let table = Table::new(rows, [Constraint::Length(32), Constraint::Min(20)])
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(title),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_finished(f: &mut Frame, area: Rect) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  Profile complete!",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "  Press any key to exit",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    ];
    let panel = Paragraph::new(text).block(Block::default().borders(Borders::ALL).title(" Done "));
    f.render_widget(panel, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));

    let mut status_spans = if app.editing.is_some() {
        vec![key(" Enter"), Span::raw(" Keep | "), key("Esc"), Span::raw(" Cancel")]
    } else {
        vec![
            key(" Enter"),
            Span::raw(" Edit | "),
            key("←/→"),
            Span::raw(" Choose | "),
            key("n"),
            Span::raw(if app.wizard.sequencer().is_last() { " Submit | " } else { " Next | " }),
            key("p"),
            Span::raw(" Back"),
        ]
    };

    if app.section().is_list() && app.editing.is_none() {
        status_spans.push(Span::raw(" | "));
        status_spans.push(key("a"));
        status_spans.push(Span::raw(" Add | "));
        status_spans.push(key("d"));
        status_spans.push(Span::raw(" Remove"));
    }
    status_spans.push(Span::raw(" | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::White)));

    f.render_widget(status_bar, area);
}

fn render_alert(f: &mut Frame, area: Rect, message: &str) {
    let width = area.width.min(60);
    let popup = Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + area.height / 3,
        width,
        height: 5.min(area.height),
    };

    let text = vec![
        Line::from(Span::styled(message.to_string(), Style::default().fg(Color::White))),
        Line::from(Span::styled(
            "Press any key",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    ];
    let alert = Paragraph::new(text).wrap(Wrap { trim: true }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .title(" Error "),
    );

    f.render_widget(Clear, popup);
    f.render_widget(alert, popup);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_len - 3).collect::<String>())
    }
}

use std::fs::File;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::{event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind}, execute, terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen}};
use ratatui::{backend::CrosstermBackend, Terminal, widgets::{Block, Borders, Clear, List, ListItem, Paragraph, ListState, Wrap}, layout::{Layout, Constraint, Direction, Rect}, style::{Style, Modifier, Color}};
use tracing_subscriber::EnvFilter;

use todoboard::{application::todo_service::{AttachmentCleanup, TodoOrchestrator, TodoService}, config::{self, AppConfig}, domain::todo::{NewAttachment, TodoDraft, TodoEdit, TodoView}};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;
    // The terminal is ours; logs go to a file.
    let log = File::create("tui.log")?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_ansi(false)
        .with_writer(Mutex::new(log))
        .init();

    let wiring = config::wire(&config, true).await?;
    let service = wiring.service;
    let greeting = match service.current_user().await {
        Some(user) => format!("Welcome, {} !!", user.display_name()),
        None => "Welcome".to_string(),
    };

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, service, greeting, config.describe_backend()).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    res
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode { View, Create, Edit, Search, Preview }

#[derive(Clone, Copy, PartialEq, Eq)]
enum ActiveField { Title, Description, Image }

impl ActiveField {
    fn next(self) -> Self { match self { ActiveField::Title => ActiveField::Description, ActiveField::Description => ActiveField::Image, ActiveField::Image => ActiveField::Title } }
    fn label(self) -> &'static str { match self { ActiveField::Title => "Title", ActiveField::Description => "Desc", ActiveField::Image => "Image path" } }
}

struct App {
    service: TodoOrchestrator,
    visible: Vec<TodoView>,
    selected: usize,
    last_tick: Instant,
    mode: Mode,
    list_state: ListState,
    field: ActiveField,
    draft_title: String,
    draft_desc: String,
    draft_image: String,
    search: String,
    editing: Option<TodoEdit>,
    status: String,
}

impl App {
    async fn load(&mut self) {
        if let Err(e) = self.service.refresh().await {
            self.status = format!("Error fetching todos: {e}");
        }
        self.recompute_visible().await;
    }

    async fn recompute_visible(&mut self) {
        self.visible = self.service.visible().await;
        // Clamp selection within filtered bounds
        let len = self.visible.len();
        if len == 0 { self.selected = 0; self.list_state.select(None); }
        else { if self.selected >= len { self.selected = len - 1; } self.list_state.select(Some(self.selected)); }
    }

    fn current(&self) -> Option<&TodoView> { self.visible.get(self.selected) }

    fn active_buffer(&mut self) -> &mut String {
        match self.field { ActiveField::Title => &mut self.draft_title, ActiveField::Description => &mut self.draft_desc, ActiveField::Image => &mut self.draft_image }
    }

    fn clear_drafts(&mut self) {
        self.draft_title.clear();
        self.draft_desc.clear();
        self.draft_image.clear();
        self.field = ActiveField::Title;
    }

    /// Reads the image named in the draft, if any.
    async fn draft_attachment(&self) -> Result<Option<NewAttachment>, String> {
        let path = self.draft_image.trim();
        if path.is_empty() { return Ok(None); }
        let bytes = tokio::fs::read(path).await.map_err(|e| format!("cannot read {path}: {e}"))?;
        let file_name = std::path::Path::new(path).file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| path.to_string());
        Ok(Some(NewAttachment { file_name, bytes }))
    }

    async fn submit_create(&mut self) -> bool {
        let file = match self.draft_attachment().await { Ok(f) => f, Err(e) => { self.status = e; return false; } };
        let draft = TodoDraft { name: self.draft_title.clone(), description: self.draft_desc.clone(), file };
        match self.service.create(draft).await {
            Ok(todo) => { self.status = format!("Added '{}'", todo.name); true }
            Err(e) => { self.status = format!("Error adding todo: {e}"); false }
        }
    }

    async fn submit_edit(&mut self) -> bool {
        let Some(mut edit) = self.editing.clone() else { return true };
        edit.new_file = match self.draft_attachment().await { Ok(f) => f, Err(e) => { self.status = e; return false; } };
        edit.name = self.draft_title.clone();
        edit.description = self.draft_desc.clone();
        match self.service.update(edit).await {
            Ok(outcome) => {
                self.status = match outcome.stale_attachment { Some(key) => format!("Updated; old image {key} could not be removed"), None => "Updated".to_string() };
                true
            }
            Err(e) => { self.status = format!("Error updating todo: {e}"); false }
        }
    }
}

async fn run_app(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, service: TodoOrchestrator, greeting: String, backend: String) -> Result<()> {
    let tick_rate = Duration::from_millis(200);
    let mut app = App { service, visible: vec![], selected: 0, last_tick: Instant::now(), mode: Mode::View, list_state: ListState::default(), field: ActiveField::Title, draft_title: String::new(), draft_desc: String::new(), draft_image: String::new(), search: String::new(), editing: None, status: String::new() };
    app.load().await;

    loop {
        let filter = app.service.snapshot().await.filter_type;
        terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(3),
                    Constraint::Min(1),
                    Constraint::Length(3),
                ])
                .split(f.size());

            let header = Paragraph::new("Enter: done/undone, n: new, e: edit, d: delete, /: search, f: filter, i: image, r: reload, q: quit")
                .block(Block::default().borders(Borders::ALL).title(greeting.as_str()));
            f.render_widget(header, chunks[0]);

            let middle = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(chunks[1]);

            let list_items: Vec<ListItem> = app.visible.iter().map(|v| {
                let mark = if v.todo.done { "[x]" } else { "[ ]" };
                let clip = if v.todo.file.is_some() { " +img" } else { "" };
                ListItem::new(format!("{} {}{}", mark, v.todo.name, clip))
            }).collect();
            let list = List::new(list_items)
                .block(Block::default().borders(Borders::ALL).title(format!("todos [{}] search=\"{}\"", filter.as_str(), app.search)))
                .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD | Modifier::REVERSED))
                .highlight_symbol(">> ");
            f.render_stateful_widget(list, middle[0], &mut app.list_state);

            // Details pane for selected item
            let detail = match app.current() {
                Some(v) => {
                    let done = match v.completion_label() { Some(at) => format!("Task completed at {at}"), None => "Pending".to_string() };
                    let image = if v.file_url.is_some() { "attached (i to preview)" } else { "No Image Found..." };
                    format!("Title:\n{}\n\nStatus: {}\n\nDescription:\n{}\n\nImage: {}", v.todo.name, done, v.todo.description, image)
                }
                None => String::new(),
            };
            let details = Paragraph::new(detail)
                .wrap(Wrap { trim: false })
                .block(Block::default().borders(Borders::ALL).title("details"));
            f.render_widget(details, middle[1]);

            let footer_text = match app.mode {
                Mode::View | Mode::Preview => format!("{}  |  backend={}", app.status, backend),
                Mode::Search => format!("Search: {}_  |  (Enter to apply, Esc to clear)", app.search),
                Mode::Create | Mode::Edit => {
                    let value = match app.field { ActiveField::Title => &app.draft_title, ActiveField::Description => &app.draft_desc, ActiveField::Image => &app.draft_image };
                    format!("{} - {}: {}_  |  (Tab to switch, Enter to save, Esc to cancel)", if app.mode == Mode::Create { "Add New Todo" } else { "Edit Todo" }, app.field.label(), value)
                }
            };
            let footer = Paragraph::new(footer_text)
                .block(Block::default().borders(Borders::ALL).title(match app.mode { Mode::View => "info", Mode::Create => "create", Mode::Edit => "edit", Mode::Search => "search", Mode::Preview => "preview" }));
            f.render_widget(footer, chunks[2]);

            if app.mode == Mode::Preview {
                let url = app.current().and_then(|v| v.file_url.clone()).unwrap_or_default();
                let area = centered(f.size(), 80, 30);
                f.render_widget(Clear, area);
                f.render_widget(Paragraph::new(url).wrap(Wrap { trim: false }).block(Block::default().borders(Borders::ALL).title("image link (Esc to close)")), area);
            }
        })?;

        let timeout = tick_rate.saturating_sub(app.last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                // Only act on key presses; ignore repeats and releases to prevent duplicate input
                if key.kind != KeyEventKind::Press { continue; }
                match app.mode {
                    Mode::View => match key.code {
                        KeyCode::Char('q') => break,
                        KeyCode::Up => { if app.selected > 0 { app.selected -= 1; } }
                        KeyCode::Down => { if app.selected + 1 < app.visible.len() { app.selected += 1; } }
                        KeyCode::Enter => {
                            if let Some(v) = app.current().cloned() {
                                match app.service.toggle_done(&v.todo).await {
                                    Ok(outcome) => app.status = format!("'{}' marked {}", outcome.todo.name, if outcome.todo.done { "done" } else { "not done" }),
                                    Err(e) => app.status = format!("Error toggling todo: {e}"),
                                }
                                app.recompute_visible().await;
                            }
                        }
                        KeyCode::Char('n') => {
                            app.mode = Mode::Create;
                            app.clear_drafts();
                        }
                        KeyCode::Char('e') => {
                            if let Some(id) = app.current().map(|v| v.todo.id.clone()) {
                                match app.service.begin_edit(&id).await {
                                    Ok(edit) => {
                                        app.clear_drafts();
                                        app.draft_title = edit.name.clone();
                                        app.draft_desc = edit.description.clone();
                                        app.editing = Some(edit);
                                        app.mode = Mode::Edit;
                                    }
                                    Err(e) => app.status = e.to_string(),
                                }
                            }
                        }
                        KeyCode::Char('d') => {
                            if let Some(id) = app.current().map(|v| v.todo.id.clone()) {
                                match app.service.delete(&id).await {
                                    Ok(outcome) => {
                                        app.status = match outcome.attachment { AttachmentCleanup::Failed(key) => format!("Deleted; image {key} could not be removed"), _ => "Deleted".to_string() };
                                        if app.selected > 0 { app.selected -= 1; }
                                    }
                                    Err(e) => app.status = format!("Error deleting todo: {e}"),
                                }
                                app.recompute_visible().await;
                            }
                        }
                        KeyCode::Char('f') => {
                            app.service.set_filter(filter.next()).await;
                            app.recompute_visible().await;
                        }
                        KeyCode::Char('/') => { app.mode = Mode::Search; }
                        KeyCode::Char('i') => { if app.current().is_some_and(|v| v.file_url.is_some()) { app.mode = Mode::Preview; } }
                        KeyCode::Char('r') => { app.load().await; }
                        _ => {}
                    },
                    Mode::Preview => { if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')) { app.mode = Mode::View; } }
                    Mode::Search => match key.code {
                        KeyCode::Esc => { app.search.clear(); app.service.set_search(String::new()).await; app.mode = Mode::View; app.recompute_visible().await; }
                        KeyCode::Enter => { app.mode = Mode::View; }
                        KeyCode::Backspace => { app.search.pop(); app.service.set_search(app.search.clone()).await; app.recompute_visible().await; }
                        KeyCode::Char(c) => { app.search.push(c); app.service.set_search(app.search.clone()).await; app.recompute_visible().await; }
                        _ => {}
                    },
                    Mode::Create | Mode::Edit => match key.code {
                        KeyCode::Esc => {
                            if app.mode == Mode::Edit { app.service.cancel_edit().await; app.editing = None; }
                            app.mode = Mode::View;
                            app.clear_drafts();
                        }
                        KeyCode::Enter => {
                            let saved = if app.mode == Mode::Create { app.submit_create().await } else { app.submit_edit().await };
                            // Validation failures keep the form open
                            if saved {
                                app.mode = Mode::View;
                                app.editing = None;
                                app.clear_drafts();
                            }
                            app.recompute_visible().await;
                        }
                        KeyCode::Backspace => { app.active_buffer().pop(); }
                        KeyCode::Char(c) => app.active_buffer().push(c),
                        KeyCode::Tab => { app.field = app.field.next(); }
                        _ => {}
                    },
                }
            }
        }
        if app.last_tick.elapsed() >= tick_rate {
            app.last_tick = Instant::now();
        }
    }
    Ok(())
}

fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage((100 - percent_y) / 2), Constraint::Percentage(percent_y), Constraint::Percentage((100 - percent_y) / 2)])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage((100 - percent_x) / 2), Constraint::Percentage(percent_x), Constraint::Percentage((100 - percent_x) / 2)])
        .split(vertical[1])[1]
}

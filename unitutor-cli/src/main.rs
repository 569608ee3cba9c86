mod catalog;
mod client;
mod config;
mod favorites;
mod history;
mod state;
mod stream;

use anyhow::Result;
use client::{GatewayClient, TurnEvent};
use config::Config;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use favorites::FavoritesStore;
use history::ConversationStore;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use state::{SelectionState, StateStore};
use std::io;
use tokio::sync::mpsc;
use tracing::{error, info};
use unitutor_shared::{ChatMessage, Conversation, MessageRole, TutorChatRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Level,
    Faculty,
    Course,
    Chat,
}

struct App {
    screen: Screen,
    cursor: usize,
    scroll_offset: usize,
    selection: SelectionState,
    messages: Vec<ChatMessage>,
    input: String,
    streaming_message: Option<String>,
    in_flight: bool,
    conversation: Option<Conversation>,
    history: ConversationStore,
    favorites: FavoritesStore,
    state_store: StateStore,
}

impl App {
    fn new(history: ConversationStore, favorites: FavoritesStore, state_store: StateStore) -> Self {
        let selection = state_store.load();
        let mut app = Self {
            screen: Screen::Level,
            cursor: 0,
            scroll_offset: 0,
            selection,
            messages: vec![],
            input: String::new(),
            streaming_message: None,
            in_flight: false,
            conversation: None,
            history,
            favorites,
            state_store,
        };
        // Resume a previously completed selection directly in chat.
        if app.selection.is_complete() {
            app.enter_chat();
        }
        app
    }

    fn turn_in_flight(&self) -> bool {
        self.in_flight
    }

    fn list_len(&self) -> usize {
        match self.screen {
            Screen::Level => catalog::ProgramLevel::ALL.len(),
            Screen::Faculty => self
                .selection
                .level
                .map(|l| catalog::faculties_by_level(l).len())
                .unwrap_or(0),
            Screen::Course => self.course_list().len(),
            Screen::Chat => 0,
        }
    }

    fn course_list(&self) -> Vec<&'static catalog::Course> {
        match (self.selection.faculty_id.as_deref(), self.selection.level) {
            (Some(faculty), Some(level)) => catalog::courses_by_faculty_and_level(faculty, level),
            _ => Vec::new(),
        }
    }

    fn move_cursor_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    fn move_cursor_down(&mut self) {
        let len = self.list_len();
        if len > 0 && self.cursor < len - 1 {
            self.cursor += 1;
        }
    }

    fn save_selection(&self) {
        if let Err(err) = self.state_store.save(&self.selection) {
            error!("failed to save selection state: {}", err);
        }
    }

    fn select_current(&mut self) {
        match self.screen {
            Screen::Level => {
                self.selection.level = Some(catalog::ProgramLevel::ALL[self.cursor]);
                self.selection.faculty_id = None;
                self.selection.course_id = None;
                self.save_selection();
                self.screen = Screen::Faculty;
                self.cursor = 0;
            }
            Screen::Faculty => {
                let Some(level) = self.selection.level else {
                    return;
                };
                let faculties = catalog::faculties_by_level(level);
                if let Some(faculty) = faculties.get(self.cursor) {
                    self.selection.faculty_id = Some(faculty.id.to_string());
                    self.save_selection();
                    self.screen = Screen::Course;
                    self.cursor = 0;
                }
            }
            Screen::Course => {
                if let Some(course) = self.course_list().get(self.cursor) {
                    self.selection.course_id = Some(course.id.to_string());
                    self.save_selection();
                    self.enter_chat();
                }
            }
            Screen::Chat => {}
        }
    }

    fn go_back(&mut self) {
        match self.screen {
            Screen::Level => {}
            Screen::Faculty => {
                // Backing out to the level screen forgets the whole selection.
                self.selection = SelectionState::default();
                if let Err(err) = self.state_store.clear() {
                    error!("failed to clear selection state: {}", err);
                }
                self.screen = Screen::Level;
                self.cursor = 0;
            }
            Screen::Course => {
                self.selection.faculty_id = None;
                self.selection.course_id = None;
                self.save_selection();
                self.screen = Screen::Faculty;
                self.cursor = 0;
            }
            Screen::Chat => {
                // Abandoning the chat drops any in-flight stream.
                self.in_flight = false;
                self.streaming_message = None;
                self.conversation = None;
                self.messages.clear();
                self.selection.course_id = None;
                self.save_selection();
                self.screen = Screen::Course;
                self.cursor = 0;
            }
        }
    }

    fn toggle_favorite(&mut self) {
        if self.screen != Screen::Course {
            return;
        }
        let Some(course) = self.course_list().get(self.cursor).copied() else {
            return;
        };
        let result = if self.favorites.is_favorite(course.id) {
            self.favorites.remove(course.id)
        } else {
            self.favorites.add(course.id)
        };
        if let Err(err) = result {
            error!("failed to update favorites: {}", err);
        }
    }

    fn enter_chat(&mut self) {
        self.screen = Screen::Chat;
        self.scroll_offset = 0;
        self.messages.clear();
        self.conversation = None;

        let Some(course_id) = self.selection.course_id.clone() else {
            return;
        };

        // Resume the most recent conversation for this course, if any.
        match self.history.list_conversations(&course_id) {
            Ok(conversations) => {
                if let Some(conversation) = conversations.into_iter().next() {
                    match self.history.load_messages(&conversation.id) {
                        Ok(stored) => {
                            self.messages = stored
                                .into_iter()
                                .map(|m| ChatMessage {
                                    role: m.role,
                                    content: m.content,
                                })
                                .collect();
                        }
                        Err(err) => error!("failed to load messages: {}", err),
                    }
                    self.conversation = Some(conversation);
                }
            }
            Err(err) => error!("failed to list conversations: {}", err),
        }

        if self.messages.is_empty() {
            self.push_notice(self.welcome_text());
        }
    }

    fn welcome_text(&self) -> String {
        let course = self
            .selection
            .course_id
            .as_deref()
            .and_then(catalog::get_course_by_id);
        match course {
            Some(course) => format!(
                "Welcome! I'm your AI tutor for {}. Ask me anything about your {} programme.",
                course.short_name,
                course.level.as_str()
            ),
            None => "Welcome! Pick a course to start chatting.".to_string(),
        }
    }

    fn push_notice(&mut self, content: String) {
        self.messages.push(ChatMessage {
            role: MessageRole::System,
            content,
        });
    }

    fn start_new_conversation(&mut self) {
        if self.turn_in_flight() {
            return;
        }
        self.conversation = None;
        self.messages.clear();
        self.push_notice(self.welcome_text());
    }

    fn delete_current_conversation(&mut self) {
        if self.turn_in_flight() {
            return;
        }
        if let Some(conversation) = self.conversation.take() {
            if let Err(err) = self.history.delete_conversation(&conversation.id) {
                error!("failed to delete conversation: {}", err);
            }
        }
        self.messages.clear();
        self.push_notice(self.welcome_text());
    }

    /// Start one chat turn. Returns the event receiver when a request was
    /// actually sent; turns are serialized by the in-flight flag.
    fn submit_input(
        &mut self,
        client: &GatewayClient,
    ) -> Option<mpsc::UnboundedReceiver<TurnEvent>> {
        let content = self.input.trim().to_string();
        if content.is_empty() || self.turn_in_flight() {
            return None;
        }
        if !client.is_authenticated() {
            self.push_notice("Sign in required: set UNITUTOR_TOKEN to chat.".to_string());
            return None;
        }

        let Some(course) = self
            .selection
            .course_id
            .as_deref()
            .and_then(catalog::get_course_by_id)
        else {
            self.push_notice("No course selected.".to_string());
            return None;
        };
        let Some(faculty) = catalog::get_faculty_by_id(course.faculty) else {
            self.push_notice("Unknown faculty for selected course.".to_string());
            return None;
        };

        self.input.clear();

        if self.conversation.is_none() {
            let title: String = content.chars().take(60).collect();
            match self.history.create_conversation(course.id, Some(&title)) {
                Ok(conversation) => self.conversation = Some(conversation),
                // Chat still works without persistence; the transcript on
                // screen stays the source of truth.
                Err(err) => error!("failed to create conversation: {}", err),
            }
        }

        if let Some(conversation) = &self.conversation {
            if let Err(err) =
                self.history
                    .save_message(&conversation.id, MessageRole::User, &content)
            {
                error!("failed to save user message: {}", err);
            }
        }

        self.messages.push(ChatMessage {
            role: MessageRole::User,
            content,
        });
        self.scroll_offset = 0;

        let request = TutorChatRequest {
            messages: self
                .messages
                .iter()
                .filter(|m| m.role != MessageRole::System)
                .cloned()
                .collect(),
            course_id: course.id.to_string(),
            course_name: course.name.to_string(),
            course_level: course.level.as_str().to_string(),
            faculty_name: faculty.name.to_string(),
            course_description: course.description.to_string(),
        };

        self.in_flight = true;
        self.streaming_message = Some(String::new());
        Some(client.send_turn(request))
    }

    fn apply_turn_event(&mut self, event: TurnEvent) {
        match event {
            TurnEvent::Delta(content) => {
                // The client reports full accumulated content; replace.
                self.streaming_message = Some(content);
                self.scroll_offset = 0;
            }
            TurnEvent::Completed(content) => {
                self.in_flight = false;
                self.streaming_message = None;
                if !content.is_empty() {
                    if let Some(conversation) = &self.conversation {
                        if let Err(err) = self.history.save_message(
                            &conversation.id,
                            MessageRole::Assistant,
                            &content,
                        ) {
                            error!("failed to save assistant message: {}", err);
                        }
                    }
                    self.messages.push(ChatMessage {
                        role: MessageRole::Assistant,
                        content,
                    });
                }
                self.scroll_offset = 0;
            }
            TurnEvent::RateLimited => {
                self.finish_failed_turn("Rate limited. Please try again in a moment.".to_string());
            }
            TurnEvent::QuotaExceeded => {
                self.finish_failed_turn("Usage quota exceeded.".to_string());
            }
            TurnEvent::Failed(reason) => {
                self.finish_failed_turn(format!("Request failed: {}", reason));
            }
        }
    }

    /// Partial streamed text stays on screen; it is what the user saw.
    fn finish_failed_turn(&mut self, notice: String) {
        self.in_flight = false;
        if let Some(partial) = self.streaming_message.take() {
            if !partial.is_empty() {
                self.messages.push(ChatMessage {
                    role: MessageRole::Assistant,
                    content: partial,
                });
            }
        }
        self.push_notice(notice);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Log to a file so tracing output does not corrupt the TUI.
    let log_file = std::fs::File::create("unitutor-cli.log").ok();
    if let Some(file) = log_file {
        tracing_subscriber::fmt()
            .with_writer(file)
            .with_ansi(false)
            .init();
    }

    let config = Config::from_env();
    let client = GatewayClient::new(config.chat_url(), config.access_token.clone());
    let history = ConversationStore::new(&config.data_dir)?;
    let favorites = FavoritesStore::new(&config.data_dir)?;
    let state_store = StateStore::new(&config.data_dir)?;
    info!("using data dir {:?}", config.data_dir);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(history, favorites, state_store);

    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        while let Ok(event) = event::read() {
            if ui_tx.send(event).is_err() {
                break;
            }
        }
    });

    let res = run_app(&mut terminal, &mut app, client, &mut ui_rx).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    client: GatewayClient,
    ui_rx: &mut mpsc::UnboundedReceiver<Event>,
) -> Result<()> {
    let mut turn_rx: Option<mpsc::UnboundedReceiver<TurnEvent>> = None;

    loop {
        if !app.turn_in_flight() {
            turn_rx = None;
        }

        terminal.draw(|f| ui(f, app))?;

        let turn_event = async {
            match turn_rx.as_mut() {
                Some(rx) => rx.recv().await,
                None => std::future::pending().await,
            }
        };

        // A turn started inside the select! body is picked up afterwards;
        // the event future holds the borrow on the current receiver.
        let mut started_turn: Option<mpsc::UnboundedReceiver<TurnEvent>> = None;

        tokio::select! {
            Some(event) = ui_rx.recv() => {
                match event {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        match key.code {
                            KeyCode::Char('q') | KeyCode::Char('c')
                                if key.modifiers.contains(event::KeyModifiers::CONTROL) =>
                            {
                                return Ok(())
                            }
                            KeyCode::Char('n')
                                if key.modifiers.contains(event::KeyModifiers::CONTROL)
                                    && app.screen == Screen::Chat =>
                            {
                                app.start_new_conversation();
                            }
                            KeyCode::Char('d')
                                if key.modifiers.contains(event::KeyModifiers::CONTROL)
                                    && app.screen == Screen::Chat =>
                            {
                                app.delete_current_conversation();
                            }
                            KeyCode::Char('f') if app.screen == Screen::Course => {
                                app.toggle_favorite();
                            }
                            KeyCode::Char(c) if app.screen == Screen::Chat => {
                                app.input.push(c);
                            }
                            KeyCode::Backspace if app.screen == Screen::Chat => {
                                app.input.pop();
                            }
                            KeyCode::Enter => {
                                if app.screen == Screen::Chat {
                                    started_turn = app.submit_input(&client);
                                } else {
                                    app.select_current();
                                }
                            }
                            KeyCode::Esc => {
                                app.go_back();
                            }
                            KeyCode::Up => {
                                if app.screen == Screen::Chat {
                                    app.scroll_offset = app.scroll_offset.saturating_add(1);
                                } else {
                                    app.move_cursor_up();
                                }
                            }
                            KeyCode::Down => {
                                if app.screen == Screen::Chat {
                                    app.scroll_offset = app.scroll_offset.saturating_sub(1);
                                } else {
                                    app.move_cursor_down();
                                }
                            }
                            _ => {}
                        }
                    }
                    Event::Mouse(mouse) => match mouse.kind {
                        event::MouseEventKind::ScrollUp if app.screen == Screen::Chat => {
                            app.scroll_offset = app.scroll_offset.saturating_add(3);
                        }
                        event::MouseEventKind::ScrollDown if app.screen == Screen::Chat => {
                            app.scroll_offset = app.scroll_offset.saturating_sub(3);
                        }
                        _ => {}
                    },
                    _ => {}
                }
            }
            event = turn_event => {
                match event {
                    Some(event) => app.apply_turn_event(event),
                    None => {
                        // Channel closed without a terminal event.
                        app.in_flight = false;
                        app.streaming_message = None;
                    }
                }
            }
        }

        if let Some(rx) = started_turn {
            turn_rx = Some(rx);
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    match app.screen {
        Screen::Level => render_selection(
            f,
            "Choose your academic level (Enter to select, Ctrl-Q to quit)",
            catalog::ProgramLevel::ALL
                .iter()
                .map(|l| format!("{} ({} courses)", l.label(), catalog::courses_by_level(*l).len()))
                .collect(),
            app.cursor,
        ),
        Screen::Faculty => {
            let faculties = app
                .selection
                .level
                .map(catalog::faculties_by_level)
                .unwrap_or_default();
            render_selection(
                f,
                "Choose a faculty (Enter to select, Esc to go back)",
                faculties
                    .iter()
                    .map(|fac| format!("{} — {}", fac.short_name, fac.description))
                    .collect(),
                app.cursor,
            );
        }
        Screen::Course => {
            let favorites = app.favorites.list().unwrap_or_default();
            let items = app
                .course_list()
                .iter()
                .map(|course| {
                    let marker = if favorites.iter().any(|id| id == course.id) {
                        "★ "
                    } else {
                        "  "
                    };
                    format!("{}{} ({})", marker, course.short_name, course.duration)
                })
                .collect();
            render_selection(
                f,
                "Choose a course (Enter to chat, f to favorite, Esc to go back)",
                items,
                app.cursor,
            );
        }
        Screen::Chat => render_chat(f, app),
    }
}

fn render_selection(f: &mut Frame, title: &str, items: Vec<String>, cursor: usize) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(3)])
        .split(f.area());

    let header = Paragraph::new(title).style(Style::default().fg(Color::Cyan));
    f.render_widget(header, chunks[0]);

    let items: Vec<ListItem> = items.into_iter().map(ListItem::new).collect();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(Some(cursor));
    f.render_stateful_widget(list, chunks[1], &mut state);
}

fn render_chat(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(f.area());

    let course = app
        .selection
        .course_id
        .as_deref()
        .and_then(catalog::get_course_by_id);
    let status_text = match course {
        Some(course) => {
            let faculty = catalog::get_faculty_by_id(course.faculty)
                .map(|fac| fac.short_name)
                .unwrap_or("Unknown");
            if app.turn_in_flight() {
                format!("{} AI ● {} ● responding…", course.short_name, faculty)
            } else {
                format!("{} AI ● {}", course.short_name, faculty)
            }
        }
        None => "No course selected".to_string(),
    };
    let status = Paragraph::new(status_text).style(Style::default().fg(Color::Green));
    f.render_widget(status, chunks[0]);

    render_messages(f, app, chunks[1]);

    let input = Paragraph::new(app.input.as_str())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Input (Enter to send, Ctrl-N new chat, Esc to go back)"),
        )
        .wrap(Wrap { trim: true });
    f.render_widget(input, chunks[2]);
}

fn render_messages(f: &mut Frame, app: &App, area: Rect) {
    let mut all_messages = app.messages.clone();
    if let Some(ref streaming) = app.streaming_message {
        all_messages.push(ChatMessage {
            role: MessageRole::Assistant,
            content: if streaming.is_empty() {
                "●●●".to_string()
            } else {
                format!("{}▌", streaming)
            },
        });
    }

    let mut all_lines: Vec<Line> = Vec::new();
    for msg in &all_messages {
        let style = match msg.role {
            MessageRole::System => Style::default().fg(Color::Yellow),
            MessageRole::User => Style::default().fg(Color::Cyan),
            MessageRole::Assistant => Style::default().fg(Color::Green),
        };
        let prefix = match msg.role {
            MessageRole::System => "Notice",
            MessageRole::User => "You",
            MessageRole::Assistant => "Tutor",
        };

        all_lines.push(Line::from(Span::styled(
            format!("{}:", prefix),
            style.add_modifier(Modifier::BOLD),
        )));
        for line in msg.content.lines() {
            all_lines.push(Line::from(Span::styled(line.to_string(), style)));
        }
        all_lines.push(Line::from(""));
    }

    let total_lines = all_lines.len();
    let visible_height = area.height as usize;
    let start_line = if total_lines > visible_height {
        let max_scroll = total_lines.saturating_sub(visible_height);
        let actual_scroll = app.scroll_offset.min(max_scroll);
        max_scroll.saturating_sub(actual_scroll)
    } else {
        0
    };
    let end_line = (start_line + visible_height).min(total_lines);
    let visible_lines: Vec<Line> = all_lines[start_line..end_line].to_vec();

    let chat = Paragraph::new(visible_lines)
        .block(Block::default().borders(Borders::NONE))
        .wrap(Wrap { trim: false });
    f.render_widget(chat, area);
}

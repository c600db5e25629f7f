//! todo-tui - Terminal front end for todo-dispatch
//!
//! The widget core runs unchanged; this binary only turns keys into bus
//! events and draws the in-memory view:
//! - Input: crossterm key events -> UI actions -> widget calls / bus events
//! - Output: `MemoryView` nodes (items, toasts) and the event log, via ratatui
//!
//! Keys (normal mode): i = type a new todo, x = toggle done, e = rename,
//! K/J = move up/down, j/k = select, m = drag / drop, d = remove,
//! C = clear all, c = remove checked, q = quit.
//! Insert and rename mode: Enter = submit, Esc = back to normal mode.

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use todo_dispatch::prelude::*;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

// ============================================================================
// CLI - How the demo is configured
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "todo-tui", about = "Event-driven todo list in the terminal")]
struct Args {
    /// Collapse every transition to zero
    #[arg(long)]
    reduced_motion: bool,

    /// Transition length in milliseconds
    #[arg(long, default_value_t = 500)]
    transition_ms: u64,

    /// Toast display time in milliseconds
    #[arg(long, default_value_t = 1000)]
    toast_ms: u64,

    /// JSON config file; command-line flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write tracing output to this file (nothing is logged otherwise)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    fn widget_config(&self) -> io::Result<WidgetConfig> {
        let base = match &self.config {
            Some(path) => WidgetConfig::from_json(&std::fs::read_to_string(path)?)
                .map_err(io::Error::other)?,
            None => WidgetConfig::default(),
        };
        let config = base
            .with_transition(Duration::from_millis(self.transition_ms))
            .with_toast_display(Duration::from_millis(self.toast_ms));
        let config = if self.reduced_motion {
            config.with_reduced_motion(true)
        } else {
            config
        };
        config.from_env().map_err(io::Error::other)
    }
}

fn init_tracing(log_file: Option<&PathBuf>) -> io::Result<()> {
    // Writing to the terminal would corrupt the alternate screen
    let Some(path) = log_file else {
        return Ok(());
    };
    let file = File::create(path)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("todo_dispatch_core=debug,todo_tui=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(io::Error::other)
}

// ============================================================================
// Actions - What the user can do
// ============================================================================

#[derive(Action, Clone, Debug)]
#[action(rename_all = "kebab-case")]
enum UiAction {
    Input(char),
    Backspace,
    Submit,
    Cancel,
    StartInsert,
    StartRename,
    SelectNext,
    SelectPrev,
    ToggleDone,
    Remove,
    MoveUp,
    MoveDown,
    DragOrDrop,
    ClearAll,
    RemoveChecked,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Normal,
    Insert,
    Rename { key: String },
}

fn map_key(mode: &Mode, key: KeyEvent) -> Option<UiAction> {
    match mode {
        Mode::Insert | Mode::Rename { .. } => match key.code {
            KeyCode::Enter => Some(UiAction::Submit),
            KeyCode::Esc => Some(UiAction::Cancel),
            KeyCode::Backspace => Some(UiAction::Backspace),
            KeyCode::Char(c) => Some(UiAction::Input(c)),
            _ => None,
        },
        Mode::Normal => match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Some(UiAction::Quit),
            KeyCode::Char('i') | KeyCode::Char('a') => Some(UiAction::StartInsert),
            KeyCode::Char('e') => Some(UiAction::StartRename),
            KeyCode::Char('x') | KeyCode::Char(' ') => Some(UiAction::ToggleDone),
            KeyCode::Char('d') | KeyCode::Delete => Some(UiAction::Remove),
            KeyCode::Char('K') => Some(UiAction::MoveUp),
            KeyCode::Char('J') => Some(UiAction::MoveDown),
            KeyCode::Char('j') | KeyCode::Down => Some(UiAction::SelectNext),
            KeyCode::Char('k') | KeyCode::Up => Some(UiAction::SelectPrev),
            KeyCode::Char('m') => Some(UiAction::DragOrDrop),
            KeyCode::Char('C') => Some(UiAction::ClearAll),
            KeyCode::Char('c') => Some(UiAction::RemoveChecked),
            _ => None,
        },
    }
}

// ============================================================================
// App - Widget plus the bits of UI state the widget does not own
// ============================================================================

struct App {
    widget: TodoWidget,
    view: Arc<MemoryView>,
    log: EventLog,
    mode: Mode,
    input: String,
    selected: Option<String>,
}

impl App {
    fn new(config: WidgetConfig) -> Self {
        let view = Arc::new(MemoryView::new());
        let log = EventLog::new(EventLogConfig::new(
            200,
            EventLogFilter::new(None, Some("toast")),
        ));
        let mut middleware = ComposedMiddleware::<TodoEvent>::new();
        middleware.add(LoggingMiddleware::new()).add(log.clone());
        let bus = Arc::new(EventBus::with_middleware(middleware));
        let widget = TodoWidget::with_bus(bus, view.clone(), config);

        Self {
            widget,
            view,
            log,
            mode: Mode::Insert,
            input: String::new(),
            selected: None,
        }
    }

    /// Selected key, falling back to the first item
    fn selection(&self) -> Option<String> {
        let keys = self.widget.keys();
        self.selected
            .clone()
            .filter(|key| keys.contains(key))
            .or_else(|| keys.first().cloned())
    }

    fn select_offset(&mut self, offset: isize) {
        let keys = self.widget.keys();
        if keys.is_empty() {
            self.selected = None;
            return;
        }
        let current = self
            .selection()
            .and_then(|key| keys.iter().position(|k| *k == key))
            .unwrap_or(0);
        let next = current.saturating_add_signed(offset).min(keys.len() - 1);
        let next_key = keys[next].clone();

        if self.widget.drag().is_active() {
            if let Some(previous) = self.selection() {
                self.widget.drag_leave(&previous);
            }
            self.widget.drag_enter(&next_key);
        }
        self.selected = Some(next_key);
    }

    fn spawn_move(&self, direction: Direction) {
        let Some(key) = self.selection() else {
            return;
        };
        let engine = self.widget.reorder().clone();
        tokio::spawn(async move {
            let outcome = engine.swap(&key, direction).await;
            debug!(key = %key, ?outcome, "move finished");
        });
    }

    /// Apply an action. Returns false when the app should quit.
    fn handle(&mut self, action: UiAction) -> bool {
        debug!(action = action.name(), "ui action");
        match action {
            UiAction::Quit => return false,
            UiAction::Input(c) => self.input.push(c),
            UiAction::Backspace => {
                self.input.pop();
            }
            UiAction::Cancel => {
                self.input.clear();
                self.mode = Mode::Normal;
            }
            UiAction::Submit => self.submit(),
            UiAction::StartInsert => {
                self.input.clear();
                self.mode = Mode::Insert;
            }
            UiAction::StartRename => {
                if let Some(key) = self.selection() {
                    self.input = key.clone();
                    self.mode = Mode::Rename { key };
                }
            }
            UiAction::SelectNext => self.select_offset(1),
            UiAction::SelectPrev => self.select_offset(-1),
            UiAction::ToggleDone => {
                if let Some(key) = self.selection() {
                    if let Err(err) = self.widget.toggle_done(&key) {
                        debug!(key = %key, %err, "toggle failed");
                    }
                }
            }
            UiAction::Remove => {
                if let Some(key) = self.selection() {
                    self.widget.remove(&key);
                }
            }
            UiAction::MoveUp => self.spawn_move(Direction::Up),
            UiAction::MoveDown => self.spawn_move(Direction::Down),
            UiAction::DragOrDrop => {
                if let Some(key) = self.selection() {
                    if self.widget.drag().is_active() {
                        self.widget.drop_on(&key);
                    } else {
                        self.widget.drag_start(&key);
                    }
                }
            }
            UiAction::ClearAll => {
                self.widget.clear_all();
            }
            UiAction::RemoveChecked => {
                self.widget.remove_checked();
            }
        }
        true
    }

    fn submit(&mut self) {
        let text = std::mem::take(&mut self.input);
        match std::mem::replace(&mut self.mode, Mode::Normal) {
            Mode::Insert => {
                self.mode = Mode::Insert;
                let text = text.trim();
                if !text.is_empty() {
                    self.widget.publish(TodoEvent::AddTodo(text.to_string()));
                    self.selected = Some(text.to_string());
                }
            }
            Mode::Rename { key } => {
                let after = text.trim();
                if let Err(err) = self.widget.rename(&key, after) {
                    debug!(key = %key, %err, "rename failed");
                } else if !after.is_empty() {
                    self.selected = Some(after.to_string());
                }
            }
            Mode::Normal => {}
        }
    }
}

// ============================================================================
// Rendering - Draw the memory view
// ============================================================================

fn class_style(classes: VisualClass) -> Style {
    let mut style = Style::default();
    if classes.contains(VisualClass::INSERT) {
        style = style.fg(Color::Green);
    }
    if classes.contains(VisualClass::REMOVE) {
        style = style.fg(Color::Red).add_modifier(Modifier::DIM);
    }
    if classes.intersects(VisualClass::MOVE_UP | VisualClass::MOVE_DOWN) {
        style = style.fg(Color::Yellow);
    }
    if classes.contains(VisualClass::DRAG_TARGET) {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    style
}

fn glyph(classes: VisualClass) -> &'static str {
    if classes.contains(VisualClass::MOVE_UP) {
        "↑ "
    } else if classes.contains(VisualClass::MOVE_DOWN) {
        "↓ "
    } else {
        "  "
    }
}

fn item_lines(app: &App) -> Vec<ListItem<'static>> {
    let selected = app.selection();
    let dragging = app.widget.drag().dragging();
    let mut shown = Vec::new();
    let mut lines: Vec<ListItem> = app
        .widget
        .snapshot()
        .into_iter()
        .map(|item| {
            let node = app
                .widget
                .controller(&item.key)
                .and_then(|c| c.node())
                .and_then(|handle| app.view.node(handle));
            let classes = node.as_ref().map(|n| n.classes).unwrap_or_default();
            if let Some(n) = &node {
                shown.push(n.handle);
            }

            let mut style = class_style(classes);
            if item.done {
                style = style.add_modifier(Modifier::CROSSED_OUT);
            }
            if selected.as_deref() == Some(item.key.as_str()) {
                style = style.add_modifier(Modifier::REVERSED);
            }
            let check = if item.done { "[x] " } else { "[ ] " };
            let drag = if dragging.as_deref() == Some(item.key.as_str()) {
                " (dragging)"
            } else {
                ""
            };
            ListItem::new(Line::from(vec![
                Span::raw(glyph(classes)),
                Span::styled(format!("{check}{}{drag}", item.key), style),
            ]))
        })
        .collect();

    // Items still running their exit transition are no longer in the store
    for node in app.view.roots(NodeKind::TodoItem) {
        if !shown.contains(&node.handle) {
            let text = node.attribute("text").unwrap_or_default().to_string();
            lines.push(ListItem::new(Line::from(Span::styled(
                format!("    {text}"),
                class_style(node.classes),
            ))));
        }
    }
    lines
}

fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let [main, input_area, help_area] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);
    let [list_area, side] =
        Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(main);
    let [toast_area, log_area] =
        Layout::vertical([Constraint::Percentage(40), Constraint::Percentage(60)]).areas(side);

    let list = List::new(item_lines(app)).block(
        Block::default()
            .title(format!(" Todos ({}) ", app.widget.keys().len()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(list, list_area);

    let toasts: Vec<ListItem> = app
        .view
        .roots(NodeKind::Toast)
        .into_iter()
        .rev()
        .map(|toast| {
            let text = toast.attribute("text").unwrap_or_default().to_string();
            ListItem::new(Span::styled(text, class_style(toast.classes)))
        })
        .collect();
    frame.render_widget(
        List::new(toasts).block(Block::default().title(" Toasts ").borders(Borders::ALL)),
        toast_area,
    );

    let height = log_area.height.saturating_sub(2) as usize;
    let log: Vec<ListItem> = app
        .log
        .recent(height)
        .into_iter()
        .map(|entry| {
            let style = if entry.failures > 0 {
                Style::default().fg(Color::Red)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            ListItem::new(Span::styled(
                format!("{:>6} {}", entry.elapsed_display(), entry.summary),
                style,
            ))
        })
        .collect();
    frame.render_widget(
        List::new(log).block(Block::default().title(" Events ").borders(Borders::ALL)),
        log_area,
    );

    let (title, color) = match &app.mode {
        Mode::Insert => (" New todo (Enter adds, Esc for commands) ".to_string(), Color::Green),
        Mode::Rename { key } => (format!(" Rename {key} (empty removes) "), Color::Yellow),
        Mode::Normal => (" Press i to type ".to_string(), Color::DarkGray),
    };
    let input = Paragraph::new(app.input.as_str()).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color)),
    );
    frame.render_widget(input, input_area);

    let help = Paragraph::new(
        "i: type  x: done  e: rename  K/J: move  j/k: select  m: drag/drop  d: remove  C: clear  c: clear done  q: quit",
    )
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, help_area);
}

// ============================================================================
// Input - Poll crossterm on a task and forward key presses
// ============================================================================

fn spawn_key_poller(
    tx: mpsc::UnboundedSender<KeyEvent>,
    poll_timeout: Duration,
    loop_sleep: Duration,
    cancel_token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        const MAX_EVENTS_PER_BATCH: usize = 20;

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    // Drain what is left so it does not leak into the shell
                    while event::poll(Duration::ZERO).unwrap_or(false) {
                        let _ = event::read();
                    }
                    break;
                }
                _ = tokio::time::sleep(loop_sleep) => {
                    let mut events_processed = 0;
                    while events_processed < MAX_EVENTS_PER_BATCH
                        && event::poll(poll_timeout).unwrap_or(false)
                    {
                        events_processed += 1;
                        if let Ok(event::Event::Key(key)) = event::read() {
                            if key.kind != KeyEventKind::Press {
                                continue;
                            }
                            if tx.send(key).is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        }
    })
}

// ============================================================================
// Main - Setup terminal, run event loop, cleanup
// ============================================================================

#[tokio::main]
async fn main() -> io::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_file.as_ref())?;
    let config = args.widget_config()?;
    info!(?config, "starting todo-tui");

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, config).await;

    // Cleanup
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    config: WidgetConfig,
) -> io::Result<()> {
    let mut app = App::new(config);

    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<UiAction>();
    let (key_tx, mut key_rx) = mpsc::unbounded_channel::<KeyEvent>();
    let cancel_token = CancellationToken::new();
    let _poller = spawn_key_poller(
        key_tx,
        Duration::from_millis(10),
        Duration::from_millis(16),
        cancel_token.clone(),
    );

    // Transitions change the view on their own, so redraw on a timer too
    let mut frame_tick = tokio::time::interval(Duration::from_millis(50));

    loop {
        terminal.draw(|frame| render(frame, &app))?;

        tokio::select! {
            Some(key) = key_rx.recv() => {
                if let Some(action) = map_key(&app.mode, key) {
                    let _ = action_tx.send(action);
                }
            }
            Some(action) = action_rx.recv() => {
                if !app.handle(action) {
                    break;
                }
            }
            _ = frame_tick.tick() => {}
        }
    }

    cancel_token.cancel();
    app.widget.shutdown();
    info!("todo-tui stopped");
    Ok(())
}

use std::collections::VecDeque;
use std::io;
use std::time::{Duration, Instant};
use std::{
    fmt,
    sync::{Arc, Mutex},
    thread,
};

use chrono::Local;
use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::app::{
    ObjectState, ProgressEvent, ProgressSink, ProgressSinkKind, ProvisionReport, StatusResult,
};
use crate::error::HipsError;

const EVENTS_MAX: usize = 8;
const LOGS_MAX: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Operational,
    Logs,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Verify,
    Resolve,
    Prepare,
    Fetch,
    Store,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Phase::Verify => "Verify",
            Phase::Resolve => "Resolve",
            Phase::Prepare => "Prepare",
            Phase::Fetch => "Fetch",
            Phase::Store => "Store",
        }
    }
}

#[derive(Debug)]
struct AppState {
    status: String,
    phase: Phase,
    current: Option<String>,
    tiles_done: u64,
    tiles_total: u64,
    objects_total: usize,
    objects_completed: usize,
    objects_failed: usize,
    tile_failures: u64,
    last_object_secs: Option<f64>,
    events: VecDeque<String>,
    logs: VecDeque<String>,
    view: View,
    started: Instant,
    active: bool,
    finished: bool,
}

pub struct Tui {
    kind: ProgressSinkKind,
    state: Arc<Mutex<AppState>>,
    log_scroll: u16,
}

struct TuiProgress {
    state: Arc<Mutex<AppState>>,
}

impl ProgressSink for TuiProgress {
    fn event(&self, event: ProgressEvent) {
        if let Ok(mut state) = self.state.lock() {
            let message = event.message.trim().to_string();
            if let Some((phase, payload)) = parse_phase(&message) {
                state.phase = phase;
                state.status = payload.to_string();
                apply_payload(&mut state, phase, payload);
            } else {
                state.status = message.clone();
            }
            if let Some(elapsed) = event.elapsed {
                state.last_object_secs = Some(elapsed.as_secs_f64());
            }

            push_event(&mut state.events, message.clone());
            push_log(&mut state.logs, format!("[{}] {message}", timestamp()));
        }
    }
}

impl Tui {
    pub fn new(kind: ProgressSinkKind) -> Self {
        Self {
            kind,
            state: Arc::new(Mutex::new(AppState {
                status: "ready".to_string(),
                phase: Phase::Verify,
                current: None,
                tiles_done: 0,
                tiles_total: 0,
                objects_total: 0,
                objects_completed: 0,
                objects_failed: 0,
                tile_failures: 0,
                last_object_secs: None,
                events: VecDeque::new(),
                logs: VecDeque::new(),
                view: View::Operational,
                started: Instant::now(),
                active: false,
                finished: false,
            })),
            log_scroll: 0,
        }
    }

    /// Run `f` on a worker thread while drawing the dashboard. `q` or `Esc`
    /// leaves the dashboard; tiles already written stay on disk.
    pub fn run<F, R>(&mut self, f: F) -> miette::Result<R>
    where
        F: FnOnce(&dyn ProgressSink) -> Result<R, HipsError> + Send + 'static,
        R: Send + 'static,
    {
        self.set_active(true);

        let mut stdout = io::stdout();
        enable_raw_mode().into_diagnostic()?;
        stdout.execute(EnterAlternateScreen).into_diagnostic()?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).into_diagnostic()?;
        terminal.clear().into_diagnostic()?;

        let (tx, rx) = std::sync::mpsc::channel();
        let sink = TuiProgress {
            state: self.state.clone(),
        };
        let handle = thread::spawn(move || tx.send(f(&sink)));

        let mut tick = 0usize;
        loop {
            if let Ok(state) = self.state.lock() {
                let elapsed = state.started.elapsed();
                terminal
                    .draw(|frame| draw_ui(frame, self, &state, tick, elapsed))
                    .into_diagnostic()?;
            }

            if let Ok(result) = rx.try_recv() {
                self.leave()?;
                handle.join().ok();
                return result.map_err(miette::Report::new);
            }

            if event::poll(Duration::from_millis(120)).into_diagnostic()? {
                if let Event::Key(key) = event::read().into_diagnostic()? {
                    if self.handle_key(key) {
                        break;
                    }
                }
            }

            tick = tick.wrapping_add(1);
        }

        self.leave()?;
        Err(miette::Report::msg("aborted"))
    }

    pub fn finish_provision(&mut self, result: &ProvisionReport) -> miette::Result<()> {
        if let Ok(mut state) = self.state.lock() {
            state.finished = true;
            state.status = format!(
                "completed {} failed {} already done {} of {}",
                result.summary.completed,
                result.summary.failed,
                result.summary.already_done,
                result.summary.total
            );
            let line = state.status.clone();
            push_log(&mut state.logs, format!("[{}] {line}", timestamp()));
        }
        Ok(())
    }

    pub fn finish_status(&mut self, result: &StatusResult) -> miette::Result<()> {
        if let Ok(mut state) = self.state.lock() {
            state.finished = true;
            let complete = result
                .objects
                .iter()
                .filter(|entry| entry.state == ObjectState::Complete)
                .count();
            state.status = format!("{complete}/{} objects complete", result.objects.len());
        }
        Ok(())
    }

    fn leave(&self) -> miette::Result<()> {
        self.set_active(false);
        disable_raw_mode().into_diagnostic()?;
        let mut stdout = io::stdout();
        stdout.execute(LeaveAlternateScreen).into_diagnostic()?;
        Ok(())
    }

    /// Returns `true` when the user asked to quit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.kind != KeyEventKind::Press {
            return false;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::F(1) | KeyCode::Char('?') => self.toggle_view(View::Help),
            KeyCode::F(4) | KeyCode::Char('l') => self.toggle_view(View::Logs),
            KeyCode::Up => self.scroll_logs(1),
            KeyCode::Down => self.scroll_logs(-1),
            KeyCode::PageUp => self.scroll_logs(10),
            KeyCode::PageDown => self.scroll_logs(-10),
            _ => {}
        }
        false
    }

    fn toggle_view(&self, view: View) {
        if let Ok(mut state) = self.state.lock() {
            state.view = if state.view == view {
                View::Operational
            } else {
                view
            };
        }
    }

    fn set_active(&self, active: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.active = active;
            if active {
                state.started = Instant::now();
            }
        }
    }

    fn scroll_logs(&mut self, delta: i16) {
        let max = self.state.lock().map(|state| state.logs.len()).unwrap_or(0);
        let max_scroll = max.saturating_sub(1) as i16;
        let next = (self.log_scroll as i16 + delta).clamp(0, max_scroll);
        self.log_scroll = next as u16;
    }
}

fn apply_payload(state: &mut AppState, phase: Phase, payload: &str) {
    match phase {
        Phase::Verify => {
            if let Some(total) = parse_field(payload, "total=") {
                state.objects_total = total as usize;
            }
        }
        Phase::Resolve => {
            if let Some((id, _)) = payload.split_once(" order ") {
                state.current = Some(id.to_string());
            }
        }
        Phase::Prepare => {
            state.tiles_done = 0;
            state.tiles_total = 0;
        }
        Phase::Fetch => {
            if let Some((done, total)) = parse_tile_progress(payload) {
                state.tiles_done = done;
                state.tiles_total = total;
            } else if payload.contains(" failed: ") {
                state.tile_failures = state.tile_failures.saturating_add(1);
            }
        }
        Phase::Store => {
            if payload.contains(" completed: ") {
                state.objects_completed += 1;
            } else if payload.contains(" failed: ") {
                state.objects_failed += 1;
            }
        }
    }
}

fn draw_ui(
    frame: &mut ratatui::Frame,
    tui: &Tui,
    state: &AppState,
    tick: usize,
    elapsed: Duration,
) {
    match state.view {
        View::Operational => draw_operational(frame, tui, state, tick, elapsed),
        View::Logs => draw_logs(frame, tui, state, tick),
        View::Help => draw_help(frame),
    }
}

fn draw_operational(
    frame: &mut ratatui::Frame,
    tui: &Tui,
    state: &AppState,
    tick: usize,
    elapsed: Duration,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(2),
        ])
        .split(frame.area());

    frame.render_widget(draw_header(state, tui.kind, tick), chunks[0]);
    frame.render_widget(draw_status_panel(state, elapsed), chunks[1]);
    frame.render_widget(draw_footer(), chunks[2]);
}

fn draw_logs(frame: &mut ratatui::Frame, tui: &Tui, state: &AppState, tick: usize) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(2),
        ])
        .split(frame.area());

    frame.render_widget(draw_header(state, tui.kind, tick), chunks[0]);
    frame.render_widget(draw_logs_view(state, tui.log_scroll), chunks[1]);
    frame.render_widget(draw_footer(), chunks[2]);
}

fn draw_help(frame: &mut ratatui::Frame) {
    let block = Block::default().borders(Borders::ALL).title("Help");
    let lines = vec![
        Line::from("F1/? help   F4/l logs   Up/Down scroll logs"),
        Line::from("q/Esc leave the dashboard (finished tiles stay on disk)"),
        Line::from("Run with --non-interactive for line output, --json for a report"),
    ];
    let view = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    frame.render_widget(view, frame.area());
}

fn draw_header(state: &AppState, kind: ProgressSinkKind, tick: usize) -> Paragraph<'static> {
    let hb = if tick % 2 == 0 { "*" } else { " " };
    let op_label = match kind {
        ProgressSinkKind::Provision => "Provision",
        ProgressSinkKind::Status => "Status",
    };
    let header_line = Line::from(vec![
        Span::styled(
            "HIPS-PROVISION",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(env!("CARGO_PKG_VERSION"), Style::default().fg(Color::Gray)),
        Span::raw("   Op: "),
        Span::styled(op_label, Style::default().fg(Color::Cyan)),
        Span::raw("   "),
        Span::styled(hb, Style::default().fg(Color::Green)),
    ]);
    let counts_line = Line::from(vec![Span::styled(
        format!(
            "Objects: {} completed · {} failed · {} in run",
            state.objects_completed, state.objects_failed, state.objects_total
        ),
        Style::default().fg(Color::Gray),
    )]);
    Paragraph::new(vec![header_line, counts_line])
        .alignment(Alignment::Left)
        .block(Block::default().borders(Borders::BOTTOM))
}

fn draw_status_panel(state: &AppState, elapsed: Duration) -> Paragraph<'static> {
    let percent = tile_percent(state.tiles_done, state.tiles_total);
    let phase_color = if state.active {
        Color::Cyan
    } else if state.finished {
        Color::Green
    } else {
        Color::Yellow
    };
    let last = state
        .last_object_secs
        .map(|secs| format!("{secs:.1}s"))
        .unwrap_or_else(|| "--".to_string());
    let mut lines = vec![
        Line::from(Span::styled(
            "STATUS / PROGRESS",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled("Phase: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{:<8} ", state.phase.label()),
                Style::default().fg(phase_color),
            ),
            Span::raw(progress_bar(percent)),
            Span::raw(format!(
                " {:>3}%  {}/{} tiles",
                percent, state.tiles_done, state.tiles_total
            )),
        ]),
        Line::from(vec![
            Span::styled("Object: ", Style::default().fg(Color::Gray)),
            Span::raw(state.current.clone().unwrap_or_else(|| "--".to_string())),
            Span::styled("   Last object: ", Style::default().fg(Color::Gray)),
            Span::raw(last),
        ]),
        Line::from(vec![
            Span::styled("Tile failures: ", Style::default().fg(Color::Gray)),
            Span::raw(format!("{}", state.tile_failures)),
            Span::styled("   Elapsed: ", Style::default().fg(Color::Gray)),
            Span::raw(format!("{}s", elapsed.as_secs())),
        ]),
        Line::from(vec![
            Span::styled("Status: ", Style::default().fg(Color::Gray)),
            Span::raw(state.status.clone()),
        ]),
        Line::from(Span::styled(
            "Recent events:",
            Style::default().fg(Color::Gray),
        )),
    ];
    for event in state.events.iter().rev() {
        lines.push(Line::from(format!("- {event}")));
    }

    Paragraph::new(lines).wrap(Wrap { trim: true })
}

fn draw_logs_view(state: &AppState, scroll: u16) -> Paragraph<'static> {
    let lines: Vec<Line> = state
        .logs
        .iter()
        .rev()
        .skip(scroll as usize)
        .map(|line| Line::from(line.clone()))
        .collect();
    Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Logs"))
        .wrap(Wrap { trim: false })
}

fn draw_footer() -> Paragraph<'static> {
    Paragraph::new(Line::from(Span::styled(
        "q quit · l logs · ? help",
        Style::default().fg(Color::Gray),
    )))
    .block(Block::default().borders(Borders::TOP))
}

fn tile_percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    ((done.min(total) * 100) / total) as u8
}

fn progress_bar(percent: u8) -> String {
    let total = 20;
    let filled = (percent as usize * total) / 100;
    let mut out = String::from("[");
    for i in 0..total {
        out.push(if i < filled { '#' } else { '.' });
    }
    out.push(']');
    out
}

fn parse_phase(message: &str) -> Option<(Phase, &str)> {
    let rest = message.strip_prefix("phase=")?;
    let (label, payload) = rest.split_once(';')?;
    let phase = match label {
        "Verify" => Phase::Verify,
        "Resolve" => Phase::Resolve,
        "Prepare" => Phase::Prepare,
        "Fetch" => Phase::Fetch,
        "Store" => Phase::Store,
        _ => return None,
    };
    Some((phase, payload.trim()))
}

fn parse_field(payload: &str, key: &str) -> Option<u64> {
    payload
        .split(key)
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|value| value.parse().ok())
}

/// `m57 25/40 tiles` -> `(25, 40)`.
fn parse_tile_progress(payload: &str) -> Option<(u64, u64)> {
    let counts = payload.strip_suffix(" tiles")?.rsplit(' ').next()?;
    let (done, total) = counts.split_once('/')?;
    Some((done.parse().ok()?, total.parse().ok()?))
}

fn push_event(buffer: &mut VecDeque<String>, item: String) {
    buffer.push_back(item);
    while buffer.len() > EVENTS_MAX {
        buffer.pop_front();
    }
}

fn push_log(buffer: &mut VecDeque<String>, item: String) {
    buffer.push_back(item);
    while buffer.len() > LOGS_MAX {
        buffer.pop_front();
    }
}

fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

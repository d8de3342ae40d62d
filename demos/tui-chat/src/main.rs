//! Terminal host for the Pssst message client.
//!
//! Run with: cargo run -p tui-chat
//!
//! Connects to the local proxy at `PSSST_PROXY_ADDR` (default
//! `127.0.0.1:62222`). Pass `--loopback` to chat with an in-process echo
//! peer instead. Type `<recipient> <message>` and press Enter to push.

use std::{
    io,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::Context;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use pssst_client::{Mailboxes, MemoryChannel, MessageClient, poll::decode_messages};
use pssst_core::{CallChannel, ClientConfig, Method, PushRequest, RenderEvent, Transcript};
use pssst_transport::StreamChannel;
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PROXY_ADDR: &str = "127.0.0.1:62222";
const LOOPBACK_USER: &str = "me";
const ECHO_USER: &str = "echo";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let config_path = std::env::var_os("PSSST_CONFIG").map(PathBuf::from);
    let config = ClientConfig::load(config_path.as_deref()).context("loading config")?;

    let loopback = std::env::args().skip(1).any(|arg| arg == "--loopback");
    let channel: Arc<dyn CallChannel> = if loopback {
        let mailboxes = Arc::new(Mailboxes::new());
        spawn_echo_peer(Arc::clone(&mailboxes), config.poll_interval())?;
        Arc::new(MemoryChannel::new(LOOPBACK_USER, mailboxes)?)
    } else {
        let addr =
            std::env::var("PSSST_PROXY_ADDR").unwrap_or_else(|_| DEFAULT_PROXY_ADDR.to_string());
        Arc::new(
            StreamChannel::connect(addr.as_str())
                .await
                .with_context(|| format!("connecting to proxy at {addr}"))?,
        )
    };

    let transcript = Arc::new(Transcript::new());
    let client = Arc::new(MessageClient::new(channel, transcript.clone(), &config));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run app
    let result = run_app(&mut terminal, &client, &transcript).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn init_tracing() -> anyhow::Result<()> {
    let log_path = std::env::temp_dir().join("pssst-tui-chat.log");
    let log_file = std::fs::File::create(&log_path)
        .with_context(|| format!("creating log file {}", log_path.display()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
    Ok(())
}

/// Peer that sends every message it receives straight back.
fn spawn_echo_peer(mailboxes: Arc<Mailboxes>, interval: Duration) -> anyhow::Result<()> {
    let echo = MemoryChannel::new(ECHO_USER, mailboxes)?;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let Ok(pulled) = echo.invoke(Method::Pull, None).await else {
                break;
            };
            let Ok(messages) = decode_messages(pulled) else {
                continue;
            };
            for message in messages {
                let Some((sender, body)) = message.split_once(": ") else {
                    continue;
                };
                let params = PushRequest {
                    recipient: sender.to_string(),
                    body: body.to_string(),
                }
                .to_params();
                if let Err(e) = echo.invoke(Method::Push, Some(params)).await {
                    tracing::warn!("Echo peer failed to answer {sender}: {e}");
                }
            }
        }
    });
    Ok(())
}

struct App {
    output_lines: Vec<String>,
    input: String,
    scroll: u16,
    status: String,
}

impl App {
    fn new() -> Self {
        Self {
            output_lines: vec![
                "Pssst - Terminal Client".to_string(),
                "=======================".to_string(),
                String::new(),
                "Type <recipient> <message> and press Enter.".to_string(),
                "Press Ctrl+C to quit.".to_string(),
                String::new(),
            ],
            input: String::new(),
            scroll: 0,
            status: "Connecting...".to_string(),
        }
    }

    fn add_output(&mut self, text: &str) {
        for line in text.split('\n') {
            let clean: String = line
                .chars()
                .filter(|c| !c.is_control() || *c == '\t')
                .collect();
            self.output_lines.push(clean);
        }
    }

    fn scroll_to_bottom(&mut self) {
        let visible_lines = 20u16; // approximate
        let total = u16::try_from(self.output_lines.len()).unwrap_or(u16::MAX);
        self.scroll = total.saturating_sub(visible_lines);
    }

    fn apply(&mut self, event: RenderEvent) {
        match event {
            RenderEvent::Append(text) => self.add_output(&text),
            RenderEvent::ScrollToBottom => self.scroll_to_bottom(),
            RenderEvent::DisplayName(name) => self.status = format!("Connected as {name}"),
            RenderEvent::ClearInput => self.input.clear(),
            RenderEvent::Error(message) => {
                self.add_output(&format!("[Error: {message}]"));
                self.scroll_to_bottom();
            }
        }
    }
}

/// Forward the transcript (history, then live events) to the draw loop.
fn spawn_render_forwarder(transcript: &Transcript) -> mpsc::UnboundedReceiver<RenderEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut stream = transcript.history_plus_stream();
    tokio::spawn(async move {
        while let Some(event) = stream.next().await {
            if tx.send(event).is_err() {
                break;
            }
        }
    });
    rx
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    client: &Arc<MessageClient>,
    transcript: &Transcript,
) -> anyhow::Result<()> {
    let mut app = App::new();
    let mut events = spawn_render_forwarder(transcript);
    client.start();

    loop {
        // Apply render events
        while let Ok(event) = events.try_recv() {
            app.apply(event);
        }

        terminal.draw(|f| ui(f, &app))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                match key {
                    KeyEvent {
                        code: KeyCode::Char('c'),
                        modifiers: KeyModifiers::CONTROL,
                        ..
                    } => {
                        // Let the proxy shut down before leaving
                        if tokio::time::timeout(Duration::from_secs(2), client.exit())
                            .await
                            .is_err()
                        {
                            tracing::warn!("Proxy did not answer exit in time");
                        }
                        return Ok(());
                    }
                    KeyEvent {
                        code: KeyCode::Char(c),
                        modifiers: KeyModifiers::NONE | KeyModifiers::SHIFT,
                        ..
                    } => app.input.push(c),
                    KeyEvent {
                        code: KeyCode::Backspace,
                        ..
                    } => {
                        app.input.pop();
                    }
                    KeyEvent {
                        code: KeyCode::Enter,
                        ..
                    } => {
                        // Input is cleared once the push is accepted
                        let line = app.input.clone();
                        let client = Arc::clone(client);
                        tokio::spawn(async move {
                            client.submit(&line).await;
                        });
                    }
                    KeyEvent {
                        code: KeyCode::Up, ..
                    } => app.scroll = app.scroll.saturating_sub(1),
                    KeyEvent {
                        code: KeyCode::Down,
                        ..
                    } => app.scroll = app.scroll.saturating_add(1),
                    KeyEvent {
                        code: KeyCode::PageUp,
                        ..
                    } => app.scroll = app.scroll.saturating_sub(10),
                    KeyEvent {
                        code: KeyCode::PageDown,
                        ..
                    } => app.scroll = app.scroll.saturating_add(10),
                    _ => {}
                }
            }
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Messages
            Constraint::Length(3), // Input
            Constraint::Length(1), // Status
        ])
        .split(f.area());

    let lines: Vec<Line> = app
        .output_lines
        .iter()
        .map(|s| Line::from(s.as_str()))
        .collect();

    let messages = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Messages"))
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0));
    f.render_widget(messages, chunks[0]);

    let input = Paragraph::new(app.input.as_str())
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL).title("Push"));
    f.render_widget(input, chunks[1]);

    let cursor_x = u16::try_from(app.input.chars().count()).unwrap_or(u16::MAX);
    f.set_cursor_position((
        chunks[1].x.saturating_add(cursor_x).saturating_add(1),
        chunks[1].y + 1,
    ));

    let status_style = if app.status.starts_with("Connected as") {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::Yellow)
    };

    let status = Paragraph::new(Line::from(vec![
        Span::raw(" "),
        Span::styled(app.status.as_str(), status_style),
        Span::raw(" | "),
        Span::styled("Ctrl+C", Style::default().fg(Color::Yellow)),
        Span::raw(" quit | "),
        Span::styled("Up/Down/PgUp/PgDn", Style::default().fg(Color::Yellow)),
        Span::raw(" scroll "),
    ]));
    f.render_widget(status, chunks[2]);
}

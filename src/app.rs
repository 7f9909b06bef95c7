//! Main application logic
//!
//! Single event loop owning the session state. WebSocket reader tasks feed
//! it through mpsc channels; keyboard input is polled between ticks. Every
//! state mutation happens synchronously inside one of these callbacks, so
//! the session never sees a torn write.

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io;
use tokio::sync::mpsc;

use crate::MetricSample;
use crate::analysis::{AnalysisOutcome, AnalysisRequester};
use crate::channel::{Channel, ChannelEvent, endpoint_url};
use crate::config::Config;
use crate::session::Session;
use crate::ui;

/// Path of the live telemetry endpoint.
pub const LIVE_PATH: &str = "/realtime/cpus";

/// Main TUI application
pub struct App {
    config: Config,
    session: Session,

    /// Live channel handle. `None` while frozen: the channel is torn down
    /// on capture and reopened fresh on resume.
    live: Option<Channel<MetricSample>>,

    /// Receiver for the in-flight analysis outcome, if any. Dropped on
    /// resume so a late response cannot reach the session.
    analysis_rx: Option<mpsc::UnboundedReceiver<AnalysisOutcome>>,

    requester: AnalysisRequester,
}

impl App {
    /// Create a new application instance and open the live channel.
    pub fn new(config: Config) -> Self {
        let requester = AnalysisRequester::new(&config.server_url);

        let mut app = Self {
            session: Session::new(),
            live: None,
            analysis_rx: None,
            requester,
            config,
        };

        app.connect_live();
        app
    }

    /// Open a fresh live channel. Any previous handle must already be gone.
    fn connect_live(&mut self) {
        let url = endpoint_url(&self.config.server_url, LIVE_PATH);
        self.live = Some(Channel::connect(url, self.config.reconnect_policy()));
    }

    /// Run the application
    pub async fn run(&mut self) -> Result<()> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        // Run event loop
        let result = self.run_event_loop(&mut terminal).await;

        // Restore terminal
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result
    }

    /// Main event loop
    async fn run_event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<()> {
        let tick_rate = std::time::Duration::from_millis(self.config.tick_rate_ms);

        loop {
            // Render UI
            terminal.draw(|f| ui::render(f, &self.session))?;

            // Drain live channel events (non-blocking)
            self.drain_live_events();

            // Pick up the analysis outcome, if one arrived
            self.poll_analysis();

            // Handle keyboard events (with timeout)
            if event::poll(tick_rate)?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
                && self.handle_key_event(key.code)
            {
                break; // Quit
            }
        }

        Ok(())
    }

    /// Apply every event the live channel has queued, in arrival order.
    fn drain_live_events(&mut self) {
        let mut events = Vec::new();
        if let Some(live) = self.live.as_mut() {
            while let Some(event) = live.try_recv() {
                events.push(event);
            }
        }

        for event in events {
            self.handle_channel_event(event);
        }
    }

    /// Handle one live channel event
    fn handle_channel_event(&mut self, event: ChannelEvent<MetricSample>) {
        match event {
            ChannelEvent::Connected => {
                self.session.connected = true;
                self.session.error_message = None;
            }
            ChannelEvent::Message(sample) => {
                // The session discards this while frozen.
                self.session.apply_sample(sample);
            }
            ChannelEvent::DecodeError(e) => {
                self.session.error_message = Some(format!("malformed frame dropped: {e}"));
            }
            ChannelEvent::Disconnected(reason) => {
                self.session.connected = false;
                self.session.error_message =
                    reason.or_else(|| Some("disconnected".to_string()));
                self.live = None;
            }
        }
    }

    /// Pick up the outcome of the in-flight analysis request, if any.
    fn poll_analysis(&mut self) {
        let Some(rx) = self.analysis_rx.as_mut() else {
            return;
        };

        match rx.try_recv() {
            Ok(outcome) => {
                self.analysis_rx = None;
                match outcome.result {
                    Ok(text) => {
                        // Ignored by the session if the operator resumed or
                        // a newer capture superseded this request.
                        self.session.attach_analysis(outcome.generation, text);
                    }
                    Err(e) => {
                        self.session.error_message = Some(format!("analysis failed: {e:#}"));
                    }
                }
            }
            Err(mpsc::error::TryRecvError::Empty) => {}
            Err(mpsc::error::TryRecvError::Disconnected) => {
                self.analysis_rx = None;
            }
        }
    }

    /// The single operator control: Snapshot while live, Resume while frozen.
    fn toggle_snapshot(&mut self) {
        if self.session.is_frozen() {
            self.resume();
        } else {
            self.capture_and_analyze();
        }
    }

    /// Close the live channel, freeze the displayed values and fire the
    /// analysis request. Teardown happens before the capture so no message
    /// can slip into the display state after the freeze.
    fn capture_and_analyze(&mut self) {
        if let Some(mut live) = self.live.take() {
            live.close();
        }
        self.session.connected = false;

        let snapshot = self.session.capture();
        tracing::info!(
            "captured snapshot of {} cores (generation {})",
            snapshot.sample().cpus.len(),
            snapshot.generation()
        );

        // None for an empty capture: nothing to analyze.
        self.analysis_rx = self.requester.request_snapshot(&snapshot);
    }

    /// Discard the snapshot and reconnect the live channel fresh. Missed
    /// messages are not replayed; the new connection starts from whatever
    /// the server sends next.
    fn resume(&mut self) {
        self.analysis_rx = None;
        self.session.resume();
        self.connect_live();
    }

    /// Handle keyboard event. Returns true to quit.
    fn handle_key_event(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                return true; // Quit
            }
            KeyCode::Char(' ') => {
                self.toggle_snapshot();
            }
            KeyCode::Char('c') => {
                self.session.clear_error();
            }
            _ => {}
        }

        false
    }
}

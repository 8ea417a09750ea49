// Terminal front-end for the job poller.
//
// While a job is being awaited the terminal is put in raw mode so that
// Ctrl+C arrives as a key event instead of killing the process. The key is
// picked up between refreshes by `KeyboardTicker`, which abandons the wait
// without touching the remote job.

use crate::poller::{
    format_elapsed, CancelToken, JobSource, PollError, PollObserver, Poller, Ticker, Verdict,
    WaitOutcome,
};
use crate::schema::Job;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::time::{Duration, Instant};
use tracing::debug;

const TURTLE_FRAMES: &[&str] = &[
    "(       )",
    "(     🐢)",
    "(    🐢 )",
    "(   🐢  )",
    "(  🐢   )",
    "( 🐢    )",
    "(🐢     )",
    "(       )",
    "(   🐢  )",
];

fn turtle_spinner() -> ProgressBar {
    let style = ProgressStyle::with_template("{spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TURTLE_FRAMES);
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(style);
    spinner.enable_steady_tick(Duration::from_millis(160));
    spinner
}

/// Raw mode for as long as the guard lives.
struct RawMode;

impl RawMode {
    fn enable() -> Option<Self> {
        match terminal::enable_raw_mode() {
            Ok(()) => Some(RawMode),
            Err(e) => {
                debug!(error = %e, "raw mode unavailable, Ctrl+C will not skip the wait");
                None
            }
        }
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Where key presses come from while a job is awaited.
pub trait EventSource {
    fn poll(&mut self, timeout: Duration) -> io::Result<bool>;

    fn read(&mut self) -> io::Result<Event>;
}

/// The process terminal, via crossterm.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalEvents;

impl EventSource for TerminalEvents {
    fn poll(&mut self, timeout: Duration) -> io::Result<bool> {
        event::poll(timeout)
    }

    fn read(&mut self) -> io::Result<Event> {
        event::read()
    }
}

/// Throw away input typed during the wait. Leaving raw mode does not flush
/// the queue, and a stray Ctrl+C would interrupt the next prompt.
fn discard_pending<E: EventSource>(events: &mut E) -> usize {
    let mut discarded = 0;
    while events.poll(Duration::ZERO).unwrap_or(false) {
        if events.read().is_err() {
            break;
        }
        discarded += 1;
    }
    discarded
}

fn progress_line(message: &str, elapsed: Duration) -> String {
    format!("{message}\t{} elapsed.", format_elapsed(elapsed))
}

/// Renders poller progress as a spinner line and prints the outcome.
#[derive(Default)]
pub struct ConsoleObserver {
    spinner: Option<ProgressBar>,
    raw_mode: Option<RawMode>,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self::default()
    }

    fn spinner(&mut self) -> &ProgressBar {
        if self.spinner.is_none() {
            self.raw_mode = RawMode::enable();
        }
        self.spinner.get_or_insert_with(turtle_spinner)
    }

    // Must run before printing: raw mode does not translate "\n".
    fn stop(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
        if let Some(raw_mode) = self.raw_mode.take() {
            let discarded = discard_pending(&mut TerminalEvents);
            if discarded > 0 {
                debug!(discarded, "dropped input typed while waiting");
            }
            drop(raw_mode);
        }
    }
}

impl PollObserver for ConsoleObserver {
    fn progress(&mut self, message: &str, elapsed: Duration) {
        let line = progress_line(message, elapsed);
        self.spinner().set_message(line);
    }

    fn settled(&mut self, _job: &Job, verdict: &Verdict) {
        self.stop();
        println!("{}", verdict.describe());
    }

    fn abandoned(&mut self, job: &Job) {
        self.stop();
        println!();
        println!(
            "Skipping wait for job completion. Job will continue running in the background, with id {}",
            job.job_id
        );
    }
}

impl Drop for ConsoleObserver {
    fn drop(&mut self) {
        self.stop();
    }
}

pub(crate) fn is_interrupt(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Esc => true,
        KeyCode::Char('c') | KeyCode::Char('d') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Waits out the poll interval while watching the keyboard for an interrupt.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyboardTicker<E = TerminalEvents> {
    events: E,
}

impl<E: EventSource> KeyboardTicker<E> {
    pub fn new(events: E) -> Self {
        KeyboardTicker { events }
    }
}

impl<E: EventSource> Ticker for KeyboardTicker<E> {
    fn pause(&mut self, interval: Duration, cancel: &CancelToken) {
        let deadline = Instant::now() + interval;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events.poll(remaining) {
                Ok(true) => match self.events.read() {
                    Ok(Event::Key(key)) if is_interrupt(&key) => {
                        cancel.cancel();
                        return;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        debug!(error = %e, "failed to read terminal event");
                        std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
                        return;
                    }
                },
                Ok(false) => return,
                Err(e) => {
                    debug!(error = %e, "failed to poll terminal events");
                    std::thread::sleep(remaining);
                    return;
                }
            }
        }
    }
}

/// Await `job` on the console. Ctrl+C or Esc abandons the wait.
pub fn watch_job<S: JobSource>(
    source: S,
    job: Job,
    interval: Duration,
) -> Result<WaitOutcome, PollError> {
    let cancel = CancelToken::new();
    let mut poller = Poller::new(job, source, ConsoleObserver::new())
        .with_ticker(KeyboardTicker::new(TerminalEvents))
        .with_interval(interval);
    poller.await_completion(&cancel)
}

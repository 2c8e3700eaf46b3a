// zensh-core/src/progress/mod.rs
//! Multi-row progress display.
//!
//! Producers on any thread submit messages through a [`Renderer`] or a
//! [`TaskHandle`]; a single tokio task owns the rows and the terminal and
//! applies messages in submission order. A second task emits an animation
//! tick every 50 ms. Teardown happens once: later submissions are refused.

mod spinner;
mod term;

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use unicode_width::UnicodeWidthStr;

pub use spinner::Spinner;
pub use term::TermManager;

pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    TaskAdded {
        index: usize,
        name: String,
        status: String,
    },
    /// Redraws the status column of one row.
    Update { index: usize, status: String },
    /// Final text for a row; it stops animating.
    Done { index: usize, status: String },
    AnimationTick,
    /// The name column grew to `width`; every row is redrawn.
    Reflow { width: usize },
    Halt,
}

/// A row as last drawn, returned on teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub index: usize,
    pub name: String,
    pub status: String,
    pub in_progress: bool,
}

#[derive(Debug, Default)]
struct Submission {
    halted: bool,
    next_index: usize,
    name_width: usize,
}

#[derive(Debug)]
struct Shared {
    submission: Mutex<Submission>,
    tx: UnboundedSender<Message>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Submission> {
        self.submission.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, message: Message) -> bool {
        let guard = self.lock();
        Self::send_locked(&guard, &self.tx, message)
    }

    fn send_locked(guard: &Submission, tx: &UnboundedSender<Message>, message: Message) -> bool {
        if guard.halted {
            return false;
        }
        tx.send(message).is_ok()
    }
}

/// Producer-side handle of one row.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    index: usize,
    name: Arc<str>,
    finished: Arc<AtomicBool>,
    shared: Arc<Shared>,
}

impl TaskHandle {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Replaces the status text. Ignored once the task is done.
    pub fn update(&self, status: impl Into<String>) -> bool {
        if self.is_finished() {
            return false;
        }
        self.shared.send(Message::Update {
            index: self.index,
            status: status.into(),
        })
    }

    /// Marks the task finished with `status`. Only the first call counts.
    pub fn done(&self, status: impl Into<String>) -> bool {
        if self.finished.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.shared.send(Message::Done {
            index: self.index,
            status: status.into(),
        })
    }

    /// A handle not attached to any display; every submission is refused.
    pub fn detached(name: &str) -> Self {
        let (tx, _) = mpsc::unbounded_channel();
        let submission = Submission {
            halted: true,
            ..Submission::default()
        };
        Self {
            index: 0,
            name: Arc::from(name),
            finished: Arc::new(AtomicBool::new(false)),
            shared: Arc::new(Shared {
                submission: Mutex::new(submission),
                tx,
            }),
        }
    }
}

pub struct Renderer {
    shared: Arc<Shared>,
    torn_down: AtomicBool,
    processor: Mutex<Option<JoinHandle<Vec<TaskSnapshot>>>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Renderer {
    /// Draws to stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Starts the processing and tick tasks. Must be called inside a tokio runtime.
    pub fn new<W>(out: W) -> Self
    where
        W: Write + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            submission: Mutex::new(Submission::default()),
            tx,
        });
        let processor = tokio::spawn(process(Screen::new(out), rx));

        let tick_shared = Arc::clone(&shared);
        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            interval.tick().await;
            loop {
                interval.tick().await;
                if !tick_shared.send(Message::AnimationTick) {
                    break;
                }
            }
        });

        Self {
            shared,
            torn_down: AtomicBool::new(false),
            processor: Mutex::new(Some(processor)),
            ticker: Mutex::new(Some(ticker)),
        }
    }

    /// Registers a new row. Indices grow with creation order and are never
    /// reused. A name wider than any before it queues a `Reflow` first.
    pub fn add_task(&self, name: &str, status: impl Into<String>) -> TaskHandle {
        let mut guard = self.shared.lock();
        let index = guard.next_index;
        guard.next_index += 1;

        let width = name.width();
        if width > guard.name_width {
            guard.name_width = width;
            Shared::send_locked(&guard, &self.shared.tx, Message::Reflow { width });
        }
        let accepted = Shared::send_locked(
            &guard,
            &self.shared.tx,
            Message::TaskAdded {
                index,
                name: name.to_string(),
                status: status.into(),
            },
        );
        drop(guard);

        TaskHandle {
            index,
            name: Arc::from(name),
            finished: Arc::new(AtomicBool::new(!accepted)),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Submits a raw message; `false` after teardown.
    pub fn send(&self, message: Message) -> bool {
        self.shared.send(message)
    }

    pub fn is_halted(&self) -> bool {
        self.shared.lock().halted
    }

    /// Stops the display and leaves the cursor below the last row. Returns
    /// the final rows on the first call and `None` on every later call.
    pub async fn teardown(&self) -> Option<Vec<TaskSnapshot>> {
        if self
            .torn_down
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }

        {
            let mut guard = self.shared.lock();
            Shared::send_locked(&guard, &self.shared.tx, Message::Halt);
            guard.halted = true;
        }

        if let Some(ticker) = take(&self.ticker) {
            ticker.abort();
        }
        let processor = take(&self.processor)?;
        match processor.await {
            Ok(rows) => Some(rows),
            Err(e) => {
                warn!("Progress renderer task failed: {}", e);
                Some(Vec::new())
            }
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if !self.torn_down.swap(true, Ordering::AcqRel) {
            let mut guard = self.shared.lock();
            Shared::send_locked(&guard, &self.shared.tx, Message::Halt);
            guard.halted = true;
        }
        if let Some(ticker) = take(&self.ticker) {
            ticker.abort();
        }
    }
}

fn take<T>(slot: &Mutex<Option<T>>) -> Option<T> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

#[derive(Debug)]
struct Row {
    name: String,
    status: String,
    in_progress: bool,
    spinner: Spinner,
}

/// Consumer-side state: the rows and the terminal they are drawn on.
struct Screen<W: Write> {
    term: TermManager<W>,
    rows: Vec<Row>,
    name_width: usize,
}

impl<W: Write> Screen<W> {
    fn new(out: W) -> Self {
        Self {
            term: TermManager::new(out),
            rows: Vec::new(),
            name_width: 0,
        }
    }

    fn spinner_column(&self) -> usize {
        self.name_width + 1
    }

    fn status_column(&self) -> usize {
        self.name_width + 3
    }

    /// Applies one message. Returns `Ok(true)` on `Halt`.
    fn apply(&mut self, message: Message) -> io::Result<bool> {
        match message {
            Message::TaskAdded {
                index,
                name,
                status,
            } => {
                if index >= self.rows.len() {
                    self.rows.resize_with(index + 1, || Row {
                        name: String::new(),
                        status: String::new(),
                        in_progress: false,
                        spinner: Spinner::default(),
                    });
                }
                self.rows[index] = Row {
                    name,
                    status,
                    in_progress: true,
                    spinner: Spinner::default(),
                };
                self.draw_row(index)?;
            }
            Message::Update { index, status } => {
                let column = self.status_column();
                let Some(row) = self.rows.get_mut(index) else {
                    return Ok(false);
                };
                if !row.in_progress {
                    return Ok(false);
                }
                row.status = status;
                let status = row.status.clone();
                self.term.move_to(column, index)?;
                self.term.erase_right()?;
                self.term.writeln(&status)?;
            }
            Message::Done { index, status } => {
                let column = self.spinner_column();
                let Some(row) = self.rows.get_mut(index) else {
                    return Ok(false);
                };
                row.in_progress = false;
                row.status = status;
                let name_end = row.name.width();
                let status = row.status.clone();
                self.term.move_to(name_end, index)?;
                self.term.erase_right()?;
                self.term.move_to(column, index)?;
                self.term.writeln(&status)?;
            }
            Message::AnimationTick => {
                let column = self.spinner_column();
                for index in 0..self.rows.len() {
                    if !self.rows[index].in_progress {
                        continue;
                    }
                    let glyph = self.rows[index].spinner.glyph().to_string();
                    self.term.move_to(column, index)?;
                    self.term.write(&glyph)?;
                    self.rows[index].spinner.advance();
                }
            }
            Message::Reflow { width } => {
                self.name_width = self.name_width.max(width);
                for index in 0..self.rows.len() {
                    self.redraw_tail(index)?;
                }
            }
            Message::Halt => {
                self.term.to_end()?;
                self.term.flush()?;
                return Ok(true);
            }
        }
        self.term.to_end()?;
        self.term.flush()?;
        Ok(false)
    }

    fn draw_row(&mut self, index: usize) -> io::Result<()> {
        let column = self.status_column();
        let row = &self.rows[index];
        let (name, status) = (row.name.clone(), row.status.clone());
        self.term.move_to(0, index)?;
        self.term.write(&name)?;
        self.term.move_to(column, index)?;
        self.term.writeln(&status)
    }

    /// Everything after the name, at the current column layout.
    fn redraw_tail(&mut self, index: usize) -> io::Result<()> {
        let column = self.spinner_column();
        let row = &self.rows[index];
        let name_end = row.name.width();
        let text = if row.in_progress {
            format!("{} {}", row.spinner.glyph(), row.status)
        } else {
            row.status.clone()
        };
        self.term.move_to(name_end, index)?;
        self.term.erase_right()?;
        self.term.move_to(column, index)?;
        self.term.writeln(&text)
    }

    fn snapshot(&self) -> Vec<TaskSnapshot> {
        self.rows
            .iter()
            .enumerate()
            .map(|(index, row)| TaskSnapshot {
                index,
                name: row.name.clone(),
                status: row.status.clone(),
                in_progress: row.in_progress,
            })
            .collect()
    }
}

async fn process<W: Write>(mut screen: Screen<W>, mut rx: UnboundedReceiver<Message>) -> Vec<TaskSnapshot> {
    while let Some(message) = rx.recv().await {
        trace!("Renderer applying {:?}", message);
        match screen.apply(message) {
            Ok(true) => break,
            Ok(false) => {}
            Err(e) => debug!("Progress output failed: {}", e),
        }
    }
    screen.snapshot()
}

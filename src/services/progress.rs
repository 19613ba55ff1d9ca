//! Single-line console progress: a spinner, a label and a running count.

use std::{
    io::{self, Write},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::{sync::oneshot, task::JoinHandle};

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

/// Default redraw interval.
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Destination of the rendered line.
pub type SharedWriter = Arc<Mutex<dyn Write + Send>>;

/// Count of completed transfers, shared by every worker of a job.
///
/// Until [`reset`](Self::reset) is called the count is "not available" and
/// the reporter shows an ellipsis instead of a number.
#[derive(Clone, Default)]
pub struct ProgressCounter {
    inner: Arc<CounterState>,
}

#[derive(Default)]
struct CounterState {
    value: AtomicU64,
    counting: AtomicBool,
}

impl ProgressCounter {
    /// Start counting from zero.
    pub fn reset(&self) {
        self.inner.value.store(0, Ordering::SeqCst);
        self.inner.counting.store(true, Ordering::SeqCst);
    }

    /// Go back to the "not available" state.
    pub fn clear(&self) {
        self.inner.counting.store(false, Ordering::SeqCst);
        self.inner.value.store(0, Ordering::SeqCst);
    }

    /// Record one completed transfer and return the new total.
    pub fn increment(&self) -> u64 {
        self.inner.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Current count, or `None` before counting started.
    pub fn get(&self) -> Option<u64> {
        self.inner
            .counting
            .load(Ordering::SeqCst)
            .then(|| self.value())
    }

    pub fn value(&self) -> u64 {
        self.inner.value.load(Ordering::SeqCst)
    }
}

struct ActiveLine {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Owns one status line and the background task redrawing it.
///
/// Starting while a line is already active stops that line first. A reporter
/// without a writer still counts but never draws anything.
pub struct ProgressReporter {
    counter: ProgressCounter,
    writer: Option<SharedWriter>,
    active: Option<ActiveLine>,
}

impl ProgressReporter {
    pub fn stdout() -> Self {
        Self::with_writer(Arc::new(Mutex::new(io::stdout())))
    }

    pub fn with_writer(writer: SharedWriter) -> Self {
        Self {
            counter: ProgressCounter::default(),
            writer: Some(writer),
            active: None,
        }
    }

    pub fn disabled() -> Self {
        Self {
            counter: ProgressCounter::default(),
            writer: None,
            active: None,
        }
    }

    /// Handle to the counter shown on the line.
    pub fn counter(&self) -> ProgressCounter {
        self.counter.clone()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Begin drawing `label`. The count is cleared to "not available".
    pub async fn start(&mut self, label: impl Into<String>) {
        self.stop().await;
        self.counter.clear();

        let Some(writer) = self.writer.clone() else {
            return;
        };
        let (stop, stopped) = oneshot::channel();
        let handle = tokio::spawn(draw(
            writer,
            label.into(),
            self.counter.clone(),
            stopped,
        ));
        self.active = Some(ActiveLine { stop, handle });
    }

    /// Stop drawing and erase the line. Does nothing when no line is active.
    pub async fn stop(&mut self) {
        if let Some(line) = self.active.take() {
            let _ = line.stop.send(());
            let _ = line.handle.await;
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        // The task erases the line on its own once signalled.
        if let Some(line) = self.active.take() {
            let _ = line.stop.send(());
        }
    }
}

async fn draw(
    writer: SharedWriter,
    label: String,
    counter: ProgressCounter,
    mut stopped: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    let mut frame = 0usize;
    let mut width = 0usize;

    loop {
        // Every started label gets at least one frame.
        tokio::select! {
            biased;
            _ = ticker.tick() => {
                let line = render_line(SPINNER[frame % SPINNER.len()], &label, counter.get());
                frame += 1;
                width = width.max(line.chars().count());
                emit(&writer, &format!("\r{line}"));
            }
            _ = &mut stopped => break,
        }
    }

    if width > 0 {
        emit(&writer, &format!("\r{}\r", " ".repeat(width)));
    }
}

fn render_line(glyph: char, label: &str, count: Option<u64>) -> String {
    match count {
        Some(done) => format!("{glyph} {label} ({done} done so far)"),
        None => format!("{glyph} {label}..."),
    }
}

/// Console errors never interrupt a migration.
fn emit(writer: &SharedWriter, text: &str) {
    if let Ok(mut out) = writer.lock() {
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

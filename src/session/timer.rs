use crate::session::notify::{Notification, Notifier};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

const TICK: Duration = Duration::from_secs(1);

/// Call-duration counter. Runs only while a call is connected and must be
/// stopped explicitly on every exit from that state.
#[derive(Debug, Default)]
pub struct CallTimer {
    seconds: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl CallTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restarts counting from zero. Requires a tokio runtime.
    pub fn start(&mut self, notifier: Notifier) {
        self.stop();
        // fresh counter per run so an aborted tick cannot touch the new one
        let seconds = Arc::new(AtomicU64::new(0));
        self.seconds = seconds.clone();
        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + TICK, TICK);
            loop {
                ticker.tick().await;
                let elapsed = seconds.fetch_add(1, Ordering::SeqCst) + 1;
                notifier.emit(Notification::Duration(elapsed));
            }
        }));
    }

    /// Cancels the periodic task and resets the counter.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.seconds = Arc::new(AtomicU64::new(0));
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.seconds.load(Ordering::SeqCst)
    }
}

impl Drop for CallTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// `mm:ss` rendering of a call duration.
pub fn format_duration(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

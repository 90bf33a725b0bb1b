//! The UI thread: runs tasks posted by the synchronizer, in order.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use vportsync_core::UiDispatcher;
use vportsync_core::event::UiTask;

enum Msg {
    Run(UiTask),
    Quit,
}

/// Handle for posting onto the UI thread.
pub struct UiHandle {
    tx: mpsc::Sender<Msg>,
}

impl UiDispatcher for UiHandle {
    fn post(&self, task: UiTask) {
        if self.tx.send(Msg::Run(task)).is_err() {
            log::debug!("ui: thread gone, dropping task");
        }
    }
}

/// Owns the UI thread. Tasks still queued at `shutdown` run before it
/// returns.
pub struct UiThread {
    tx: mpsc::Sender<Msg>,
    thread: Option<JoinHandle<usize>>,
}

impl UiThread {
    pub fn spawn() -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Msg>();
        let thread = thread::Builder::new().name("ui".into()).spawn(move || {
            let mut ran = 0;
            while let Ok(Msg::Run(task)) = rx.recv() {
                task();
                ran += 1;
            }
            ran
        })?;
        Ok(Self {
            tx,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> UiHandle {
        UiHandle {
            tx: self.tx.clone(),
        }
    }

    /// Stop the thread and return how many tasks it ran.
    pub fn shutdown(mut self) -> usize {
        let _ = self.tx.send(Msg::Quit);
        self.thread
            .take()
            .and_then(|t| t.join().ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use vportsync_core::UiDispatcher;

    use super::UiThread;

    #[test]
    fn posted_tasks_run_in_order_before_shutdown() {
        let ui = UiThread::spawn().unwrap();
        let handle = ui.handle();
        let seen = Arc::new(AtomicUsize::new(0));
        for i in 0..10 {
            let seen = Arc::clone(&seen);
            handle.post(Box::new(move || {
                assert_eq!(seen.fetch_add(1, Ordering::SeqCst), i);
            }));
        }
        assert_eq!(ui.shutdown(), 10);
        assert_eq!(seen.load(Ordering::SeqCst), 10);
    }
}

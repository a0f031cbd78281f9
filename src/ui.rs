// UI-affine execution context for print UI calls

use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread::JoinHandle;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use crate::errors::PrintError;

pub const UI_THREAD_NAME: &str = "print-ui";

type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// A dedicated thread that runs every print UI interaction in submission order.
pub struct UiContext {
    sender: Mutex<Option<mpsc::Sender<UiTask>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl UiContext {
    pub fn spawn() -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<UiTask>();
        let thread = std::thread::Builder::new()
            .name(UI_THREAD_NAME.to_string())
            .spawn(move || {
                debug!("Print UI context started");
                while let Ok(task) = receiver.recv() {
                    if catch_unwind(AssertUnwindSafe(task)).is_err() {
                        error!("Print UI task panicked");
                    }
                }
                debug!("Print UI context stopped");
            })?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Runs `f` on the UI thread and waits for its result.
    pub async fn run<F, T>(&self, f: F) -> Result<T, PrintError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let task: UiTask = Box::new(move || {
            let _ = tx.send(f());
        });

        {
            let sender = self.sender.lock();
            let sender = sender.as_ref().ok_or_else(|| {
                PrintError::PrintSubsystem("print UI context has shut down".to_string())
            })?;
            sender.send(task).map_err(|_| {
                PrintError::PrintSubsystem("print UI context has shut down".to_string())
            })?;
        }

        rx.await
            .map_err(|_| PrintError::PrintSubsystem("print UI task did not finish".to_string()))
    }

    /// Stops accepting work and waits for queued tasks to drain.
    pub fn shutdown(&self) {
        self.sender.lock().take();
        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                warn!("Print UI thread exited abnormally");
            }
        }
    }
}

impl Drop for UiContext {
    fn drop(&mut self) {
        // Detach: the thread exits once the channel closes.
        self.sender.get_mut().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tasks_run_on_ui_thread() {
        let ui = UiContext::spawn().expect("spawn ui thread");
        let name = ui
            .run(|| std::thread::current().name().map(str::to_string))
            .await
            .expect("task runs");
        assert_eq!(name.as_deref(), Some(UI_THREAD_NAME));
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_kill_context() {
        let ui = UiContext::spawn().expect("spawn ui thread");
        let result = ui.run(|| -> u32 { panic!("boom") }).await;
        assert!(matches!(result, Err(PrintError::PrintSubsystem(_))));

        assert_eq!(ui.run(|| 7).await, Ok(7));
    }

    #[tokio::test]
    async fn test_run_after_shutdown_fails() {
        let ui = UiContext::spawn().expect("spawn ui thread");
        ui.shutdown();
        assert!(matches!(
            ui.run(|| ()).await,
            Err(PrintError::PrintSubsystem(_))
        ));
    }
}

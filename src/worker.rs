// Background analysis worker
//
// The analysis core is synchronous; this adapter runs one job on a worker
// thread and streams progress back over a channel so a UI event loop can
// poll it without blocking. Cancellation is the cooperative flag the
// analysis loops already poll.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{unbounded, Receiver, Sender};
use log::{error, info};

use crate::error::SliceError;

/// Messages a running job emits toward the UI side.
#[derive(Debug)]
pub enum AnalysisEvent<T> {
    Progress { current: usize, total: usize },
    Finished(T),
    Failed(String),
}

/// Handle to one in-flight analysis job.
pub struct AnalysisHandle<T> {
    events: Receiver<AnalysisEvent<T>>,
    cancel: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl<T> AnalysisHandle<T> {
    /// Event stream; ends after `Finished` or `Failed`.
    pub fn events(&self) -> &Receiver<AnalysisEvent<T>> {
        &self.events
    }

    /// Request cooperative cancellation. The job stops at its next segment
    /// boundary; an embedding call already in flight cannot be interrupted.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Wait for the worker thread to exit.
    pub fn join(mut self) {
        if let Some(handle) = self.join.take() {
            let _ = handle.join();
        }
    }
}

/// Run `job` on a worker thread.
///
/// The job receives the cancel flag and a progress sink; whatever it
/// reports is forwarded as [`AnalysisEvent::Progress`].
pub fn spawn<T, F>(job: F) -> AnalysisHandle<T>
where
    T: Send + 'static,
    F: FnOnce(&AtomicBool, &mut dyn FnMut(usize, usize)) -> Result<T, SliceError> + Send + 'static,
{
    let (tx, rx): (Sender<AnalysisEvent<T>>, Receiver<AnalysisEvent<T>>) = unbounded();
    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_for_job = cancel.clone();

    let handle = std::thread::spawn(move || {
        let progress_tx = tx.clone();
        let mut report = move |current: usize, total: usize| {
            let _ = progress_tx.send(AnalysisEvent::Progress { current, total });
        };

        match job(&cancel_for_job, &mut report) {
            Ok(value) => {
                info!("Analysis job finished");
                let _ = tx.send(AnalysisEvent::Finished(value));
            }
            Err(e) => {
                error!("Analysis job failed: {}", e);
                let _ = tx.send(AnalysisEvent::Failed(e.to_string()));
            }
        }
    });

    AnalysisHandle {
        events: rx,
        cancel,
        join: Some(handle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwards_progress_then_result() {
        let handle = spawn(|_cancel, report| {
            for i in 1..=3 {
                report(i, 3);
            }
            Ok(42u32)
        });

        let mut progress = Vec::new();
        let mut finished = None;
        for event in handle.events().iter() {
            match event {
                AnalysisEvent::Progress { current, total } => progress.push((current, total)),
                AnalysisEvent::Finished(v) => {
                    finished = Some(v);
                    break;
                }
                AnalysisEvent::Failed(e) => panic!("unexpected failure: {}", e),
            }
        }

        assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
        assert_eq!(finished, Some(42));
        handle.join();
    }

    #[test]
    fn failures_become_events() {
        let handle = spawn::<u32, _>(|_cancel, _report| {
            Err(SliceError::InsufficientData)
        });

        match handle.events().recv().unwrap() {
            AnalysisEvent::Failed(message) => {
                assert!(message.contains("long enough"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        handle.join();
    }

    #[test]
    fn cancellation_reaches_the_job() {
        let handle = spawn(|cancel, _report| {
            while !cancel.load(Ordering::Relaxed) {
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
            Ok("stopped".to_string())
        });

        handle.cancel();
        match handle.events().recv().unwrap() {
            AnalysisEvent::Finished(v) => assert_eq!(v, "stopped"),
            other => panic!("expected finish, got {:?}", other),
        }
        handle.join();
    }
}

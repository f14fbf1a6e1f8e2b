//! Graph-wide stop request.
//!
//! Components poll [`StopSignal::is_running`] between records. Threads blocked
//! on a port select on [`StopSignal::cancelled`] as well: stopping drops the
//! only sender of that channel, which makes every receiver ready at once.

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Owner side: requests the stop.
#[derive(Debug)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
    cancel_tx: Mutex<Option<Sender<()>>>,
}

/// Observer side, cloned into every component and port.
#[derive(Debug, Clone)]
pub struct StopSignal {
    running: Arc<AtomicBool>,
    cancel_rx: Receiver<()>,
}

/// Create a connected handle/signal pair in the running state.
pub fn stop_pair() -> (StopHandle, StopSignal) {
    let running = Arc::new(AtomicBool::new(true));
    let (cancel_tx, cancel_rx) = crossbeam_channel::bounded(0);
    (
        StopHandle {
            running: Arc::clone(&running),
            cancel_tx: Mutex::new(Some(cancel_tx)),
        },
        StopSignal { running, cancel_rx },
    )
}

impl StopHandle {
    /// Request a stop. Idempotent.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.cancel_tx.lock().take();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl StopSignal {
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Receiver that becomes ready (disconnected) once a stop is requested.
    pub fn cancelled(&self) -> &Receiver<()> {
        &self.cancel_rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_stop_wakes_receivers() {
        let (handle, signal) = stop_pair();
        assert!(signal.is_running());
        assert!(signal
            .cancelled()
            .recv_timeout(Duration::from_millis(10))
            .is_err());

        let observer = signal.clone();
        let waiter = std::thread::spawn(move || observer.cancelled().recv().is_err());
        handle.stop();
        handle.stop();
        assert!(waiter.join().unwrap());
        assert!(!signal.is_running());
    }
}

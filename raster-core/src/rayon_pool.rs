//! `WorkerPool` backed by `rayon`'s global thread pool — the "process/thread
//! pool" `spec.md` §1/§6 treats as an external collaborator, with only the
//! "submit a task, receive completion" contract in scope.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

use raster_contracts::error::ContractError;
use raster_contracts::pool::{TaskHandle, WorkerPool};

/// Every `RayonPool` instance shares rayon's single global thread pool; the
/// distinct instances the scheduler builds (one per named pool: compute,
/// resample, cache_extract, read) exist only to give each kind its own
/// in-flight counter and `PoolActor` capacity, not a separate set of
/// threads.
#[derive(Clone, Default)]
pub struct RayonPool {
    in_flight: Arc<AtomicUsize>,
}

impl RayonPool {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct RayonTaskHandle<T> {
    rx: Receiver<Result<T, ContractError>>,
    finished: bool,
}

impl<T: Send> TaskHandle<T> for RayonTaskHandle<T> {
    fn poll(&mut self) -> Option<Result<T, ContractError>> {
        if self.finished {
            return None;
        }
        match self.rx.try_recv() {
            Ok(result) => {
                self.finished = true;
                Some(result)
            }
            Err(_) => None,
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

impl WorkerPool for RayonPool {
    type Handle<T: Send + 'static> = RayonTaskHandle<T>;

    fn spawn<T, F>(&self, job: F) -> Self::Handle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, ContractError> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let in_flight = self.in_flight.clone();
        in_flight.fetch_add(1, Ordering::SeqCst);
        rayon::spawn(move || {
            let result = job();
            let _ = tx.send(result);
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });
        RayonTaskHandle {
            rx,
            finished: false,
        }
    }

    fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

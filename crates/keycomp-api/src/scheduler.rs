//! Single-flight gate: at most one composition runs at a time.
//!
//! A second request while one is in flight is rejected immediately rather
//! than queued. The gate is released when the [`FlightPermit`] drops, which
//! covers success, error returns and unwinding alike.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// One-slot admission gate.
#[derive(Debug)]
pub struct SingleFlight {
    semaphore: Arc<Semaphore>,
}

impl Default for SingleFlight {
    fn default() -> Self {
        Self::new()
    }
}

impl SingleFlight {
    pub fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
        }
    }

    /// Take the gate if it is free. Never waits.
    pub fn try_acquire(&self) -> Option<FlightPermit> {
        let permit = Arc::clone(&self.semaphore).try_acquire_owned().ok()?;
        debug!("Single-flight gate acquired");
        Some(FlightPermit {
            _permit: permit,
            acquired_at: Instant::now(),
        })
    }

    /// Whether a composition is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.semaphore.available_permits() == 0
    }
}

/// Proof of holding the gate.
#[derive(Debug)]
pub struct FlightPermit {
    _permit: OwnedSemaphorePermit,
    acquired_at: Instant,
}

impl FlightPermit {
    /// Seconds since the gate was taken.
    pub fn held_secs(&self) -> f64 {
        self.acquired_at.elapsed().as_secs_f64()
    }
}

impl Drop for FlightPermit {
    fn drop(&mut self) {
        debug!(held_secs = self.held_secs(), "Single-flight gate released");
    }
}

// src/guard.rs
//! Non-blocking single-flight guard: a second caller is turned away instead of
//! queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::AlreadyRunning;

#[derive(Debug, Clone)]
pub struct SingleFlight {
    name: &'static str,
    busy: Arc<AtomicBool>,
}

/// Held for the duration of a run; dropping it frees the guard, also on panic.
#[derive(Debug)]
pub struct FlightPermit {
    busy: Arc<AtomicBool>,
}

impl SingleFlight {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn try_acquire(&self) -> Result<FlightPermit, AlreadyRunning> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| FlightPermit {
                busy: Arc::clone(&self.busy),
            })
            .map_err(|_| AlreadyRunning(self.name))
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for FlightPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_released() {
        let g = SingleFlight::new("ingest");
        let p = g.try_acquire().unwrap();
        assert!(g.is_busy());
        assert_eq!(g.try_acquire().unwrap_err(), AlreadyRunning("ingest"));
        drop(p);
        assert!(!g.is_busy());
        assert!(g.try_acquire().is_ok());
    }
}

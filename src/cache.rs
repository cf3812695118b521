//! In-memory result cache with compute-once semantics.
//!
//! Results are keyed by experiment name. While one thread computes a
//! key, the key is marked in flight; a second caller asking for the
//! same key gets [`SimulationError::AlreadyComputing`] instead of
//! duplicating the run. The producer runs outside the map lock, so
//! slow simulations never block lookups of other keys.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::SimulationError;
use crate::simulation::SimulationResult;

enum Entry {
    InFlight,
    Ready(Arc<SimulationResult>),
}

/// Shared cache of completed simulation results.
///
/// Cloning is cheap; clones share the same underlying map.
#[derive(Clone, Default)]
pub struct SimulationCache {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl SimulationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached result for `key`, if one is ready.
    pub fn get(&self, key: &str) -> Option<Arc<SimulationResult>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some(Entry::Ready(result)) => Some(Arc::clone(result)),
            _ => None,
        }
    }

    /// Stores a result, replacing any previous entry for the key.
    pub fn put(&self, key: impl Into<String>, result: SimulationResult) -> Arc<SimulationResult> {
        let result = Arc::new(result);
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.into(), Entry::Ready(Arc::clone(&result)));
        result
    }

    /// Removes the entry for `key`, returning the result if one was
    /// ready.
    pub fn invalidate(&self, key: &str) -> Option<Arc<SimulationResult>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.remove(key) {
            Some(Entry::Ready(result)) => Some(result),
            _ => None,
        }
    }

    /// Returns the cached result for `key`, or runs `producer` to
    /// compute it.
    ///
    /// At most one producer runs per key at a time. A caller that finds
    /// the key in flight gets [`SimulationError::AlreadyComputing`]
    /// without waiting; retrying after the first caller finishes hits
    /// the cache. If the producer fails, the in-flight mark is cleared
    /// so the key can be retried.
    pub fn compute_or_get<F>(
        &self,
        key: &str,
        producer: F,
    ) -> Result<Arc<SimulationResult>, SimulationError>
    where
        F: FnOnce() -> Result<SimulationResult, SimulationError>,
    {
        {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            match entries.get(key) {
                Some(Entry::Ready(result)) => return Ok(Arc::clone(result)),
                Some(Entry::InFlight) => {
                    return Err(SimulationError::AlreadyComputing(key.to_string()))
                }
                None => {
                    entries.insert(key.to_string(), Entry::InFlight);
                }
            }
        }

        match producer() {
            Ok(result) => {
                let result = Arc::new(result);
                let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
                entries.insert(key.to_string(), Entry::Ready(Arc::clone(&result)));
                Ok(result)
            }
            Err(err) => {
                let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
                entries.remove(key);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::RegionSpec;
    use crate::load::LoadSpec;
    use crate::simulation::{run_simulation, ExperimentConfig, RunOptions};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;

    fn small_config(name: &str) -> ExperimentConfig {
        let mut config = ExperimentConfig::new(
            name,
            LoadSpec::disk(10_000.0, 100.0, 1000.0),
            RegionSpec {
                center_lat: 0.0,
                center_lon: 0.0,
                width_km: 50.0,
                height_km: 50.0,
                resolution_km: 10.0,
            },
        );
        config.time_steps = 3;
        config
    }

    #[test]
    fn test_compute_once_then_hit() {
        let cache = SimulationCache::new();
        let config = small_config("once");
        let runs = AtomicUsize::new(0);

        let first = cache
            .compute_or_get("once", || {
                runs.fetch_add(1, Ordering::SeqCst);
                run_simulation(&config, &RunOptions::default())
            })
            .unwrap();
        let second = cache
            .compute_or_get("once", || {
                runs.fetch_add(1, Ordering::SeqCst);
                run_simulation(&config, &RunOptions::default())
            })
            .unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_failed_producer_clears_in_flight_mark() {
        let cache = SimulationCache::new();
        let err = cache.compute_or_get("flaky", || {
            Err(SimulationError::NumericalGuard("induced failure".to_string()))
        });
        assert!(err.is_err());

        // The key is retryable after a failure.
        let config = small_config("flaky");
        let result = cache.compute_or_get("flaky", || {
            run_simulation(&config, &RunOptions::default())
        });
        assert!(result.is_ok());
    }

    #[test]
    fn test_concurrent_caller_sees_already_computing() {
        let cache = SimulationCache::new();
        let config = small_config("race");

        // Hold the key in flight until told to finish.
        let (enter_tx, enter_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let worker_cache = cache.clone();
        let worker = thread::spawn(move || {
            worker_cache.compute_or_get("race", || {
                enter_tx.send(()).ok();
                release_rx.recv().ok();
                run_simulation(&config, &RunOptions::default())
            })
        });

        enter_rx.recv().unwrap();
        match cache.compute_or_get("race", || unreachable!("producer must not run")) {
            Err(SimulationError::AlreadyComputing(key)) => assert_eq!(key, "race"),
            other => panic!("expected AlreadyComputing, got {:?}", other.map(|_| ())),
        }

        release_tx.send(()).unwrap();
        worker.join().unwrap().unwrap();
        assert!(cache.get("race").is_some());
    }

    #[test]
    fn test_invalidate_forces_recompute() {
        let cache = SimulationCache::new();
        let config = small_config("stale");
        cache
            .compute_or_get("stale", || run_simulation(&config, &RunOptions::default()))
            .unwrap();
        assert!(cache.invalidate("stale").is_some());
        assert!(cache.get("stale").is_none());
    }
}

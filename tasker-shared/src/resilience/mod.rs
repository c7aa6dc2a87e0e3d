//! Circuit breaker for fallible external services (LLM, embeddings).
//! Grounded in the teacher's `resilience::CircuitBreakerBehavior` seam,
//! generalized to a single concrete implementation since this kernel has
//! one breaker shape rather than the teacher's per-subsystem family.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CircuitBreakerMetrics {
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub total_failures: u64,
    pub total_successes: u64,
}

struct StateHolder {
    state: CircuitState,
    opened_at: Option<Instant>,
}

/// Unified interface any caller protecting an unreliable operation can
/// depend on (LLM completion, embedding calls, ...).
pub trait CircuitBreakerBehavior: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;
    fn state(&self) -> CircuitState;
    fn should_allow(&self) -> bool;
    fn record_success(&self, duration: Duration);
    fn record_failure(&self, duration: Duration);
    fn is_healthy(&self) -> bool;
    fn force_open(&self);
    fn force_closed(&self);
    fn metrics(&self) -> CircuitBreakerMetrics;
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<StateHolder>,
    consecutive_failures: AtomicU32,
    consecutive_successes: AtomicU32,
    total_failures: AtomicU64,
    total_successes: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(StateHolder {
                state: CircuitState::Closed,
                opened_at: None,
            }),
            consecutive_failures: AtomicU32::new(0),
            consecutive_successes: AtomicU32::new(0),
            total_failures: AtomicU64::new(0),
            total_successes: AtomicU64::new(0),
        }
    }
}

impl CircuitBreakerBehavior for CircuitBreaker {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> CircuitState {
        self.state.lock().unwrap().state
    }

    fn should_allow(&self) -> bool {
        let mut guard = self.state.lock().unwrap();
        match guard.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = guard.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.config.timeout {
                    guard.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_success(&self, _duration: Duration) {
        self.total_successes.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;

        let mut guard = self.state.lock().unwrap();
        if guard.state == CircuitState::HalfOpen && successes >= self.config.success_threshold {
            guard.state = CircuitState::Closed;
            guard.opened_at = None;
            self.consecutive_successes.store(0, Ordering::Relaxed);
        }
    }

    fn record_failure(&self, _duration: Duration) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        self.consecutive_successes.store(0, Ordering::Relaxed);
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;

        let mut guard = self.state.lock().unwrap();
        if failures >= self.config.failure_threshold {
            guard.state = CircuitState::Open;
            guard.opened_at = Some(Instant::now());
        }
    }

    fn is_healthy(&self) -> bool {
        self.state() != CircuitState::Open
    }

    fn force_open(&self) {
        let mut guard = self.state.lock().unwrap();
        guard.state = CircuitState::Open;
        guard.opened_at = Some(Instant::now());
    }

    fn force_closed(&self) {
        let mut guard = self.state.lock().unwrap();
        guard.state = CircuitState::Closed;
        guard.opened_at = None;
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    fn metrics(&self) -> CircuitBreakerMetrics {
        CircuitBreakerMetrics {
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            consecutive_successes: self.consecutive_successes.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            total_successes: self.total_successes.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_failures() {
        let cb = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 3,
                ..Default::default()
            },
        );
        assert!(cb.should_allow());
        for _ in 0..3 {
            cb.record_failure(Duration::from_millis(1));
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.should_allow());
    }

    #[test]
    fn object_safe() {
        fn _assert(_: &dyn CircuitBreakerBehavior) {}
    }
}

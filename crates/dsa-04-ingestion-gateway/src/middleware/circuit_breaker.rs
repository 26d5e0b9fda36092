//! Circuit breaker around block store calls.
//!
//! ```text
//!   CLOSED --failure_threshold consecutive failures--> OPEN
//!   OPEN --open_timeout elapsed, next call probes--> HALF-OPEN
//!   HALF-OPEN --success_threshold successes--> CLOSED
//!   HALF-OPEN --any failure--> OPEN
//! ```
//!
//! While open, lookups fail fast and `Admit` applies its store fallback
//! instead of waiting out the op timeout on every request.

use crate::domain::config::CircuitBreakerConfig;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through
    Closed,
    /// Calls are rejected immediately
    Open,
    /// Probing whether the store recovered
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

struct Circuit {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    opened_at: Option<Instant>,
}

pub struct CircuitBreaker {
    name: &'static str,
    config: CircuitBreakerConfig,
    circuit: Mutex<Circuit>,
    rejected: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            config,
            circuit: Mutex::new(Circuit {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                opened_at: None,
            }),
            rejected: AtomicU64::new(0),
        }
    }

    /// Whether a call to the dependency may proceed.
    pub fn should_allow(&self) -> bool {
        if !self.config.enabled {
            return true;
        }

        let mut circuit = self.circuit.lock();
        match circuit.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = circuit.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.config.open_timeout {
                    info!(circuit = self.name, "[dsa-04] Circuit breaker half-open, probing");
                    circuit.state = CircuitState::HalfOpen;
                    circuit.half_open_successes = 0;
                    true
                } else {
                    self.rejected.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        circuit = self.name,
                        remaining_ms = (self.config.open_timeout - elapsed).as_millis() as u64,
                        "[dsa-04] Circuit breaker open, rejecting call"
                    );
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        if !self.config.enabled {
            return;
        }

        let mut circuit = self.circuit.lock();
        match circuit.state {
            CircuitState::Closed => circuit.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                circuit.half_open_successes += 1;
                if circuit.half_open_successes >= self.config.success_threshold {
                    info!(
                        circuit = self.name,
                        successes = circuit.half_open_successes,
                        "[dsa-04] Circuit breaker closed after successful probes"
                    );
                    circuit.state = CircuitState::Closed;
                    circuit.consecutive_failures = 0;
                    circuit.opened_at = None;
                }
            }
            // A call admitted before the circuit opened finished late.
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        if !self.config.enabled {
            return;
        }

        let mut circuit = self.circuit.lock();
        match circuit.state {
            CircuitState::Closed => {
                circuit.consecutive_failures += 1;
                if circuit.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        circuit = self.name,
                        failures = circuit.consecutive_failures,
                        open_ms = self.config.open_timeout.as_millis() as u64,
                        "[dsa-04] Circuit breaker opened"
                    );
                    circuit.state = CircuitState::Open;
                    circuit.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                warn!(circuit = self.name, "[dsa-04] Circuit breaker reopened after failed probe");
                circuit.state = CircuitState::Open;
                circuit.opened_at = Some(Instant::now());
                circuit.half_open_successes = 0;
            }
            CircuitState::Open => circuit.opened_at = Some(Instant::now()),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.circuit.lock().state
    }

    /// Calls rejected while open.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

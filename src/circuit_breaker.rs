use failsafe::{backoff, failure_policy, Config, StateMachine};
use std::time::Duration;

/// Circuit breaker guarding the language-model endpoint.
pub type ModelCircuitBreaker =
    StateMachine<failure_policy::ConsecutiveFailures<backoff::Exponential>, ()>;

/// Creates the circuit breaker shared by every language-model call.
///
/// # Configuration
///
/// - **Failure threshold**: 5 consecutive failed attempts open the circuit.
/// - **Backoff**: exponential from 10s to 60s before a trial call is let through.
///
/// While open, calls fail fast with `failsafe::Error::Rejected`, which the model client
/// reports as the model being unavailable instead of waiting out another timeout.
pub fn create_model_circuit_breaker() -> ModelCircuitBreaker {
    let backoff_strategy = backoff::exponential(Duration::from_secs(10), Duration::from_secs(60));

    let failure_policy = failure_policy::consecutive_failures(5, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}

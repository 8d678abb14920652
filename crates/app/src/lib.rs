//! # homeflow-app
//!
//! Application layer — the automation engine and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `AutomationRegistry` — key/value access to persisted automations
//!   - `MessagePublisher` — publish outbound bus messages
//!   - `Clock` — wall-clock time for run records and time conditions
//! - Hold the in-memory state the engine evaluates against:
//!   - `AutomationStore` — enabled automations, hot-reloaded
//!   - `DeviceStateCache` — last known attributes per device
//! - Run automations:
//!   - `AutomationEngine` — ingest inbound messages, select candidates
//!   - `Evaluator` — trigger → conditions → actions → run record
//!   - `ActionExecutor` — turn actions into outbound messages
//!   - `EvaluationRunner` — bounded, drainable fan-out of evaluations
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `homeflow-domain` only (plus `tokio` for tasks and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod device_cache;
pub mod engine;
pub mod evaluator;
pub mod event_bus;
pub mod executor;
pub mod ports;
pub mod runner;
pub mod store;

#[cfg(test)]
mod testing;

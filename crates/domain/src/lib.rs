//! # homeflow-domain
//!
//! Pure domain model for the homeflow automation engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **attribute values** and the lenient comparison rules between them
//! - Define **device state** (last-known attributes per device)
//! - Define **automations** (trigger → condition → action rules) and the
//!   matching logic for triggers and conditions
//! - Define the **bus messages** the engine consumes and produces
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod automation;
pub mod device_state;
pub mod event;
pub mod message;
pub mod value;

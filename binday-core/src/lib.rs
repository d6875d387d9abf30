//! Core types and service wiring for the binday bin collection lookup.

/// Browser capability abstraction used by the form automation.
pub mod browser;
/// Bin label classification into collection colors.
pub mod classify;
/// Results grid parsing.
pub mod extract;
/// Placeholder schedules used when nothing better is available.
pub mod fallback;
/// State machine driving the public collection-day form.
pub mod form;
/// Domain models shared by all crates.
pub mod model;
/// Traits describing the collaborators and the error taxonomy.
pub mod ports;
/// High-level lookup service used by clients.
pub mod service;
/// Scoped browser sessions and the scrape pipeline built on them.
pub mod session;
/// SQLite-backed schedule cache.
pub mod store;
/// Bounded polling for observable page state.
pub mod wait;

#[cfg(test)]
mod testing;

pub use browser::*;
pub use model::*;
pub use ports::*;
pub use service::*;

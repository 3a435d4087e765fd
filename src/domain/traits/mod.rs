//! Domain traits - Abstractions for infrastructure implementations

pub mod transport;
pub mod store;

pub use transport::{Transport, EventStream};
pub use store::{Store, Params, Row};

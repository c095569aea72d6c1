//! Dependency graph resolution.
//!
//! Factories are registered under unique names in a [`Registry`] and linked
//! by dependency edges, optionally guarded by [`Condition`]s over the request
//! parameters. Cycles are rejected when the closing edge is added.
//!
//! A frozen [`Quarry`] resolves a requested name by running its dependencies
//! concurrently (one task per edge), each factory at most once per request,
//! and returns the requested value or the first failure. A failure cancels
//! the request's token so that the remaining branches stop early.
//!
//! [`provider`] and [`singleton`] wrap values and computations whose lifetime
//! differs from a single request.

pub mod condition;
pub mod factory;
pub mod registry;
pub mod resolver;
mod session;

pub use condition::{check_conditions, condition, Condition};
pub use factory::{factory, provider, singleton, Factory, FactoryFuture};
pub use registry::Registry;
pub use resolver::Quarry;

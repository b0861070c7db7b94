//! Application layer: the `OrderEngine` and the locking that serializes its
//! mutations.
//!
//! Each operation resolves collaborators first, then takes its locks in the
//! order day gate, order, customer, and persists loyalty entries before the
//! order so a retried call never credits twice.

pub mod closure;
pub mod engine;
pub mod lifecycle;
pub mod locks;
pub mod payments;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{Collaborators, NewItem, NewOrder, OrderEngine, Stores};
pub use payments::RefundReceipt;

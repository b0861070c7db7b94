//! Domain model: value objects, aggregates and the pure rules that govern
//! them. Nothing in here performs I/O; persistence and collaborators are
//! reached through the traits in [`ports`].

pub mod catalog;
pub mod closure;
pub mod evaluator;
pub mod loyalty;
pub mod money;
pub mod order;
pub mod payment;
pub mod ports;
pub mod promotion;

//! Gantry Graph - the action graph model
//!
//! Actions are declared units of trackable work with explicit parent
//! dependencies and output artifact names. This crate provides the action
//! trait, graph construction (parents-first, so cycles cannot be expressed),
//! and name-substring selection with ancestor closure.

pub mod action;
pub mod builder;
pub mod graph;
pub mod select;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use action::Action;
pub use builder::ActionBuilder;
pub use graph::{ActionGraph, ActionHandle, ActionNode, GraphBuilder};
pub use select::{select, Selection};

//! Small async helpers shared between the `depinfo` crates.
//!
//! Runtime-agnostic: everything here is built on [`futures`] and never spawns
//! tasks, so it works the same under Tokio, `async-std` or a plain executor.

mod bounded;

pub use crate::bounded::{Aborted, try_join_bounded};

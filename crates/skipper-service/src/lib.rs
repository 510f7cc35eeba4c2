//! Service descriptor compilation for skipper
//!
//! This crate compiles a `ServiceSpec` into a `ServiceDescriptor`:
//!
//! - **Identity**: execution role with baseline grants plus caller fragments
//! - **Network**: per-service isolation boundary
//! - **Secrets**: secret names bound to store references, never values
//! - **Task**: the immutable container spec and its startup command
//! - **Deployment**: rollout bounds from the selected strategy
//! - **Compiler**: orders the above and assembles the descriptor

#![deny(missing_docs)]

pub mod compiler;
pub mod deployment;
pub mod identity;
pub mod lookup;
pub mod network;
pub mod secrets;
pub mod task;

// Bridge skipper_common types into this crate's namespace.
// Internal modules use `crate::spec`, `crate::runtime`, etc.
pub(crate) use skipper_common::{runtime, spec, Error, Result};

pub use compiler::{ServiceComposer, ServiceDescriptor};

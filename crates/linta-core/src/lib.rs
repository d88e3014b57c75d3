//! Least-privilege checks for GitHub Actions workflow permissions.
//!
//! A workflow is walked job by job (following local reusable-workflow calls);
//! every job's declared `permissions:` are compared with what the actions it
//! invokes require according to a [`config::Config`] mapping.

pub mod collect;
pub mod compare;
pub mod config;
pub mod derive;
pub mod diagnostics;
pub mod error;
pub mod lint;
pub mod permissions;
pub mod scope;
pub mod source_map;
pub mod walker;
pub mod workflow;

pub use error::{Error, Result};

//! Stage views of CI builds and arbitration of pending approvals.
//!
//! The [`engine`] reconstructs a [`view::BuildView`] from a build's execution
//! graph and exposes exactly-once submit/abort over its approvals. The
//! [`store`] module provides a file-backed implementation of the collaborators
//! the engine consumes.

pub mod build_ref;
pub mod config;
pub mod engine;
pub mod error;
pub mod output;
pub mod store;
pub mod view;

pub use build_ref::BuildRef;
pub use error::{Result, StageViewError};
pub use view::{BuildView, Stage, StageStatus};

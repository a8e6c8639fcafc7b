//! Request handler module
//!
//! Request routing dispatch and static asset serving.

pub mod router;
pub mod static_files;

// Re-export main entry point
pub use router::{dispatch, handle_request, Stage};

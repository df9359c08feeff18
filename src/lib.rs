//! Contact Handler Library
//!
//! Builds, identifies, persists and serializes the contact constraints that
//! couple two colliding bodies inside a constraint-based dynamics solver.

pub mod body;
pub mod config;
pub mod contact;
pub mod error;
pub mod io;
pub mod mesh;

pub use error::{ContactError, Result};

//! Error types for the contact handler
//!
//! Expected steady-state outcomes (separating contacts, duplicate candidates,
//! attachment-vetoed or uncontrollable constraints) are not errors and never
//! show up here. This module only covers configuration bugs, bad arguments
//! from the solver side, and corrupted checkpoint data.

use crate::contact::CollisionMethod;
use thiserror::Error;

/// Error types for contact constraint operations
#[derive(Error, Debug)]
pub enum ContactError {
    /// The handler was asked to compute constraints with a method that has
    /// no builder
    ///
    /// This is a configuration bug, not something a caller can recover from.
    #[error("Unimplemented collision method: {0:?}")]
    UnsupportedMethod(CollisionMethod),

    /// An argument was outside its valid range
    ///
    /// Raised for body/mesh indices other than 0 or 1 and for solver vectors
    /// too short to hold this handler's rows.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Auxiliary state data was truncated or malformed
    #[error("Invalid contact state: {0}")]
    StateError(String),

    /// Configuration error
    ///
    /// Invalid configuration file format, missing required fields,
    /// or invalid parameter values.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Geometric computation error
    ///
    /// Errors during geometric computations such as degenerate faces
    /// (zero-area or zero-length normals).
    #[error("Geometry error: {0}")]
    GeometryError(String),
}

/// Convenience type alias for Results with [`ContactError`]
///
/// # Example
/// ```
/// use contact_handler::Result;
///
/// fn my_function() -> Result<()> {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, ContactError>;

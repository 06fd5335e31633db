//! Error types for ntpfleet

use thiserror::Error;

/// ntpfleet error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed input to a command parameter
    #[error("Validation error: {message}")]
    Validation {
        /// Error message
        message: String,
    },

    /// The requested instance's namespace already exists
    #[error("Resource conflict: namespace '{namespace}' already exists")]
    ResourceConflict {
        /// Namespace name that collided
        namespace: String,
    },

    /// The external server executable cannot be located
    #[error("Dependency missing: '{program}' executable not found")]
    DependencyMissing {
        /// Program that was searched for
        program: String,
    },

    /// The server process could not be confirmed running
    #[error("Server process failed to start in namespace '{namespace}'")]
    ProcessStartFailure {
        /// Namespace the launch targeted
        namespace: String,
        /// Log content captured up to the failure, for diagnosis
        log: String,
    },

    /// The requested instance has no live namespace
    #[error("Instance {id} does not exist")]
    InstanceNotFound {
        /// Instance id that was looked up
        id: u32,
    },

    /// Missing required privilege
    #[error("Permission denied: {operation}")]
    PermissionDenied {
        /// Operation that was denied
        operation: String,
    },

    /// An underlying network-configuration command failed
    #[error("Network error: {message}")]
    Network {
        /// Error message
        message: String,
    },

    /// System error from nix
    #[error("System error: {0}")]
    System(#[from] nix::Error),
}

/// Result type alias for ntpfleet operations
pub type Result<T> = std::result::Result<T, Error>;

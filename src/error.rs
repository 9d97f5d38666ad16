/// Error handling module for the panel.
///
/// This module defines the error types used throughout the library.
/// Synchronous request failures (`ServerNotFound`, `InvalidConfig`, `PortInUse`,
/// `IllegalTransition`) are returned to callers directly. Runtime failures that
/// occur after an operation was accepted are recorded against the entity instead.
///
/// # Example
///
/// ```
/// use mc_panel::error::{Error, Result};
///
/// fn handle_error(result: Result<()>) {
///     match result {
///         Ok(_) => println!("Operation succeeded"),
///         Err(Error::ServerNotFound(id)) => println!("Server '{}' does not exist", id),
///         Err(Error::IllegalTransition { from, action, .. }) => {
///             println!("Cannot {} a server that is {}", action, from)
///         }
///         Err(e) => println!("Other error: {}", e),
///     }
/// }
/// ```
use crate::server::ServerStatus;
use thiserror::Error;

/// Errors that can occur in the mc-panel library.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read or parse a configuration file.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration or a creation request contains missing or invalid values.
    ///
    /// This error occurs when:
    /// - A create request lacks a name, version, memory limit or port
    /// - A panel configuration section holds an empty or zero value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No server entity exists with the given identifier.
    #[error("Server not found: {0}")]
    ServerNotFound(String),

    /// Another active server already claims the port.
    #[error("Port {0} is already in use by another active server")]
    PortInUse(u16),

    /// The requested transition is not legal from the entity's current status.
    #[error("Cannot {action} server {id} while it is {from}")]
    IllegalTransition {
        /// Server identifier
        id: String,
        /// Status observed when the request was validated
        from: ServerStatus,
        /// Requested action (`start`, `stop`)
        action: &'static str,
    },

    /// The container engine cannot be reached.
    ///
    /// This error occurs when:
    /// - The engine binary is not installed or not on the PATH
    /// - The engine daemon is not running or refuses the connection
    #[error("Container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// A container with the derived name exists and could not be replaced.
    #[error("Conflicting container name: {0}")]
    ConflictingName(String),

    /// The engine refused the container for lack of a host resource
    /// (port binding, memory, disk).
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The engine has no container for the given server.
    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    /// The engine reported a failure while creating or starting a container.
    #[error("Launch failed: {0}")]
    LaunchFailed(String),

    /// The engine reported a failure while stopping or removing a container.
    #[error("Terminate failed: {0}")]
    TerminateFailed(String),

    /// An asynchronous phase or an engine call exceeded its bound.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// A reading is not available (for example the container is not running).
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// The state store failed to read or persist records.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Data could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Creating the on-disk server artifacts failed.
    #[error("Provisioning failed: {0}")]
    Provision(String),

    /// Any other error not covered by the above categories.
    #[error("Other error: {0}")]
    Other(String),
}

/// Result type for mc-panel operations.
pub type Result<T> = std::result::Result<T, Error>;

//! Engine and protocol errors.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OmcError {
    #[error("failed to start engine '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("engine did not publish its endpoint in {port_file} ({reason}); see {log_file}")]
    Startup {
        port_file: PathBuf,
        log_file: PathBuf,
        reason: String,
    },

    #[error("transport error: {0}")]
    Transport(#[from] zeromq::ZmqError),

    #[error("cannot parse engine reply at byte {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("simulation result has no field '{0}'")]
    MissingField(&'static str),

    #[error("simulation result field '{field}' is {found}, expected {expected}")]
    FieldType {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{command} returned false: {details}")]
    LoadFailed { command: String, details: String },

    #[error("invalid simulation settings: {0}")]
    Settings(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type OmcResult<T> = Result<T, OmcError>;

//! Error types for the transfer engine.
//!
//! Only unrecoverable resource failures are errors.  Malformed datagrams and
//! protocol violations are dropped where they are detected, transient socket
//! failures are logged and left to the retransmission machinery, and timeouts
//! are reported as an [`crate::client::Outcome`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors that stop a client or server.
#[derive(Error, Debug)]
pub enum TransferError {
    /// The datagram socket could not be created or bound.
    #[error("failed to bind UDP socket on {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    /// The peer host name did not resolve to any address.
    #[error("could not resolve {host}")]
    Resolve { host: String },

    /// The file being sent could not be opened or read.
    #[error("source file error: {0}")]
    SourceFile(#[source] io::Error),

    /// An output file could not be created or written.
    #[error("output file {path}: {source}")]
    OutputFile { path: PathBuf, source: io::Error },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T, E = TransferError> = std::result::Result<T, E>;

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{error::Error, fmt, io, process::ExitStatus, string};

pub type SwiftResult<T> = Result<T, SwiftError>;

#[derive(Debug)]
pub enum SwiftError {
    Msg(String),
    Chained(String, Box<SwiftError>),
    BinaryNotFound {
        names: Vec<String>,
        locations: Vec<String>,
    },
    CommandFailure {
        cmd: String,
        status: ExitStatus,
        stderr: String,
    },
    Io(io::Error),
    Nix(nix::Error),
    Procfs(procfs::ProcError),
    Regex(regex::Error),
    Serde(serde_json::error::Error),
    Sqlite(rusqlite::Error),
    Utf8(string::FromUtf8Error),
}

impl fmt::Display for SwiftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwiftError::Msg(s) => write!(f, "{s}"),
            SwiftError::Chained(msg, err) => write!(f, "{msg}; caused by: {err}"),
            SwiftError::BinaryNotFound { names, locations } => write!(
                f,
                "Required binaries {} could not be found in any of {}",
                names.join(", "),
                locations.join(", ")
            ),
            SwiftError::CommandFailure {
                cmd,
                status,
                stderr,
            } => write!(f, "Command {cmd} failed with {status}: {}", stderr.trim()),
            SwiftError::Io(err) => write!(f, "IO error: {err}"),
            SwiftError::Nix(err) => write!(f, "Nix error: {err}"),
            SwiftError::Procfs(err) => write!(f, "procfs error: {err}"),
            SwiftError::Regex(err) => write!(f, "Regex error: {err}"),
            SwiftError::Serde(err) => write!(f, "Serde error: {err}"),
            SwiftError::Sqlite(err) => write!(f, "SQLite error: {err}"),
            SwiftError::Utf8(err) => write!(f, "Utf8 error: {err}"),
        }
    }
}

impl Error for SwiftError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SwiftError::Msg(_)
            | SwiftError::BinaryNotFound { .. }
            | SwiftError::CommandFailure { .. } => None,
            SwiftError::Chained(_, err) => Some(err.as_ref()),
            SwiftError::Io(err) => Some(err),
            SwiftError::Nix(err) => Some(err),
            SwiftError::Procfs(err) => Some(err),
            SwiftError::Regex(err) => Some(err),
            SwiftError::Serde(err) => Some(err),
            SwiftError::Sqlite(err) => Some(err),
            SwiftError::Utf8(err) => Some(err),
        }
    }
}

impl From<io::Error> for SwiftError {
    fn from(err: io::Error) -> SwiftError {
        SwiftError::Io(err)
    }
}

impl From<nix::Error> for SwiftError {
    fn from(err: nix::Error) -> SwiftError {
        SwiftError::Nix(err)
    }
}

impl From<procfs::ProcError> for SwiftError {
    fn from(err: procfs::ProcError) -> SwiftError {
        SwiftError::Procfs(err)
    }
}

impl From<regex::Error> for SwiftError {
    fn from(err: regex::Error) -> SwiftError {
        SwiftError::Regex(err)
    }
}

impl From<serde_json::error::Error> for SwiftError {
    fn from(err: serde_json::error::Error) -> SwiftError {
        SwiftError::Serde(err)
    }
}

impl From<rusqlite::Error> for SwiftError {
    fn from(err: rusqlite::Error) -> SwiftError {
        SwiftError::Sqlite(err)
    }
}

impl From<string::FromUtf8Error> for SwiftError {
    fn from(err: string::FromUtf8Error) -> SwiftError {
        SwiftError::Utf8(err)
    }
}

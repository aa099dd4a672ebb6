// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the runtime core.

use device_hal::DeviceError;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Errors returned by [`Compilation`](crate::Compilation),
/// [`Executor`](crate::Executor) and the cache store.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Bad index, shape, enum value or other argument.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Call made in the wrong state or needing a missing capability.
    #[error("operation forbidden: {0}")]
    OperationForbidden(String),

    /// Device memory allocation or copy failure.
    #[error("memory error: {0}")]
    MemoryError(#[from] memory_manager::MemoryError),

    /// Cache directory or file missing, malformed or corrupted.
    #[error("invalid cache file: {0}")]
    InvalidFile(String),

    /// Filesystem failure on a cache path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failure reported by a device back-end.
    #[error("device error: {0}")]
    DeviceError(#[from] DeviceError),

    /// Graph loading failed.
    #[error("model error: {0}")]
    ModelError(#[from] model_ir::ModelError),

    /// Tensor descriptor mismatch.
    #[error("tensor error: {0}")]
    TensorError(#[from] tensor_core::TensorError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// An asynchronous run did not finish in time.
    #[error("run timed out after {0:?}")]
    Timeout(Duration),

    /// Generic failure.
    #[error("{0}")]
    Failed(String),
}

/// Coarse error classification exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidParameter,
    OperationForbidden,
    MemoryError,
    InvalidFile,
    UnavailableDevice,
    NullPointer,
    Failed,
    Timeout,
}

impl ErrorKind {
    /// Errors that may go away on retry, e.g. after clearing the cache.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::InvalidFile | Self::UnavailableDevice | Self::Timeout)
    }

    /// Errors caused by calling the API incorrectly.
    pub fn is_programming_error(self) -> bool {
        matches!(self, Self::InvalidParameter | Self::OperationForbidden)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidParameter => "invalid parameter",
            Self::OperationForbidden => "operation forbidden",
            Self::MemoryError => "memory error",
            Self::InvalidFile => "invalid file",
            Self::UnavailableDevice => "unavailable device",
            Self::NullPointer => "null pointer",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

impl RuntimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParameter(_) | Self::TensorError(_) | Self::ConfigError(_) => {
                ErrorKind::InvalidParameter
            }
            Self::OperationForbidden(_) => ErrorKind::OperationForbidden,
            Self::MemoryError(_) => ErrorKind::MemoryError,
            Self::InvalidFile(_) | Self::Io { .. } => ErrorKind::InvalidFile,
            Self::DeviceError(e) => match e {
                DeviceError::InvalidParameter(_) => ErrorKind::InvalidParameter,
                DeviceError::NotSupported(_) => ErrorKind::OperationForbidden,
                DeviceError::Unavailable(_) => ErrorKind::UnavailableDevice,
                DeviceError::Memory(_) | DeviceError::DriverOutOfMemory { .. } => {
                    ErrorKind::MemoryError
                }
                DeviceError::NullHandle(_) => ErrorKind::NullPointer,
                DeviceError::Failed(_) => ErrorKind::Failed,
            },
            Self::ModelError(model_ir::ModelError::ReadError(_)) => ErrorKind::InvalidFile,
            Self::ModelError(_) => ErrorKind::InvalidParameter,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Failed(_) => ErrorKind::Failed,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

//! Preflight checks for the JSON files handed to the programs on the command line.

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Errors raised before a dump1090 JSON file is parsed
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum InputError {
    /// The path does not exist or is not a regular file
    #[error("File does not appear to exist: {}", path.display())]
    Missing { path: PathBuf },

    /// The file exists but cannot be opened for reading
    #[error("Unable to read file, permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    /// Any other failure opening the file
    #[error("Unable to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Verify that `path` is an existing, readable regular file.
pub fn check_input_file(path: &Path) -> Result<(), InputError> {
    if !path.is_file() {
        return Err(InputError::Missing {
            path: path.to_path_buf(),
        });
    }

    match File::open(path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => Err(InputError::PermissionDenied {
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(InputError::Missing {
            path: path.to_path_buf(),
        }),
        Err(source) => Err(InputError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

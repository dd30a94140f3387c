use std::path::{Component, Path};

use crate::StorageError;

/// Turns a client path into a path relative to the storage root.
///
/// FTP clients send paths relative to a virtual root ("/report.csv",
/// "logs/app.log"); leading slashes are stripped before validation.
pub fn normalize_client_path(client_path: &str) -> Result<String, StorageError> {
    let relative = client_path.trim_start_matches('/');
    validate_upload_path(relative)?;
    Ok(relative.to_string())
}

/// Validates that a relative file path does not escape its base directory.
///
/// Rejects:
/// - Empty paths
/// - Absolute paths (Unix `/` or Windows `C:\`)
/// - Parent directory traversal (`..`)
/// - Windows prefix components (`C:`, `\\server`)
pub fn validate_upload_path(file_path: &str) -> Result<(), StorageError> {
    if file_path.is_empty() {
        return Err(StorageError::InvalidPath("empty path".into()));
    }

    let path = Path::new(file_path);

    if path.is_absolute() {
        return Err(StorageError::InvalidPath(format!(
            "absolute path not allowed: {file_path}"
        )));
    }

    let mut has_name = false;
    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(StorageError::InvalidPath(format!(
                    "parent directory traversal not allowed: {file_path}"
                )));
            }
            Component::Prefix(_) => {
                return Err(StorageError::InvalidPath(format!(
                    "path prefix not allowed: {file_path}"
                )));
            }
            Component::RootDir => {
                return Err(StorageError::InvalidPath(format!(
                    "absolute path not allowed: {file_path}"
                )));
            }
            Component::Normal(_) => has_name = true,
            Component::CurDir => {}
        }
    }

    if !has_name {
        return Err(StorageError::InvalidPath(format!(
            "no file name in path: {file_path}"
        )));
    }

    Ok(())
}

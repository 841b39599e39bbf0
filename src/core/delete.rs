use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::DeleteError;

/// How the engine removes a matched file; [`delete`] unless replaced
pub type Remover = fn(&Path) -> Result<(), DeleteError>;

/// Remove a matched file.
///
/// A file that disappeared before we got to it is reported as
/// [`DeleteError::Vanished`]; another monitor or process racing us is
/// expected and is not treated as a failure of the pass.
pub fn delete(path: &Path) -> Result<(), DeleteError> {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!("Removed {}", path.display());
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            Err(DeleteError::Vanished(path.to_path_buf()))
        }
        Err(err) => Err(DeleteError::Failed {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }),
    }
}

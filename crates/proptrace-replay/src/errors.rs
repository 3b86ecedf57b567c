use std::path::PathBuf;

use thiserror::Error;

use crate::trace_file::TraceFileError;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    TraceFile(#[from] TraceFileError),
}

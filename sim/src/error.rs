use std::path::PathBuf;

use thiserror::Error;

use footing::ControllerError;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("usage: footing-sim <scenario.ron>")]
    Usage,

    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("scenario parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("controller setup failed: {0}")]
    Controller(#[from] ControllerError),

    #[error("scenario `{name}`: {detail}")]
    Expectation { name: String, detail: String },
}

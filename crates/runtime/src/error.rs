use thiserror::Error;

use crate::model::ModelError;
use crate::tools::CloseError;

#[derive(Debug, Error)]
pub enum Error {
    /// Inference failed; the turn cannot continue.
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Close(#[from] CloseError),
}

pub type Result<T> = std::result::Result<T, Error>;

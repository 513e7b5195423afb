use thiserror::Error;

/// Errors surfaced by the decoding plugins.
///
/// Initialization errors and structural tensor errors propagate to the
/// caller; heuristic or degenerate-input conditions are absorbed inside the
/// stages and always produce a (possibly empty) valid result.
#[derive(Error, Debug)]
pub enum OcrError {
    #[error("config error: {0}")]
    Config(String),

    #[error("charset error: {0}")]
    Charset(String),

    #[error("ROI has no tensors")]
    MissingTensor,

    #[error("unexpected recognizer tensor rank {0}, expected 3")]
    InvalidRecRank(usize),

    #[error("recognizer expects batch size 1, got {0}")]
    InvalidRecBatch(usize),
}

use std::fmt;

/// The two failure classes a caller must branch on. Every other fault in the
/// pipeline degrades the record instead of failing the run.
#[derive(Debug)]
pub enum PipelineError {
    /// The rendering collaborator was unreachable or never became ready.
    Render(String),
    /// The day-partition dataset could not be appended to.
    Persistence(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Render(details) => write!(f, "render failure: {details}"),
            PipelineError::Persistence(details) => write!(f, "persistence failure: {details}"),
        }
    }
}

impl std::error::Error for PipelineError {}

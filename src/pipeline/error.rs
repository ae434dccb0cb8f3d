use std::fmt;
use std::path::PathBuf;

use crate::store::{ProcessingRecord, ProcessingStore, StoreError};

/// The stage a per-file failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extraction,
    Transcription,
    Generation,
    Evaluation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extraction => write!(f, "audio extraction"),
            Self::Transcription => write!(f, "transcription"),
            Self::Generation => write!(f, "description generation"),
            Self::Evaluation => write!(f, "description evaluation"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{stage} failed for {}: {source:#}", path.display())]
    Stage {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to walk {}: {source}", root.display())]
    Discovery {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("scratch directory {}: {source}", path.display())]
    Scratch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cancelled")]
    Cancelled,
}

impl PipelineError {
    pub(crate) fn stage(stage: Stage, path: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        Self::Stage {
            stage,
            path: path.into(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// A unit of work that stopped early. `partial` holds every stage that
/// completed before the failure.
#[derive(Debug)]
pub struct UnitFailure {
    pub partial: ProcessingRecord,
    pub error: PipelineError,
}

/// A run that ended with an error. `store` is the store as last persisted.
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct RunError {
    pub store: ProcessingStore,
    #[source]
    pub source: PipelineError,
}

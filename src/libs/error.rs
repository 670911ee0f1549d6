use thiserror::Error;

/// Domain-level failures of the distance engine and its inputs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BgcError {
    /// An upstream artifact expected for a record does not exist
    #[error("missing {kind} for record {record}: {path}")]
    MissingArtifact {
        record: String,
        kind: &'static str,
        path: String,
    },
    /// A table row could not be parsed
    #[error("malformed line {line} in {file}: {message}")]
    Malformed {
        file: String,
        line: usize,
        message: String,
    },
    /// The domain list and the detailed domain table of a record disagree
    #[error("inconsistent domain tables for {record}: {message}")]
    Inconsistent { record: String, message: String },
    /// No aligned sequence and no sequence to realign for an occurrence
    #[error("no sequence for {tag} ({domain})")]
    MissingSequence { tag: String, domain: String },
    /// The record is not part of the domain index
    #[error("record {0} is not indexed")]
    UnknownRecord(String),
    #[error("invalid cutoff {0}: must be in (0, 1]")]
    InvalidCutoff(String),
    #[error("invalid weights for class {class}: {message}")]
    InvalidWeights { class: String, message: String },
}

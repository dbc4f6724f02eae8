pub mod candidate;
pub mod outcome;

pub use candidate::{
    AssetRef, Candidate, CandidateId, CandidateSnapshot, CandidateState, LocalFile, Origin,
};
pub use outcome::{FailureRecord, VerificationOutcome, VerificationStatus};

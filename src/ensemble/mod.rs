//! Ensemble voting layer

mod voter;

pub use voter::{EnsembleVoter, VoteOutcome};

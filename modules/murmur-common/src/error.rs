use thiserror::Error;

/// The two conditions that fail an overall crawl run.
///
/// Everything below the orchestrator — extraction failures, page-load
/// timeouts, stalled pagination, a single unreachable mirror — is swallowed
/// into counters or boolean outcomes and never surfaces as an error.
#[derive(Error, Debug)]
pub enum MurmurError {
    #[error("no source available: all {attempted} mirror endpoints failed")]
    SourceUnavailable { attempted: usize },

    #[error("automation backend unusable: {0}")]
    FatalAutomation(String),
}

/// External relevance scoring providers
///
/// The engine treats the relevance service as a slow, unreliable black box:
/// it may be asked to pick the best few products out of a shortlist given a
/// little behavioural context, and any answer it gives is advisory.
use crate::{
    error::AppResult,
    models::{AiRanking, RelevanceRequest},
};

pub mod gemini;

pub use gemini::GeminiRelevanceClient;

/// Trait for relevance scoring backends
///
/// Implementations return at most a handful of `{productId, explanation,
/// score}` judgements for ids drawn from the request's candidates. Errors are
/// returned as-is; absorbing them is the re-ranker's job.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RelevanceService: Send + Sync {
    async fn score(&self, request: RelevanceRequest) -> AppResult<Vec<AiRanking>>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Stand-in used when no relevance backend is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRelevance;

#[async_trait::async_trait]
impl RelevanceService for DisabledRelevance {
    async fn score(&self, _request: RelevanceRequest) -> AppResult<Vec<AiRanking>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

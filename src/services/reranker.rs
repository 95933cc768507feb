use std::{future::Future, sync::Arc, time::Duration};

use crate::{
    models::{AiRanking, CandidateBrief, HistoryItem, ProductSummary, RelevanceRequest},
    services::providers::RelevanceService,
};

/// Candidates offered to the relevance service, by popularity
pub const SHORTLIST_SIZE: usize = 20;
/// History items sent along as context
pub const MAX_HISTORY_ITEMS: usize = 10;
/// Rankings kept from a single response
pub const MAX_RANKINGS: usize = 5;
pub const DEFAULT_DEADLINE: Duration = Duration::from_millis(400);

/// Outcome of racing a future against a deadline
#[derive(Debug, PartialEq)]
pub enum Race<T> {
    Completed(T),
    /// The deadline fired first; the task keeps running and its output is dropped
    TimedOut,
    /// The task panicked or was aborted
    Failed(String),
}

/// Runs `fut` on its own task and waits at most `deadline` for it
///
/// The loser is never awaited: on timeout the join handle is dropped, which
/// detaches the task so it can finish on its own and be discarded.
pub async fn first_or_deadline<F>(fut: F, deadline: Duration) -> Race<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let handle = tokio::spawn(fut);
    match tokio::time::timeout(deadline, handle).await {
        Ok(Ok(output)) => Race::Completed(output),
        Ok(Err(join_error)) => Race::Failed(join_error.to_string()),
        Err(_) => Race::TimedOut,
    }
}

/// Time-boxed enrichment from the external relevance service
///
/// Never fails: timeouts and errors are logged and produce no rankings, so
/// the caller always falls back to the base score.
#[derive(Clone)]
pub struct AiReranker {
    service: Arc<dyn RelevanceService>,
    deadline: Duration,
}

impl AiReranker {
    pub fn new(service: Arc<dyn RelevanceService>, deadline: Duration) -> Self {
        Self { service, deadline }
    }

    pub async fn rerank(
        &self,
        history: &[HistoryItem],
        candidates: &[ProductSummary],
    ) -> Vec<AiRanking> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let shortlist = shortlist(candidates);
        let request = RelevanceRequest {
            history: history.iter().take(MAX_HISTORY_ITEMS).cloned().collect(),
            candidates: shortlist.iter().map(CandidateBrief::from).collect(),
        };

        let service = Arc::clone(&self.service);
        let provider = service.name();
        let outcome = first_or_deadline(async move { service.score(request).await }, self.deadline).await;

        match outcome {
            Race::Completed(Ok(rankings)) => {
                let rankings = sanitize(rankings, &shortlist);
                tracing::debug!(provider, kept = rankings.len(), "Re-ranking applied");
                rankings
            }
            Race::Completed(Err(e)) => {
                tracing::warn!(provider, error = %e, "Relevance service failed, using base scores");
                Vec::new()
            }
            Race::TimedOut => {
                tracing::warn!(
                    provider,
                    deadline_ms = self.deadline.as_millis() as u64,
                    "Relevance service timed out, using base scores"
                );
                Vec::new()
            }
            Race::Failed(reason) => {
                tracing::warn!(provider, error = %reason, "Relevance task aborted, using base scores");
                Vec::new()
            }
        }
    }
}

/// Top candidates by popularity; equal popularity keeps input order
fn shortlist(candidates: &[ProductSummary]) -> Vec<ProductSummary> {
    let mut sorted = candidates.to_vec();
    sorted.sort_by(|a, b| b.popularity.cmp(&a.popularity));
    sorted.truncate(SHORTLIST_SIZE);
    sorted
}

/// Keeps the first ranking per shortlisted id, clamps scores to 0–100
fn sanitize(rankings: Vec<AiRanking>, shortlist: &[ProductSummary]) -> Vec<AiRanking> {
    let mut kept: Vec<AiRanking> = Vec::new();
    for mut ranking in rankings {
        if kept.len() == MAX_RANKINGS {
            break;
        }
        let known = shortlist.iter().any(|p| p.id == ranking.product_id);
        let duplicate = kept.iter().any(|k| k.product_id == ranking.product_id);
        if !known || duplicate {
            continue;
        }
        ranking.score = if ranking.score.is_finite() {
            ranking.score.clamp(0.0, 100.0)
        } else {
            0.0
        };
        kept.push(ranking);
    }
    kept
}

pub mod candidates;
pub mod providers;
pub mod recommendations;
pub mod reranker;
pub mod scoring;
pub mod tracking;

pub use recommendations::{EngineSettings, RecommendationEngine};
pub use reranker::AiReranker;

/// Gemini relevance provider
///
/// Sends a compact prompt (behavioural history plus the shortlisted products)
/// to the `generateContent` endpoint and asks for a JSON array of at most five
/// `{productId, explanation, score}` objects.
///
/// API Flow:
/// 1. POST /v1beta/models/{model}:generateContent → candidate text
/// 2. Strip any Markdown code fences, then parse the JSON array
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::{
    error::{AppError, AppResult},
    models::{AiRanking, EventType, RelevanceRequest},
    services::providers::RelevanceService,
};

#[derive(Clone)]
pub struct GeminiRelevanceClient {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

impl GeminiRelevanceClient {
    pub fn new(api_key: String, api_url: String, model: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url,
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Renders the request as the model prompt
fn build_prompt(request: &RelevanceRequest) -> String {
    let history = request
        .history
        .iter()
        .map(|item| {
            let verb = match item.event_type {
                EventType::View | EventType::Click | EventType::Search => "Viewed",
                EventType::AddToCart => "Added to cart",
                EventType::Purchase => "Bought",
            };
            format!("{} {} ({})", verb, item.product_name, item.category)
        })
        .collect::<Vec<_>>()
        .join(", ");

    let candidates = request
        .candidates
        .iter()
        .map(|c| format!("- ID: {}, Name: {}, Category: {}", c.id, c.name, c.category))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "User History: {}\n\n\
         Candidate Products:\n{}\n\n\
         Task: Select the top 5 most relevant products for this user based on their history.\n\
         Return a valid JSON array of objects. Do not wrap in markdown or code blocks.\n\
         Format:\n\
         [{{ \"productId\": \"ID\", \"explanation\": \"Short reason why\", \"score\": 0-100 }}]",
        history, candidates
    )
}

/// Parses the model's answer, tolerating Markdown code fences around it
fn parse_rankings(text: &str) -> AppResult<Vec<AiRanking>> {
    let cleaned = text.replace("```json", "").replace("```", "");
    serde_json::from_str(cleaned.trim())
        .map_err(|e| AppError::ExternalApi(format!("Unparseable relevance response: {}", e)))
}

#[async_trait::async_trait]
impl RelevanceService for GeminiRelevanceClient {
    #[instrument(skip(self, request), fields(model = %self.model, candidates = request.candidates.len()))]
    async fn score(&self, request: RelevanceRequest) -> AppResult<Vec<AiRanking>> {
        let body = json!({
            "contents": [{ "parts": [{ "text": build_prompt(&request) }] }],
            "generationConfig": { "temperature": 0.7, "topP": 0.8, "topK": 40 }
        });

        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Gemini API returned status {}: {}",
                status, body
            )));
        }

        let payload: GenerateContentResponse = response.json().await?;
        let text = payload
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
            .ok_or_else(|| AppError::ExternalApi("Gemini response had no text".to_string()))?;

        let rankings = parse_rankings(&text)?;
        tracing::debug!(returned = rankings.len(), "Relevance rankings received");
        Ok(rankings)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

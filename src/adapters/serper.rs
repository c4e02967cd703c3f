use crate::domain::ports::SearchProvider;
use crate::utils::error::{Result, VendorAiError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://google.serper.dev";
pub const DEFAULT_NUM_RESULTS: usize = 5;

#[derive(Serialize)]
struct SearchRequest<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    answer_box: Option<AnswerBox>,
    knowledge_graph: Option<KnowledgeGraph>,
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct AnswerBox {
    answer: Option<String>,
    snippet: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KnowledgeGraph {
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    snippet: Option<String>,
}

/// Serper (Google 搜尋) 客戶端
pub struct SerperSearch {
    client: Client,
    api_key: String,
    base_url: String,
    num_results: usize,
}

impl SerperSearch {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        num_results: usize,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            num_results,
        })
    }
}

impl SearchResponse {
    /// 依序合併 answer box、knowledge graph 與 organic 片段
    fn into_snippet(self, num_results: usize) -> String {
        let mut parts = Vec::new();

        if let Some(answer_box) = self.answer_box {
            if let Some(text) = answer_box.answer.or(answer_box.snippet) {
                parts.push(text);
            }
        }
        if let Some(description) = self.knowledge_graph.and_then(|kg| kg.description) {
            parts.push(description);
        }
        parts.extend(
            self.organic
                .into_iter()
                .filter_map(|r| r.snippet)
                .take(num_results),
        );

        parts
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl SearchProvider for SerperSearch {
    fn name(&self) -> &str {
        "serper"
    }

    async fn search(&self, query: &str) -> Result<String> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("X-API-KEY", &self.api_key)
            .json(&SearchRequest {
                q: query,
                num: self.num_results,
            })
            .send()
            .await
            .map_err(|e| VendorAiError::AugmentationError {
                message: format!("request to {} failed: {}", url, e),
            })?;

        if !response.status().is_success() {
            return Err(VendorAiError::AugmentationError {
                message: format!("HTTP {}", response.status()),
            });
        }

        let body: SearchResponse =
            response
                .json()
                .await
                .map_err(|e| VendorAiError::AugmentationError {
                    message: format!("invalid search payload: {}", e),
                })?;

        Ok(body.into_snippet(self.num_results))
    }
}

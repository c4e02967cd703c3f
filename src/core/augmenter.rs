use crate::domain::model::{Augmentation, UnaugmentedReason};
use crate::domain::ports::SearchProvider;
use std::sync::Arc;

pub const DEFAULT_MAX_SNIPPET_CHARS: usize = 2000;

/// 搜尋增強器：任何失敗都降級成 `Unaugmented`，不會中斷流程
#[derive(Clone)]
pub struct SearchAugmenter {
    provider: Option<Arc<dyn SearchProvider>>,
    max_snippet_chars: usize,
}

impl SearchAugmenter {
    pub fn new(provider: Arc<dyn SearchProvider>, max_snippet_chars: usize) -> Self {
        Self {
            provider: Some(provider),
            max_snippet_chars,
        }
    }

    /// 沒有搜尋金鑰時使用
    pub fn disabled() -> Self {
        Self {
            provider: None,
            max_snippet_chars: DEFAULT_MAX_SNIPPET_CHARS,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub async fn augment(&self, query: &str) -> Augmentation {
        let Some(provider) = &self.provider else {
            tracing::debug!("🔍 Search disabled (no search key), skipping augmentation");
            return Augmentation::Unaugmented(UnaugmentedReason::NoSearchKey);
        };

        tracing::debug!("🔍 Searching via {}: {}", provider.name(), query);
        match provider.search(query).await {
            Ok(snippet) => {
                let snippet = snippet.trim();
                if snippet.is_empty() {
                    tracing::info!("🔍 No search results for '{}'", query);
                    Augmentation::Unaugmented(UnaugmentedReason::NoResults)
                } else {
                    Augmentation::Augmented {
                        query: query.to_string(),
                        snippet: truncate_chars(snippet, self.max_snippet_chars),
                    }
                }
            }
            Err(e) => {
                tracing::warn!("⚠️ Search failed for '{}', continuing without it: {}", query, e);
                Augmentation::Unaugmented(UnaugmentedReason::SearchFailed(e.to_string()))
            }
        }
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].trim_end().to_string(),
        None => text.to_string(),
    }
}

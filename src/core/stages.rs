use crate::core::augmenter::SearchAugmenter;
use crate::core::prompts::{
    render_template, CATEGORIZE_TEMPLATE, DISCOVER_TEMPLATE, IDENTIFY_TEMPLATE, NO_SEARCH_RESULTS,
    RECOMMEND_TEMPLATE,
};
use crate::domain::model::{
    Action, Augmentation, StageKind, StageResult, VendorAnalysis, VendorRecord,
};
use crate::domain::ports::LanguageModel;
use crate::utils::error::{Result, VendorAiError};
use std::time::Duration;

/// LLM 呼叫的重試策略；預設不重試（失敗即跳過該供應商）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }
}

/// 每個 stage 共用的執行環境
pub struct StageEnv<'a> {
    pub model: &'a dyn LanguageModel,
    pub augmenter: &'a SearchAugmenter,
    pub departments: &'a [String],
    pub retry: RetryPolicy,
    pub portfolio_summary: &'a str,
}

impl StageEnv<'_> {
    /// 呼叫 LLM，依 retry policy 重試；空白回覆與請求失敗一樣處理
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            let error = match self.model.complete(prompt).await {
                Ok(text) if !text.trim().is_empty() => return Ok(text.trim().to_string()),
                Ok(_) => VendorAiError::llm(format!(
                    "{} returned an empty response",
                    self.model.name()
                )),
                Err(e) => e,
            };

            if attempt >= self.retry.max_retries {
                return Err(error);
            }
            attempt += 1;
            tracing::warn!(
                "🔁 LLM call failed ({}), retry {}/{}",
                error,
                attempt,
                self.retry.max_retries
            );
            if !self.retry.delay.is_zero() {
                tokio::time::sleep(self.retry.delay).await;
            }
        }
    }
}

/// 單一供應商在各 stage 之間累積的上下文
#[derive(Debug, Clone)]
pub struct VendorContext {
    pub record: VendorRecord,
    pub search_query: Option<String>,
    pub augmentation: Option<Augmentation>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub action: Option<Action>,
    pub history: Vec<StageResult>,
}

impl VendorContext {
    pub fn new(record: VendorRecord) -> Self {
        Self {
            record,
            search_query: None,
            augmentation: None,
            description: None,
            category: None,
            action: None,
            history: Vec::new(),
        }
    }

    fn record_stage(&mut self, stage: StageKind, text: &str) {
        self.history.push(StageResult {
            stage,
            text: text.to_string(),
        });
    }

    fn require<'a, T>(&self, value: &'a Option<T>, field: &str) -> Result<&'a T> {
        value.as_ref().ok_or_else(|| {
            VendorAiError::llm(format!("{} is not available for '{}'", field, self.record.name))
        })
    }

    pub fn into_analysis(self) -> Result<VendorAnalysis> {
        match (
            self.search_query,
            self.augmentation,
            self.description,
            self.category,
            self.action,
        ) {
            (Some(search_query), Some(augmentation), Some(description), Some(category), Some(action)) => {
                Ok(VendorAnalysis {
                    record: self.record,
                    search_query,
                    augmentation,
                    description,
                    category,
                    action,
                    stages: self.history,
                })
            }
            _ => Err(VendorAiError::llm(format!(
                "pipeline for '{}' ended before all stages ran",
                self.record.name
            ))),
        }
    }
}

#[async_trait::async_trait]
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;
    async fn run(&self, ctx: VendorContext, env: &StageEnv<'_>) -> Result<VendorContext>;
}

pub struct IdentifyStage;

#[async_trait::async_trait]
impl Stage for IdentifyStage {
    fn kind(&self) -> StageKind {
        StageKind::Identify
    }

    async fn run(&self, mut ctx: VendorContext, env: &StageEnv<'_>) -> Result<VendorContext> {
        let prompt = render_template(IDENTIFY_TEMPLATE, &[("vendor_name", &ctx.record.name)]);
        let response = env.complete(&prompt).await?;
        let query = clean_query(&response);
        tracing::debug!("🔎 {}: search query '{}'", ctx.record.name, query);

        ctx.record_stage(self.kind(), &query);
        ctx.search_query = Some(query);
        Ok(ctx)
    }
}

pub struct DiscoverStage;

#[async_trait::async_trait]
impl Stage for DiscoverStage {
    fn kind(&self) -> StageKind {
        StageKind::Discover
    }

    async fn run(&self, mut ctx: VendorContext, env: &StageEnv<'_>) -> Result<VendorContext> {
        let query = ctx.require(&ctx.search_query, "search query")?.clone();
        let augmentation = env.augmenter.augment(&query).await;
        let search_results = augmentation.snippet().unwrap_or(NO_SEARCH_RESULTS);

        let prompt = render_template(
            DISCOVER_TEMPLATE,
            &[
                ("vendor_name", &ctx.record.name),
                ("search_query", &query),
                ("search_results", search_results),
            ],
        );
        let description = env.complete(&prompt).await?;

        ctx.record_stage(self.kind(), &description);
        ctx.augmentation = Some(augmentation);
        ctx.description = Some(description);
        Ok(ctx)
    }
}

pub struct CategorizeStage;

#[async_trait::async_trait]
impl Stage for CategorizeStage {
    fn kind(&self) -> StageKind {
        StageKind::Categorize
    }

    async fn run(&self, mut ctx: VendorContext, env: &StageEnv<'_>) -> Result<VendorContext> {
        let description = ctx.require(&ctx.description, "service description")?;
        let departments = env.departments.join(", ");
        let prompt = render_template(
            CATEGORIZE_TEMPLATE,
            &[
                ("service_description", description),
                ("departments", &departments),
            ],
        );
        let response = env.complete(&prompt).await?;
        let category = normalize_category(&response, env.departments);

        ctx.record_stage(self.kind(), &category);
        ctx.category = Some(category);
        Ok(ctx)
    }
}

pub struct RecommendStage;

#[async_trait::async_trait]
impl Stage for RecommendStage {
    fn kind(&self) -> StageKind {
        StageKind::Recommend
    }

    async fn run(&self, mut ctx: VendorContext, env: &StageEnv<'_>) -> Result<VendorContext> {
        let description = ctx.require(&ctx.description, "service description")?;
        let category = ctx.require(&ctx.category, "category")?;
        let amount = ctx.record.formatted_amount();
        let prompt = render_template(
            RECOMMEND_TEMPLATE,
            &[
                ("vendor_summary", env.portfolio_summary),
                ("vendor_name", &ctx.record.name),
                ("amount", &amount),
                ("category", category),
                ("description", description),
            ],
        );
        let response = env.complete(&prompt).await?;
        let action = Action::parse(&response);
        if let Action::Unrecognized(raw) = &action {
            tracing::warn!("⚠️ {}: unrecognized recommendation '{}'", ctx.record.name, raw);
        }

        ctx.record_stage(self.kind(), &action.to_string());
        ctx.action = Some(action);
        Ok(ctx)
    }
}

/// 固定順序的四個 stage
pub fn default_stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(IdentifyStage),
        Box::new(DiscoverStage),
        Box::new(CategorizeStage),
        Box::new(RecommendStage),
    ]
}

fn clean_query(raw: &str) -> String {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    line.trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
        .trim()
        .to_string()
}

/// 盡力把 LLM 回覆對應到已知部門
pub fn normalize_category(raw: &str, departments: &[String]) -> String {
    let answer = raw
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.')
        .trim();

    if let Some(exact) = departments.iter().find(|d| d.eq_ignore_ascii_case(answer)) {
        return exact.clone();
    }

    let lower = answer.to_lowercase();
    let mentioned: Vec<&String> = departments
        .iter()
        .filter(|d| lower.contains(&d.to_lowercase()))
        .collect();
    if mentioned.len() == 1 {
        return mentioned[0].clone();
    }

    answer
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or(answer)
        .to_string()
}

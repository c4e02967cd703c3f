use crate::core::augmenter::SearchAugmenter;
use crate::core::stages::{default_stages, RetryPolicy, Stage, StageEnv, VendorContext};
use crate::domain::model::{FailedVendor, StageKind, VendorAnalysis, VendorOutcome, VendorRecord};
use crate::domain::ports::LanguageModel;
use crate::utils::error::{Result, VendorAiError};
use std::sync::Arc;
use std::time::Instant;

/// 依固定順序對每個供應商執行各 stage，一次只處理一個供應商
pub struct StageRunner {
    model: Arc<dyn LanguageModel>,
    augmenter: SearchAugmenter,
    departments: Vec<String>,
    retry: RetryPolicy,
    stages: Vec<Box<dyn Stage>>,
}

impl StageRunner {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        augmenter: SearchAugmenter,
        departments: Vec<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            model,
            augmenter,
            departments,
            retry,
            stages: default_stages(),
        }
    }

    pub fn stage_order(&self) -> Vec<StageKind> {
        self.stages.iter().map(|s| s.kind()).collect()
    }

    pub fn model(&self) -> &Arc<dyn LanguageModel> {
        &self.model
    }

    /// 執行單一供應商；任何 stage 失敗都會回傳帶有供應商與 stage 的 `StageError`
    pub async fn run_vendor(
        &self,
        record: &VendorRecord,
        portfolio_summary: &str,
    ) -> Result<VendorAnalysis> {
        self.run_stages(record, portfolio_summary)
            .await
            .map_err(|failed| VendorAiError::StageError {
                vendor: failed.vendor,
                stage: failed.stage,
                message: failed.message,
            })
    }

    async fn run_stages(
        &self,
        record: &VendorRecord,
        portfolio_summary: &str,
    ) -> std::result::Result<VendorAnalysis, FailedVendor> {
        let env = StageEnv {
            model: self.model.as_ref(),
            augmenter: &self.augmenter,
            departments: &self.departments,
            retry: self.retry,
            portfolio_summary,
        };
        let failed = |stage: StageKind, e: VendorAiError| FailedVendor {
            vendor: record.name.clone(),
            stage,
            message: e.to_string(),
        };

        let mut ctx = VendorContext::new(record.clone());
        let mut last_stage = StageKind::Identify;
        for stage in &self.stages {
            last_stage = stage.kind();
            tracing::debug!("▶️ {}: running {} stage", record.name, last_stage);
            ctx = stage
                .run(ctx, &env)
                .await
                .map_err(|e| failed(last_stage, e))?;
        }

        ctx.into_analysis().map_err(|e| failed(last_stage, e))
    }

    /// 依序處理所有供應商；失敗的供應商會被記錄並跳過
    pub async fn run_all(&self, records: &[VendorRecord]) -> Vec<VendorOutcome> {
        let portfolio_summary = portfolio_summary(records);
        let mut outcomes = Vec::with_capacity(records.len());

        for (index, record) in records.iter().enumerate() {
            let start_time = Instant::now();
            tracing::info!(
                "🏷️ [{}/{}] Analyzing vendor: {} ({})",
                index + 1,
                records.len(),
                record.name,
                record.formatted_amount()
            );

            match self.run_stages(record, &portfolio_summary).await {
                Ok(analysis) => {
                    tracing::info!(
                        "✅ {} - {} - {} ({:?})",
                        analysis.record.name,
                        analysis.category,
                        analysis.action,
                        start_time.elapsed()
                    );
                    outcomes.push(VendorOutcome::Completed(analysis));
                }
                Err(failed) => {
                    tracing::error!(
                        "❌ {}: {} stage failed: {}",
                        failed.vendor,
                        failed.stage,
                        failed.message
                    );
                    outcomes.push(VendorOutcome::Failed(failed));
                }
            }
        }

        outcomes
    }
}

/// 整個供應商組合的摘要，每行一個供應商與支出
pub fn portfolio_summary(records: &[VendorRecord]) -> String {
    records
        .iter()
        .map(|r| format!("{} ({})", r.name, r.formatted_amount()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::prompts::DEFAULT_DEPARTMENTS;
    use crate::domain::model::{Action, Augmentation, UnaugmentedReason};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    fn stage_of(prompt: &str) -> StageKind {
        let head = prompt.trim_start();
        if head.starts_with("Generate a search query") {
            StageKind::Identify
        } else if head.starts_with("Analyze the search results") {
            StageKind::Discover
        } else if head.starts_with("Objective:\nAnalyze the following vendor service") {
            StageKind::Categorize
        } else {
            StageKind::Recommend
        }
    }

    /// 回傳原始 prompt 的假模型，可指定在某供應商的某個 stage 失敗
    struct EchoModel {
        calls: Mutex<Vec<(StageKind, String)>>,
        fail_on: Option<(String, StageKind)>,
        transient_failures: Mutex<u32>,
    }

    impl EchoModel {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on: None,
                transient_failures: Mutex::new(0),
            }
        }

        fn failing_on(vendor: &str, stage: StageKind) -> Self {
            Self {
                fail_on: Some((vendor.to_string(), stage)),
                ..Self::new()
            }
        }

        fn flaky(failures: u32) -> Self {
            Self {
                transient_failures: Mutex::new(failures),
                ..Self::new()
            }
        }

        fn stages_called(&self) -> Vec<StageKind> {
            self.calls.lock().unwrap().iter().map(|(s, _)| *s).collect()
        }
    }

    #[async_trait]
    impl LanguageModel for EchoModel {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, prompt: &str) -> Result<String> {
            let stage = stage_of(prompt);
            self.calls.lock().unwrap().push((stage, prompt.to_string()));

            {
                let mut remaining = self.transient_failures.lock().unwrap();
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(VendorAiError::llm("HTTP 429: rate limited"));
                }
            }

            if let Some((vendor, fail_stage)) = &self.fail_on {
                if *fail_stage == stage && prompt.contains(vendor.as_str()) {
                    return Err(VendorAiError::llm("HTTP 500: upstream error"));
                }
            }

            Ok(prompt.to_string())
        }
    }

    fn departments() -> Vec<String> {
        DEFAULT_DEPARTMENTS.iter().map(|d| d.to_string()).collect()
    }

    fn vendors() -> Vec<VendorRecord> {
        vec![
            VendorRecord::new("Acme", 1000.into()),
            VendorRecord::new("Globex", 2000.into()),
        ]
    }

    fn runner_with(model: Arc<EchoModel>, retry: RetryPolicy) -> StageRunner {
        StageRunner::new(model, SearchAugmenter::disabled(), departments(), retry)
    }

    #[tokio::test]
    async fn test_four_calls_per_vendor_in_stage_order() {
        let model = Arc::new(EchoModel::new());
        let runner = runner_with(model.clone(), RetryPolicy::none());

        let outcomes = runner.run_all(&vendors()).await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes
            .iter()
            .all(|o| matches!(o, VendorOutcome::Completed(_))));

        let order: Vec<StageKind> = StageKind::ORDER
            .iter()
            .chain(StageKind::ORDER.iter())
            .copied()
            .collect();
        assert_eq!(model.stages_called(), order);
        assert_eq!(runner.stage_order(), StageKind::ORDER.to_vec());
    }

    #[tokio::test]
    async fn test_each_stage_feeds_the_next_prompt() {
        let model = Arc::new(EchoModel::new());
        let runner = runner_with(model.clone(), RetryPolicy::none());

        let analysis = runner
            .run_vendor(&vendors()[0], "Acme ($1000.00)")
            .await
            .unwrap();

        let calls = model.calls.lock().unwrap();
        // Identify 的輸出就是 Discover 的搜尋字串
        assert!(calls[1].1.contains(&analysis.search_query));
        assert!(calls[2].1.contains(&analysis.description));
        assert!(calls[3].1.contains("Spend: $1000.00"));
        assert!(calls[3].1.contains("Acme ($1000.00)"));

        let recorded: Vec<StageKind> = analysis.stages.iter().map(|s| s.stage).collect();
        assert_eq!(recorded, StageKind::ORDER.to_vec());
        assert_eq!(
            analysis.augmentation,
            Augmentation::Unaugmented(UnaugmentedReason::NoSearchKey)
        );
        assert!(matches!(analysis.action, Action::Unrecognized(_)));
    }

    #[tokio::test]
    async fn test_stage_failure_skips_only_that_vendor() {
        let model = Arc::new(EchoModel::failing_on("Acme", StageKind::Discover));
        let runner = runner_with(model.clone(), RetryPolicy::none());

        let outcomes = runner.run_all(&vendors()).await;

        match &outcomes[0] {
            VendorOutcome::Failed(failed) => {
                assert_eq!(failed.vendor, "Acme");
                assert_eq!(failed.stage, StageKind::Discover);
                assert!(failed.message.contains("HTTP 500"));
            }
            other => panic!("expected Acme to fail, got {:?}", other),
        }
        match &outcomes[1] {
            VendorOutcome::Completed(analysis) => assert_eq!(analysis.record.name, "Globex"),
            other => panic!("expected Globex to complete, got {:?}", other),
        }

        // Acme 停在 Discover，Globex 跑完四個 stage
        assert_eq!(model.stages_called().len(), 2 + 4);
    }

    #[tokio::test]
    async fn test_failed_outcome_names_the_failing_stage() {
        let model = Arc::new(EchoModel::failing_on("Globex", StageKind::Categorize));
        let runner = runner_with(model.clone(), RetryPolicy::none());

        let outcomes = runner.run_all(&vendors()).await;

        assert!(matches!(&outcomes[0], VendorOutcome::Completed(_)));
        assert_eq!(
            outcomes[1],
            VendorOutcome::Failed(FailedVendor {
                vendor: "Globex".to_string(),
                stage: StageKind::Categorize,
                message: "LLM request failed: HTTP 500: upstream error".to_string(),
            })
        );
        assert_eq!(model.stages_called().len(), 4 + 3);
    }

    #[tokio::test]
    async fn test_identical_runs_are_identical() {
        let first = runner_with(Arc::new(EchoModel::new()), RetryPolicy::none())
            .run_all(&vendors())
            .await;
        let second = runner_with(Arc::new(EchoModel::new()), RetryPolicy::none())
            .run_all(&vendors())
            .await;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_retry_policy_recovers_transient_failure() {
        let model = Arc::new(EchoModel::flaky(1));
        let runner = runner_with(model.clone(), RetryPolicy::fixed(1, Duration::ZERO));

        let analysis = runner.run_vendor(&vendors()[0], "").await;

        assert!(analysis.is_ok());
        assert_eq!(model.stages_called().len(), 5);
    }

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let model = Arc::new(EchoModel::flaky(1));
        let runner = runner_with(model.clone(), RetryPolicy::none());

        let err = runner.run_vendor(&vendors()[0], "").await.unwrap_err();

        assert!(matches!(
            err,
            VendorAiError::StageError {
                stage: StageKind::Identify,
                ..
            }
        ));
        assert_eq!(model.stages_called().len(), 1);
    }

    #[test]
    fn test_portfolio_summary_lists_every_vendor() {
        assert_eq!(
            portfolio_summary(&vendors()),
            "Acme ($1000.00)\nGlobex ($2000.00)"
        );
    }
}

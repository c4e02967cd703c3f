use crate::adapters::{OpenAiChatModel, SerperSearch};
use crate::config::PipelineConfig;
use crate::core::augmenter::SearchAugmenter;
use crate::core::loader::load_vendors;
use crate::core::opportunities::{parse_opportunities, OpportunityAnalyzer};
use crate::core::report::ReportFormatter;
use crate::core::runner::StageRunner;
use crate::domain::model::{RunReport, VendorOutcome};
use crate::domain::ports::{LanguageModel, Storage};
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Instant;

/// 讀取 → 分析 → 產生報表 → 存檔
pub struct VendorAnalysisEngine<S: Storage> {
    csv_path: String,
    runner: StageRunner,
    storage: S,
    formatter: ReportFormatter,
    opportunities: Option<OpportunityAnalyzer>,
    save_results: bool,
    timestamp: Option<DateTime<Local>>,
}

impl<S: Storage> VendorAnalysisEngine<S> {
    pub fn new(csv_path: impl Into<String>, runner: StageRunner, storage: S) -> Self {
        Self {
            csv_path: csv_path.into(),
            runner,
            storage,
            formatter: ReportFormatter::new(),
            opportunities: None,
            save_results: true,
            timestamp: None,
        }
    }

    /// 依設定建立 OpenAI 與 Serper adapter；沒有搜尋 key 時停用 augmentation
    pub fn from_config(config: &PipelineConfig, storage: S) -> Result<Self> {
        config.validate()?;

        let model: Arc<dyn LanguageModel> = Arc::new(OpenAiChatModel::new(
            &config.api_key,
            &config.model,
            &config.llm_base_url,
            config.temperature,
            config.request_timeout,
        )?);

        let augmenter = match &config.search_api_key {
            Some(key) => {
                let search = SerperSearch::new(
                    key,
                    &config.search_base_url,
                    config.search_results,
                    config.request_timeout,
                )?;
                SearchAugmenter::new(Arc::new(search), config.max_snippet_chars)
            }
            None => {
                tracing::warn!("⚠️ SERPER_API_KEY not set, vendors will be analyzed without web search");
                SearchAugmenter::disabled()
            }
        };

        let runner = StageRunner::new(
            model.clone(),
            augmenter,
            config.departments.clone(),
            config.retry,
        );

        let mut engine =
            Self::new(config.csv_path.clone(), runner, storage).with_save_results(config.save_results);
        if config.opportunities {
            engine = engine.with_opportunities(OpportunityAnalyzer::new(model));
        }
        Ok(engine)
    }

    pub fn with_save_results(mut self, save_results: bool) -> Self {
        self.save_results = save_results;
        self
    }

    pub fn with_opportunities(mut self, analyzer: OpportunityAnalyzer) -> Self {
        self.opportunities = Some(analyzer);
        self
    }

    /// 固定輸出檔名的時間戳（測試用）
    pub fn with_timestamp(mut self, timestamp: DateTime<Local>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub async fn run(&self) -> Result<RunReport> {
        let start_time = Instant::now();
        tracing::info!("🚀 Starting vendor analysis with model {}", self.runner.model().name());

        // Load：輸入錯誤在任何網路呼叫之前就結束
        let records = load_vendors(&self.csv_path)?;
        if records.is_empty() {
            tracing::warn!("⚠️ {} contains no vendors", self.csv_path);
        }

        // Analyze
        let mut completed = Vec::new();
        let mut failed = Vec::new();
        for outcome in self.runner.run_all(&records).await {
            match outcome {
                VendorOutcome::Completed(analysis) => completed.push(analysis),
                VendorOutcome::Failed(failure) => failed.push(failure),
            }
        }
        tracing::info!(
            "📊 Analyzed {} of {} vendors ({} skipped)",
            completed.len(),
            records.len(),
            failed.len()
        );

        let mut rendered = self.formatter.render(&completed, &failed);
        let timestamp = self.timestamp.unwrap_or_else(Local::now);
        let mut saved_files = Vec::new();

        // Save
        if self.save_results {
            let file_name = format!("results_{}.csv", timestamp.format("%Y%m%d_%H%M%S"));
            let saved = match self.formatter.results_csv(&completed) {
                Ok(data) => self.storage.write_file(&file_name, &data).await,
                Err(e) => Err(e),
            };
            // 結果檔是附帶的輸出，存檔失敗不影響報表
            match saved {
                Ok(()) => {
                    tracing::info!("📁 Results saved to: {}", file_name);
                    saved_files.push(file_name);
                }
                Err(e) => tracing::warn!("⚠️ Could not save results to {}: {}", file_name, e),
            }
        }

        if let Some(analyzer) = &self.opportunities {
            if completed.is_empty() {
                tracing::warn!("⚠️ No analyzed vendors, skipping opportunity analysis");
            } else {
                match analyzer.identify(&completed).await {
                    Ok(raw) => {
                        let parsed = parse_opportunities(&raw);
                        rendered.push('\n');
                        rendered.push_str(&self.formatter.render_opportunities(&parsed, &raw));

                        if self.save_results {
                            let file_name = format!(
                                "opportunities_{}.txt",
                                timestamp.format("%Y-%m-%d_%H-%M-%S")
                            );
                            match self.storage.write_file(&file_name, raw.as_bytes()).await {
                                Ok(()) => {
                                    tracing::info!("📁 Opportunities saved to: {}", file_name);
                                    saved_files.push(file_name);
                                }
                                Err(e) => tracing::warn!("⚠️ Could not save opportunities: {}", e),
                            }
                        }
                    }
                    Err(e) => tracing::warn!("⚠️ Opportunity analysis failed: {}", e),
                }
            }
        }

        tracing::info!("✅ Vendor analysis finished in {:?}", start_time.elapsed());

        Ok(RunReport {
            rendered,
            total_vendors: records.len(),
            completed,
            failed,
            saved_files,
        })
    }
}

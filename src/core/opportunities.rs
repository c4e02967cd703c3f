use crate::core::prompts::{render_template, OPPORTUNITIES_TEMPLATE};
use crate::domain::model::{Opportunity, VendorAnalysis};
use crate::domain::ports::LanguageModel;
use crate::utils::error::{Result, VendorAiError};
use std::sync::Arc;

const MAX_OPPORTUNITIES: usize = 3;

/// 以整個供應商組合為範圍，請 LLM 挑出前三個節省成本的機會
pub struct OpportunityAnalyzer {
    model: Arc<dyn LanguageModel>,
}

impl OpportunityAnalyzer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub async fn identify(&self, analyses: &[VendorAnalysis]) -> Result<String> {
        if analyses.is_empty() {
            return Err(VendorAiError::input("no analyzed vendors to rank"));
        }

        let prompt = render_template(
            OPPORTUNITIES_TEMPLATE,
            &[("vendor_actions", &vendor_actions(analyses))],
        );

        tracing::info!("💡 Identifying top opportunities across {} vendors", analyses.len());
        let response = self.model.complete(&prompt).await?;
        if response.trim().is_empty() {
            return Err(VendorAiError::llm("opportunity analysis returned an empty response"));
        }
        Ok(response)
    }
}

pub fn vendor_actions(analyses: &[VendorAnalysis]) -> String {
    analyses
        .iter()
        .map(|a| {
            format!(
                "{} ({}): {} | {}",
                a.record.name,
                a.record.formatted_amount(),
                a.action,
                a.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 盡力解析無標題的 CSV 回覆；欄位不足的列直接略過
pub fn parse_opportunities(text: &str) -> Vec<Opportunity> {
    let body: String = text
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n");

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    reader
        .records()
        .filter_map(|row| row.ok())
        .filter(|row| row.len() >= 3)
        .filter(|row| !row[0].eq_ignore_ascii_case("vendor name"))
        .filter(|row| !row[0].is_empty())
        .map(|row| Opportunity {
            vendor: row[0].to_string(),
            action: row[1].to_string(),
            explanation: row.iter().skip(2).collect::<Vec<_>>().join(", "),
        })
        .take(MAX_OPPORTUNITIES)
        .collect()
}

use crate::domain::model::{FailedVendor, Opportunity, VendorAnalysis};
use crate::utils::error::{Result, VendorAiError};
use serde::Serialize;
use std::fmt::Write;

const SEPARATOR: &str = "------------------------------------------------------------";

/// 結果 CSV 的一列
#[derive(Debug, Serialize)]
struct ResultRow<'a> {
    #[serde(rename = "Vendor")]
    vendor: &'a str,
    #[serde(rename = "Amount")]
    amount: String,
    #[serde(rename = "Description")]
    description: &'a str,
    #[serde(rename = "Category")]
    category: &'a str,
    #[serde(rename = "Action")]
    action: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ReportFormatter;

impl ReportFormatter {
    pub fn new() -> Self {
        Self
    }

    /// 固定版面：每個完成的供應商一個區塊，失敗的列在最後
    pub fn render(&self, analyses: &[VendorAnalysis], failures: &[FailedVendor]) -> String {
        let mut out = String::new();
        let total = analyses.len() + failures.len();

        let _ = writeln!(
            out,
            "Vendor recommendations ({} of {} vendors analyzed)",
            analyses.len(),
            total
        );
        let _ = writeln!(out, "{}", SEPARATOR);

        for analysis in analyses {
            let _ = writeln!(out, "Vendor:         {}", analysis.record.name);
            let _ = writeln!(out, "Spend:          {}", analysis.record.formatted_amount());
            let _ = writeln!(out, "Category:       {}", analysis.category);
            let _ = writeln!(out, "Services:       {}", analysis.description);
            let _ = writeln!(out, "Recommendation: {}", analysis.action);
            let _ = writeln!(
                out,
                "Augmented:      {}",
                if analysis.augmentation.is_augmented() { "yes" } else { "no" }
            );
            let _ = writeln!(out, "{}", SEPARATOR);
        }

        if !failures.is_empty() {
            let _ = writeln!(out, "Skipped vendors:");
            for failed in failures {
                let _ = writeln!(
                    out,
                    "  - {}: {} stage failed: {}",
                    failed.vendor, failed.stage, failed.message
                );
            }
        }

        out
    }

    pub fn render_opportunities(&self, opportunities: &[Opportunity], raw: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Top cost-saving opportunities");
        let _ = writeln!(out, "{}", SEPARATOR);

        if opportunities.is_empty() {
            let _ = writeln!(out, "{}", raw.trim());
        } else {
            for (index, opportunity) in opportunities.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "{}. {} -> {}",
                    index + 1,
                    opportunity.vendor,
                    opportunity.action
                );
                let _ = writeln!(out, "   {}", opportunity.explanation);
            }
        }
        out
    }

    /// `Vendor,Amount,Description,Category,Action`
    pub fn results_csv(&self, analyses: &[VendorAnalysis]) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        if analyses.is_empty() {
            writer.write_record(["Vendor", "Amount", "Description", "Category", "Action"])?;
        }

        for analysis in analyses {
            writer.serialize(ResultRow {
                vendor: &analysis.record.name,
                amount: format!("{:.2}", analysis.record.amount),
                description: &analysis.description,
                category: &analysis.category,
                action: analysis.action.to_string(),
            })?;
        }

        writer
            .into_inner()
            .map_err(|e| VendorAiError::IoError(e.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{
        Action, Augmentation, StageKind, UnaugmentedReason, VendorRecord,
    };

    fn analysis(name: &str, amount: i64, action: Action) -> VendorAnalysis {
        VendorAnalysis {
            record: VendorRecord::new(name, amount.into()),
            search_query: format!("{} services", name),
            augmentation: Augmentation::Augmented {
                query: format!("{} services", name),
                snippet: "snippet".to_string(),
            },
            description: "Provides cloud hosting, with managed databases.".to_string(),
            category: "Engineering".to_string(),
            action,
            stages: Vec::new(),
        }
    }

    #[test]
    fn test_render_one_block_per_vendor() {
        let analyses = vec![
            analysis("Acme", 1000, Action::Optimize),
            analysis(
                "Globex",
                2000,
                Action::Consolidate {
                    with: "Acme".to_string(),
                },
            ),
        ];
        let rendered = ReportFormatter::new().render(&analyses, &[]);

        assert!(rendered.starts_with("Vendor recommendations (2 of 2 vendors analyzed)\n"));
        assert_eq!(rendered.matches("Vendor:         ").count(), 2);
        assert!(rendered.contains("Spend:          $2000.00\n"));
        assert!(rendered.contains("Recommendation: consolidate: Acme\n"));
        assert!(!rendered.contains("Skipped vendors"));
    }

    #[test]
    fn test_render_lists_skipped_vendors() {
        let mut unaugmented = analysis("Globex", 2000, Action::Terminate);
        unaugmented.augmentation = Augmentation::Unaugmented(UnaugmentedReason::NoSearchKey);
        let failures = vec![FailedVendor {
            vendor: "Acme".to_string(),
            stage: StageKind::Discover,
            message: "HTTP 500".to_string(),
        }];

        let rendered = ReportFormatter::new().render(&[unaugmented], &failures);

        assert!(rendered.contains("(1 of 2 vendors analyzed)"));
        assert!(rendered.contains("Augmented:      no\n"));
        assert!(rendered.contains("  - Acme: Discover stage failed: HTTP 500\n"));
        assert!(!rendered.contains("Vendor:         Acme"));
    }

    #[test]
    fn test_results_csv_layout() {
        let csv = ReportFormatter::new()
            .results_csv(&[analysis("Acme", 1000, Action::Optimize)])
            .unwrap();
        let text = String::from_utf8(csv).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Vendor,Amount,Description,Category,Action");
        assert_eq!(
            lines[1],
            "Acme,1000.00,\"Provides cloud hosting, with managed databases.\",Engineering,optimize"
        );
    }

    #[test]
    fn test_results_csv_empty_still_has_header() {
        let csv = ReportFormatter::new().results_csv(&[]).unwrap();
        assert_eq!(
            String::from_utf8(csv).unwrap(),
            "Vendor,Amount,Description,Category,Action\n"
        );
    }

    #[test]
    fn test_render_opportunities_falls_back_to_raw_text() {
        let rendered = ReportFormatter::new().render_opportunities(&[], "  nothing to report ");
        assert!(rendered.ends_with("nothing to report\n"));
    }
}

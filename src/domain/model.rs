use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// CSV 中的一列供應商資料
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorRecord {
    pub name: String,
    pub amount: Decimal,
}

impl VendorRecord {
    pub fn new(name: impl Into<String>, amount: Decimal) -> Self {
        Self {
            name: name.into(),
            amount,
        }
    }

    /// 以兩位小數顯示金額，例如 `$1200.50`
    pub fn formatted_amount(&self) -> String {
        format!("${:.2}", self.amount)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    Identify,
    Discover,
    Categorize,
    Recommend,
}

impl StageKind {
    pub const ORDER: [StageKind; 4] = [
        StageKind::Identify,
        StageKind::Discover,
        StageKind::Categorize,
        StageKind::Recommend,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Identify => "Identify",
            StageKind::Discover => "Discover",
            StageKind::Categorize => "Categorize",
            StageKind::Recommend => "Recommend",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    pub stage: StageKind,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnaugmentedReason {
    NoSearchKey,
    SearchFailed(String),
    NoResults,
}

/// 搜尋增強的結果：有片段或明確說明為何沒有
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Augmentation {
    Augmented { query: String, snippet: String },
    Unaugmented(UnaugmentedReason),
}

impl Augmentation {
    pub fn is_augmented(&self) -> bool {
        matches!(self, Augmentation::Augmented { .. })
    }

    pub fn snippet(&self) -> Option<&str> {
        match self {
            Augmentation::Augmented { snippet, .. } => Some(snippet),
            Augmentation::Unaugmented(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Optimize,
    Consolidate { with: String },
    Terminate,
    Unrecognized(String),
}

impl Action {
    /// 盡力解析 LLM 回覆；無法辨識時保留原文
    pub fn parse(raw: &str) -> Action {
        let line = raw
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("");
        let cleaned = line
            .trim_start_matches(|c: char| c == '-' || c.is_whitespace())
            .trim_matches(is_decoration);
        let cleaned = strip_label(cleaned, "recommendation:").trim_matches(is_decoration);
        let cleaned = strip_label(cleaned, "action:").trim_matches(is_decoration);
        let lower = cleaned.to_lowercase();

        if lower == "optimize" {
            return Action::Optimize;
        }
        if lower == "terminate" {
            return Action::Terminate;
        }
        if lower.starts_with("consolidate") {
            let target = cleaned
                .get("consolidate".len()..)
                .unwrap_or("")
                .trim_start_matches(|c: char| c == ':' || c.is_whitespace())
                .trim_start_matches(|c: char| c == '[' || c == '(')
                .trim_end_matches(|c: char| c == ']' || c == ')')
                .trim_matches(is_decoration);
            let target = target.strip_prefix("with ").unwrap_or(target).trim();
            if !target.is_empty() {
                return Action::Consolidate {
                    with: target.to_string(),
                };
            }
        }

        Action::Unrecognized(cleaned.to_string())
    }
}

/// Markdown 強調、引號與句點
fn is_decoration(c: char) -> bool {
    matches!(c, '*' | '_' | '`' | '"' | '\'' | '.') || c.is_whitespace()
}

fn strip_label<'a>(text: &'a str, label: &str) -> &'a str {
    if text.len() >= label.len()
        && text.is_char_boundary(label.len())
        && text[..label.len()].eq_ignore_ascii_case(label)
    {
        text[label.len()..].trim()
    } else {
        text
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Optimize => f.write_str("optimize"),
            Action::Consolidate { with } => write!(f, "consolidate: {}", with),
            Action::Terminate => f.write_str("terminate"),
            Action::Unrecognized(raw) => f.write_str(raw),
        }
    }
}

/// 單一供應商跑完四個 stage 後的結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorAnalysis {
    pub record: VendorRecord,
    pub search_query: String,
    pub augmentation: Augmentation,
    pub description: String,
    pub category: String,
    pub action: Action,
    pub stages: Vec<StageResult>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedVendor {
    pub vendor: String,
    pub stage: StageKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorOutcome {
    Completed(VendorAnalysis),
    Failed(FailedVendor),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opportunity {
    pub vendor: String,
    pub action: String,
    pub explanation: String,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub rendered: String,
    pub total_vendors: usize,
    pub completed: Vec<VendorAnalysis>,
    pub failed: Vec<FailedVendor>,
    pub saved_files: Vec<String>,
}

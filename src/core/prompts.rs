//! Prompt templates for each stage and the portfolio-wide opportunity pass.
//!
//! Placeholders use `{name}` and are filled in a single pass, so values that
//! happen to contain braces are never re-expanded.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder pattern is valid"));

pub const DEFAULT_DEPARTMENTS: [&str; 12] = [
    "Engineering",
    "Facilities",
    "G&A",
    "Legal",
    "M&A",
    "Marketing",
    "SaaS",
    "Product",
    "Professional Services",
    "Sales",
    "Support",
    "Finance",
];

pub const IDENTIFY_TEMPLATE: &str =
    "Generate a search query to find what services {vendor_name} provides.";

pub const DISCOVER_TEMPLATE: &str = "
Analyze the search results about a vendor and infer the core services they provide.
Focus on identifying patterns, key offerings, and the primary value proposition, not just summarizing the text.
Avoid mentioning the vendor's name. Be concise and descriptive in one sentence.

Vendor: {vendor_name}
Search Query: {search_query}

Search Results:
{search_results}

Description of Services:";

pub const NO_SEARCH_RESULTS: &str =
    "(no search results available; rely on what is generally known about this vendor)";

pub const CATEGORIZE_TEMPLATE: &str = "
Objective:
Analyze the following vendor service description and any other relevant context to determine the most appropriate departmental category.
Focus on the core function of the service, not the vendor's name.

Service Description: {service_description}

Available Categories: {departments}

Guidelines:
- Choose the category that best aligns with the primary purpose of the service.
- If the service spans multiple departments, pick the one it most directly supports.
- Return only the category name, without explanations or extra text.

Answer:";

pub const RECOMMEND_TEMPLATE: &str = "
Objective:
Analyze the vendor portfolio holistically and recommend the best action for
{vendor_name} based on strategic alignment, cost efficiency, and redundancy.

Input Data:
- Full Vendor Portfolio:
{vendor_summary}
- Target Vendor: {vendor_name}
- Spend: {amount}
- Category: {category}
- Service Description: {description}

Evaluation Criteria:
1. Duplicates/Overlaps: Does another vendor provide the same or similar service?
2. Spend Efficiency: Is the cost justified relative to value?
3. Portfolio Fit: Does this vendor align with long-term needs?

Possible Actions:
- `optimize` (Renegotiate terms, improve efficiency)
- `consolidate: [Vendor Name]` (Merge with a specific vendor; must specify)
- `terminate` (Discontinue due to irrelevance to business operations, redundancy or low value)

Rules:
- Return ONLY the action in the exact format:
- `optimize`
- `consolidate: [Vendor Name]`
- `terminate`
- Never add explanations or deviations.

Example Outputs:
- \"consolidate: AWS\"
- \"terminate\"
- \"optimize\"

Recommendation for {vendor_name}: ";

pub const OPPORTUNITIES_TEMPLATE: &str = "
Analyze the vendor dataset holistically and identify the TOP 3 cost-saving opportunities with the highest potential impact.
Evaluate each opportunity using these criteria in order of priority:

1. Potential savings magnitude (prioritize highest $ impact)
2. Service/category redundancy (overlap with other vendors)
3. Strategic alignment (low-value or non-core services)

Input Data:
{vendor_actions}

Required Output Format:
- Strictly CSV format with EXACTLY these columns: \"Vendor name\",\"Recommended action\",\"Explanation\"
- Each explanation must include:
  Specific $ impact potential (estimate if exact unavailable)
  Clear redundancy/overlap evidence (if applicable)
  Strategic rationale

Rules:
- Output ONLY valid CSV data - no headers, titles, or explanations
- Never use markdown code blocks or quotes
- Limit the output to only the TOP 3
- If fewer than 3 opportunities exist, leave remaining rows empty

Example Output:
\"Acme Corp\",\"consolidate: XYZ Inc\",\"$250K potential savings, duplicate CRM tools\"
\"Beta LLC\",\"terminate\",\"$180K savings, non-core legal service\"
\"Gamma Inc\",\"optimize\",\"$90K via contract renegotiation\"
";

/// 以 `vars` 替換 `{key}`；未知的 key 原樣保留
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let key = &caps[1];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_identify_prompt() {
        let prompt = render_template(IDENTIFY_TEMPLATE, &[("vendor_name", "Acme")]);
        assert_eq!(
            prompt,
            "Generate a search query to find what services Acme provides."
        );
    }

    #[test]
    fn test_render_is_single_pass() {
        let prompt = render_template(
            "{a} and {b}",
            &[("a", "literal {b}"), ("b", "second")],
        );
        assert_eq!(prompt, "literal {b} and second");
    }

    #[test]
    fn test_unknown_placeholder_is_kept() {
        let prompt = render_template("Hello {unknown}", &[("vendor_name", "Acme")]);
        assert_eq!(prompt, "Hello {unknown}");
    }

    #[test]
    fn test_recommend_template_fills_every_occurrence() {
        let prompt = render_template(
            RECOMMEND_TEMPLATE,
            &[
                ("vendor_name", "Acme"),
                ("vendor_summary", "Acme ($10.00)"),
                ("amount", "$10.00"),
                ("category", "SaaS"),
                ("description", "CRM software"),
            ],
        );
        assert!(!prompt.contains("{vendor_name}"));
        assert!(prompt.ends_with("Recommendation for Acme: "));
    }
}

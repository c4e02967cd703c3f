use crate::domain::model::VendorRecord;
use crate::utils::error::{Result, VendorAiError};
use rust_decimal::Decimal;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

pub const VENDOR_COLUMN: &str = "Vendor";
pub const AMOUNT_COLUMN: &str = "Amount";

/// 從 CSV 檔案讀取供應商清單，保持檔案中的順序
pub fn load_vendors<P: AsRef<Path>>(path: P) -> Result<Vec<VendorRecord>> {
    let path = path.as_ref();
    tracing::debug!("Reading vendor CSV from {}", path.display());

    let file = File::open(path).map_err(|e| {
        VendorAiError::input(format!("cannot open '{}': {}", path.display(), e))
    })?;

    load_vendors_from_reader(file)
}

pub fn load_vendors_from_reader<R: Read>(reader: R) -> Result<Vec<VendorRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| VendorAiError::input(format!("unreadable CSV header: {}", e)))?
        .clone();

    let vendor_idx = column_index(&headers, VENDOR_COLUMN)?;
    let amount_idx = column_index(&headers, AMOUNT_COLUMN)?;

    let mut records = Vec::new();
    for (index, row) in csv_reader.records().enumerate() {
        let row_number = index + 1;
        let row = row.map_err(|e| {
            VendorAiError::input(format!("unreadable CSV row {}: {}", row_number, e))
        })?;

        let name = row.get(vendor_idx).unwrap_or("").trim();
        if name.is_empty() {
            return Err(VendorAiError::input(format!(
                "row {}: vendor name is empty",
                row_number
            )));
        }

        let raw_amount = row.get(amount_idx).unwrap_or("");
        let amount = parse_amount(raw_amount).map_err(|reason| {
            VendorAiError::input(format!(
                "row {} ({}): invalid amount '{}': {}",
                row_number, name, raw_amount, reason
            ))
        })?;

        records.push(VendorRecord::new(name, amount));
    }

    tracing::info!("📥 Loaded {} vendor records", records.len());
    Ok(records)
}

fn column_index(headers: &csv::StringRecord, column: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim() == column)
        .ok_or_else(|| {
            VendorAiError::input(format!(
                "missing required column '{}' (found: {})",
                column,
                headers.iter().collect::<Vec<_>>().join(", ")
            ))
        })
}

/// 去掉 `$`、千分位逗號與空白後解析金額，例如 `"$1,200.50"`
pub fn parse_amount(raw: &str) -> std::result::Result<Decimal, String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return Err("amount is empty".to_string());
    }

    let amount = Decimal::from_str(&cleaned).map_err(|e| e.to_string())?;
    if amount.is_zero() {
        return Ok(Decimal::ZERO);
    }
    if amount.is_sign_negative() {
        return Err("amount must not be negative".to_string());
    }
    Ok(amount)
}

//! Master dataset of extracted market rows.
//!
//! A flat CSV file. New rows are appended after every batch, then the whole
//! file is re-sorted once by `(scan_id, timestamp_utc, trade_type, row_num)`.

pub mod reader;
pub mod sort;
pub mod writer;

pub use reader::read_records;
pub use sort::sort_dataset;
pub use writer::append_records;

/// CSV header row of the master dataset.
pub const CSV_HEADER: &str =
    "scan_id,lot_id,timestamp_utc,currency_want,currency_have,trade_type,row_num,ratio,stock";

/// Number of columns in `CSV_HEADER`.
pub const COLUMN_COUNT: usize = 9;

/// One extracted table row.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRecord {
    pub scan_id: i64,
    pub lot_id: String,
    pub timestamp_utc: String,
    pub currency_want: String,
    pub currency_have: String,
    /// Table name from the layout ("buy", "sell", ...)
    pub trade_type: String,
    /// 1-based row index within the table
    pub row_num: u32,
    pub ratio: Option<f64>,
    pub stock: Option<i64>,
}

impl ExtractedRecord {
    /// Formats the record as one CSV line (no trailing newline).
    pub fn to_csv_line(&self) -> String {
        let ratio = self.ratio.map(|r| format!("{:?}", r)).unwrap_or_default();
        let stock = self.stock.map(|s| s.to_string()).unwrap_or_default();
        [
            self.scan_id.to_string(),
            escape_field(&self.lot_id),
            escape_field(&self.timestamp_utc),
            escape_field(&self.currency_want),
            escape_field(&self.currency_have),
            escape_field(&self.trade_type),
            self.row_num.to_string(),
            ratio,
            stock,
        ]
        .join(",")
    }
}

/// Quotes a field if it contains a separator or quote.
///
/// Line breaks become spaces so every record stays on one line.
pub fn escape_field(value: &str) -> String {
    let value = value.replace(['\r', '\n'], " ");
    if value.contains([',', '"']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value
    }
}

/// Splits one CSV line into fields, honoring double-quoted fields.
pub fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);

    fields
}

#[cfg(test)]
pub(crate) fn sample_record(scan_id: i64, timestamp: &str, trade_type: &str, row_num: u32) -> ExtractedRecord {
    ExtractedRecord {
        scan_id,
        lot_id: format!("lot-{}", scan_id),
        timestamp_utc: timestamp.to_string(),
        currency_want: "Chaos Orb".to_string(),
        currency_have: "Exalted Orb".to_string(),
        trade_type: trade_type.to_string(),
        row_num,
        ratio: Some(1.5),
        stock: Some(100),
    }
}

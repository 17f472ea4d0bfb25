//! Product catalog records and spreadsheet row normalization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fixed column order of the source spreadsheet.
const COL_IMAGE: usize = 0;
const COL_NAME: usize = 1;
const COL_PRICE: usize = 2;
const COL_DESCRIPTION: usize = 3;

/// One catalog entry, rebuilt wholesale on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub image: String,
    pub name: String,
    pub price: f64,
    pub description: String,
}

impl ProductRecord {
    /// Normalize one raw spreadsheet row into a record.
    ///
    /// Returns `None` for rows whose image, name, and description are all
    /// empty after trimming; such rows carry no displayable content.
    pub fn from_row(row: &[Value]) -> Option<Self> {
        let image = cell_text(row, COL_IMAGE);
        let name = cell_text(row, COL_NAME);
        let description = cell_text(row, COL_DESCRIPTION);

        if image.is_empty() && name.is_empty() && description.is_empty() {
            return None;
        }

        Some(Self {
            image,
            name,
            price: parse_price(row.get(COL_PRICE)),
            description,
        })
    }
}

/// Absent or null cells become the empty string; everything else is
/// stringified and trimmed.
fn cell_text(row: &[Value], index: usize) -> String {
    match row.get(index) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.trim().to_string(),
        Some(other) => other.to_string().trim().to_string(),
    }
}

/// Parse a price cell.
///
/// Numeric cells pass through. String cells are stripped of everything
/// but digits, comma, period, and minus, with comma treated as a decimal
/// separator. Unparsable or negative results fall back to `0.0`.
pub fn parse_price(cell: Option<&Value>) -> f64 {
    match cell {
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(Value::String(text)) => {
            let sanitized: String = text
                .chars()
                .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
                .map(|c| if c == ',' { '.' } else { c })
                .collect();
            match sanitized.parse::<f64>() {
                Ok(value) if value.is_finite() && value >= 0.0 => value,
                _ => 0.0,
            }
        }
        _ => 0.0,
    }
}

//! # Decimal Text Parsing
//!
//! Lenient decimal parsing for statement cells.
//!
//! Brokerage statements mix plain decimals (`1050.00`) with Brazilian
//! formatted amounts (`R$ 1.050,00`), and use `-` or an empty cell for
//! "no value". [`parse_decimal_text`] accepts all of these.

use rust_decimal::Decimal;
use std::str::FromStr;

/// Parses a decimal from statement text.
///
/// Returns `Ok(None)` for blank cells and the `-` placeholder.
///
/// # Errors
///
/// Returns a description of the problem when the text is not numeric.
///
/// # Examples
///
/// ```
/// use portfolio_ingest::domain::value_objects::decimal_text::parse_decimal_text;
/// use rust_decimal::Decimal;
///
/// assert_eq!(parse_decimal_text("R$ 1.050,00").unwrap(), Some(Decimal::new(105000, 2)));
/// assert_eq!(parse_decimal_text("10.5").unwrap(), Some(Decimal::new(105, 1)));
/// assert_eq!(parse_decimal_text(" - ").unwrap(), None);
/// assert!(parse_decimal_text("abc").is_err());
/// ```
pub fn parse_decimal_text(text: &str) -> Result<Option<Decimal>, String> {
    let cleaned: String = text
        .replace("R$", "")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect();

    if cleaned.is_empty() || cleaned == "-" {
        return Ok(None);
    }

    // Comma present means Brazilian notation: '.' groups thousands.
    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned
    };

    Decimal::from_str(&normalized)
        .map(Some)
        .map_err(|_| format!("'{}' is not a number", text.trim()))
}

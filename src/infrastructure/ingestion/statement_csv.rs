//! # Statement CSV Parser
//!
//! Decodes a brokerage statement export into [`OperationDraft`]s.
//!
//! The expected layout is the B3 "Movimentação" export:
//!
//! ```text
//! Entrada/Saída;Data;Movimentação;Produto;Instituição;Quantidade;Preço unitário;Valor da Operação
//! Credito;15/03/2024;Compra;PETR4 - PETROBRAS;XP INVESTIMENTOS CCTVM S/A;100;R$ 10,50;R$ 1.050,00
//! ```
//!
//! Header names are matched accent- and case-insensitively, in any order.
//! An optional `Id Original` column carries the source id used for
//! duplicate detection. The delimiter (`;` or `,`) is detected from the
//! header line.
//!
//! Structural problems (empty input, missing column, broken encoding) fail
//! the whole statement. Cell problems (bad date or number) are reported per
//! row in [`StatementRow::draft`] so the caller can keep going.

use crate::domain::entities::OperationDraft;
use crate::domain::value_objects::decimal_text::parse_decimal_text;
use crate::domain::value_objects::enums::normalize_label;
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Terminator, Trim};
use rust_decimal::Decimal;
use thiserror::Error;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Statement-level parse failure.
#[derive(Debug, Error)]
pub enum StatementError {
    /// The input contains no header line.
    #[error("statement is empty")]
    Empty,

    /// The input is not valid UTF-8.
    #[error("statement is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// A required column is absent from the header.
    #[error("statement is missing column '{0}'")]
    MissingColumn(&'static str),

    /// The CSV reader failed.
    #[error("malformed statement: {0}")]
    Csv(#[from] csv::Error),
}

/// One data row of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementRow {
    /// 1-based line number in the source file.
    pub row_number: u64,
    /// The row as it appeared in the source, fields re-joined with the
    /// detected delimiter.
    pub raw: String,
    /// The decoded draft, or the reason a cell could not be decoded.
    pub draft: Result<OperationDraft, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Direction,
    Date,
    Movement,
    Product,
    Institution,
    Quantity,
    UnitPrice,
    Value,
    OriginalId,
}

impl Column {
    const REQUIRED: [Self; 8] = [
        Self::Direction,
        Self::Date,
        Self::Movement,
        Self::Product,
        Self::Institution,
        Self::Quantity,
        Self::UnitPrice,
        Self::Value,
    ];

    const fn label(self) -> &'static str {
        match self {
            Self::Direction => "Entrada/Saída",
            Self::Date => "Data",
            Self::Movement => "Movimentação",
            Self::Product => "Produto",
            Self::Institution => "Instituição",
            Self::Quantity => "Quantidade",
            Self::UnitPrice => "Preço unitário",
            Self::Value => "Valor da Operação",
            Self::OriginalId => "Id Original",
        }
    }

    fn from_header(header: &str) -> Option<Self> {
        match normalize_label(header).as_str() {
            "entrada/saida" | "entrada / saida" => Some(Self::Direction),
            "data" => Some(Self::Date),
            "movimentacao" => Some(Self::Movement),
            "produto" => Some(Self::Product),
            "instituicao" => Some(Self::Institution),
            "quantidade" => Some(Self::Quantity),
            "preco unitario" => Some(Self::UnitPrice),
            "valor da operacao" => Some(Self::Value),
            "id original" | "id" => Some(Self::OriginalId),
            _ => None,
        }
    }
}

/// Maps columns to their positions in a record.
#[derive(Debug, Clone, Default)]
struct Layout {
    positions: Vec<(Column, usize)>,
}

impl Layout {
    fn from_headers(headers: &StringRecord) -> Result<Self, StatementError> {
        let mut positions = Vec::new();
        for (index, header) in headers.iter().enumerate() {
            if let Some(column) = Column::from_header(header)
                && !positions.iter().any(|(c, _)| *c == column)
            {
                positions.push((column, index));
            }
        }
        for column in Column::REQUIRED {
            if !positions.iter().any(|(c, _)| *c == column) {
                return Err(StatementError::MissingColumn(column.label()));
            }
        }
        Ok(Self { positions })
    }

    fn cell<'r>(&self, record: &'r StringRecord, column: Column) -> Option<&'r str> {
        self.positions
            .iter()
            .find(|(c, _)| *c == column)
            .and_then(|(_, index)| record.get(*index))
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// Parses a statement export.
///
/// Blank lines are skipped. The returned drafts carry no owner; the caller
/// assigns the importing user.
///
/// # Errors
///
/// Returns a [`StatementError`] when the statement as a whole is unusable.
pub fn parse_statement(content: &[u8]) -> Result<Vec<StatementRow>, StatementError> {
    let content = content.strip_prefix(UTF8_BOM).unwrap_or(content);
    let text = std::str::from_utf8(content)?;
    let header_line = text
        .lines()
        .find(|line| !line.trim().is_empty())
        .ok_or(StatementError::Empty)?;
    let delimiter = detect_delimiter(header_line);

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .terminator(Terminator::Any(b'\n'))
        .from_reader(text.as_bytes());

    let layout = Layout::from_headers(reader.headers()?)?;
    let separator = char::from(delimiter).to_string();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let row_number = record.position().map_or(0, csv::Position::line);
        rows.push(StatementRow {
            row_number,
            raw: record.iter().collect::<Vec<_>>().join(&separator),
            draft: decode_row(&layout, &record),
        });
    }
    Ok(rows)
}

/// Picks `;` when the header line has at least as many semicolons as
/// commas.
fn detect_delimiter(header_line: &str) -> u8 {
    let semicolons = header_line.matches(';').count();
    let commas = header_line.matches(',').count();
    if semicolons > 0 && semicolons >= commas {
        b';'
    } else {
        b','
    }
}

fn decode_row(layout: &Layout, record: &StringRecord) -> Result<OperationDraft, String> {
    let text = |column| layout.cell(record, column).map(str::to_string);
    let number = |column: Column| -> Result<Option<Decimal>, String> {
        layout
            .cell(record, column)
            .map_or(Ok(None), parse_decimal_text)
            .map_err(|reason| format!("{}: {reason}", column.label()))
    };

    Ok(OperationDraft {
        direction: text(Column::Direction),
        date: layout.cell(record, Column::Date).map(parse_date).transpose()?,
        movement: text(Column::Movement),
        product: text(Column::Product),
        institution: text(Column::Institution),
        quantity: number(Column::Quantity)?,
        unit_price: number(Column::UnitPrice)?,
        value: number(Column::Value)?,
        original_id: text(Column::OriginalId),
        user_id: None,
    })
}

/// Accepts `dd/mm/yyyy` and ISO `yyyy-mm-dd`.
fn parse_date(text: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(text, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d"))
        .map_err(|_| format!("{}: '{text}' is not a date", Column::Date.label()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const HEADER: &str = "Entrada/Saída;Data;Movimentação;Produto;Instituição;Quantidade;Preço unitário;Valor da Operação";

    fn statement(rows: &[&str]) -> Vec<u8> {
        let mut text = HEADER.to_string();
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text.into_bytes()
    }

    mod layout {
        use super::*;

        #[test]
        fn decodes_brazilian_row() {
            let rows = parse_statement(&statement(&[
                "Credito;15/03/2024;Compra;PETR4 - PETROBRAS;XP INVESTIMENTOS;100;R$ 10,50;R$ 1.050,00",
            ]))
            .unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].row_number, 2);
            let draft = rows[0].draft.clone().unwrap();
            assert_eq!(draft.direction.as_deref(), Some("Credito"));
            assert_eq!(draft.date, NaiveDate::from_ymd_opt(2024, 3, 15));
            assert_eq!(draft.quantity, Some(Decimal::new(100, 0)));
            assert_eq!(draft.unit_price, Some(Decimal::new(1050, 2)));
            assert_eq!(draft.value, Some(Decimal::new(105_000, 2)));
            assert_eq!(draft.original_id, None);
            assert_eq!(draft.user_id, None);
        }

        #[test]
        fn comma_delimited_with_original_id_and_reordered_columns() {
            let text = "Id Original,Data,Entrada/Saida,Movimentacao,Produto,Instituicao,Quantidade,Preco unitario,Valor da Operacao\n\
                        b3-1,2024-03-15,Debito,Venda,VALE3,XP,5,70.00,350.00\n";
            let rows = parse_statement(text.as_bytes()).unwrap();
            let draft = rows[0].draft.clone().unwrap();
            assert_eq!(draft.original_id.as_deref(), Some("b3-1"));
            assert_eq!(draft.direction.as_deref(), Some("Debito"));
            assert_eq!(draft.value, Some(Decimal::new(35_000, 2)));
        }

        #[test]
        fn missing_column_fails_statement() {
            let err = parse_statement(b"Data;Produto\n15/03/2024;X\n").unwrap_err();
            assert!(matches!(err, StatementError::MissingColumn("Entrada/Saída")));
        }

        #[test]
        fn empty_input_fails_statement() {
            assert!(matches!(parse_statement(b"\n \n"), Err(StatementError::Empty)));
        }

        #[test]
        fn strips_bom() {
            let mut bytes = UTF8_BOM.to_vec();
            bytes.extend(statement(&["Credito;15/03/2024;Compra;X;Y;1;1;1"]));
            assert_eq!(parse_statement(&bytes).unwrap().len(), 1);
        }
    }

    mod cells {
        use super::*;

        #[test]
        fn placeholder_cells_become_none() {
            let rows = parse_statement(&statement(&["Credito;15/03/2024;Dividendo;X;Y;-;-;-"])).unwrap();
            let draft = rows[0].draft.clone().unwrap();
            assert_eq!(draft.quantity, None);
            assert_eq!(draft.value, None);
        }

        #[test]
        fn bad_cell_is_row_error_and_keeps_raw() {
            let rows = parse_statement(&statement(&[
                "Credito;31/02/2024;Compra;X;Y;1;1;1",
                "Credito;15/03/2024;Compra;X;Y;abc;1;1",
                "",
                "Credito;15/03/2024;Compra;X;Y;1;1;1",
            ]))
            .unwrap();
            assert_eq!(rows.len(), 3);
            assert!(rows[0].draft.as_ref().unwrap_err().contains("Data"));
            assert!(rows[1].draft.as_ref().unwrap_err().contains("Quantidade"));
            assert_eq!(rows[1].raw, "Credito;15/03/2024;Compra;X;Y;abc;1;1");
            assert!(rows[2].draft.is_ok());
        }
    }
}

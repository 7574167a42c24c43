//! Exporting a user's transactions as a CSV file.

use std::sync::Arc;

use axum::{
    Extension,
    extract::{FromRef, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use time::Date;

use crate::{
    AppState, Error,
    timezone::local_today,
    transaction::{Transaction, format_date_pt_br},
    workspace::AppWorkspace,
};

/// The file name used for exports when no other name is given.
pub const DEFAULT_EXPORT_STEM: &str = "financas-transacoes";

const CSV_HEADER: [&str; 6] = ["ID", "Descrição", "Valor", "Tipo", "Categoria", "Data"];

/// A CSV document and the name it should be downloaded as.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvExport {
    /// E.g. "financas-transacoes-2025-01-15.csv".
    pub filename: String,
    pub contents: String,
}

/// Escape a single field, quoting it according to `quote_style`.
fn encode_field(field: &str, quote_style: QuoteStyle) -> Result<Vec<u8>, Error> {
    let mut writer = WriterBuilder::new()
        .quote_style(quote_style)
        .from_writer(Vec::new());
    writer.write_field(field)?;

    writer
        .into_inner()
        .map_err(|error| Error::CsvError(error.into_error().to_string()))
}

fn csv_row(transaction: &Transaction) -> Result<[Vec<u8>; 6], Error> {
    Ok([
        encode_field(&transaction.id.to_string(), QuoteStyle::Necessary)?,
        encode_field(&transaction.description, QuoteStyle::Always)?,
        encode_field(&transaction.amount.to_string(), QuoteStyle::Necessary)?,
        encode_field(transaction.kind.label(), QuoteStyle::Necessary)?,
        encode_field(transaction.category.label(), QuoteStyle::Necessary)?,
        encode_field(&format_date_pt_br(transaction.date), QuoteStyle::Necessary)?,
    ])
}

/// Render `transactions` as CSV, one row per transaction in the given order.
///
/// Descriptions are always quoted, other fields only when they need to be.
/// Type and category are written with their Portuguese labels and dates as
/// "DD/MM/AAAA". Rows are separated by "\n" with no trailing line break.
///
/// # Errors
/// Returns [Error::CsvError] if the document could not be written.
pub fn export_to_csv(
    transactions: &[Transaction],
    filename_stem: &str,
    today: Date,
) -> Result<CsvExport, Error> {
    // Fields are escaped one by one above, so the document writer copies them as is.
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADER)?;
    for transaction in transactions {
        writer.write_record(csv_row(transaction)?)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|error| Error::CsvError(error.into_error().to_string()))?;
    let mut contents =
        String::from_utf8(bytes).map_err(|error| Error::CsvError(error.to_string()))?;
    contents.pop();

    Ok(CsvExport {
        filename: format!("{filename_stem}-{today}.csv"),
        contents,
    })
}

/// The state needed to export transactions.
#[derive(Debug, Clone)]
pub struct ExportState {
    /// The local timezone as a canonical timezone name, e.g. "America/Sao_Paulo".
    pub local_timezone: String,
}

impl FromRef<AppState> for ExportState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// Download the user's transactions as a CSV file.
pub async fn get_transactions_csv(
    State(state): State<ExportState>,
    Extension(workspace): Extension<Arc<AppWorkspace>>,
) -> Response {
    let snapshot = workspace.live().loaded().await;
    let today = local_today(&state.local_timezone);
    let export = match export_to_csv(snapshot.transactions.as_slice(), DEFAULT_EXPORT_STEM, today)
    {
        Ok(export) => export,
        Err(error) => return error.into_response(),
    };

    tracing::info!(
        "exporting {} transactions as {}",
        snapshot.transactions.len(),
        export.filename
    );

    (
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export.filename),
            ),
        ],
        export.contents,
    )
        .into_response()
}

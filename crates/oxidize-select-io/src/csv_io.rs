use std::io::{Read, Write};
use std::path::Path;

use oxidize_select_core::{Dataset, LabeledRow};
use oxidize_select_selection::{OutputColumns, ScoredRow};
use tracing::debug;

use crate::error::{IoError, IoResult};

/// Which header columns hold the label and the optional row id. Every
/// other column is a numeric feature, in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvLayout {
    pub label_column: String,
    pub id_column: Option<String>,
}

impl Default for CsvLayout {
    fn default() -> Self {
        CsvLayout {
            label_column: "label".into(),
            id_column: None,
        }
    }
}

impl CsvLayout {
    pub fn new(label_column: impl Into<String>) -> Self {
        CsvLayout {
            label_column: label_column.into(),
            id_column: None,
        }
    }

    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = Some(column.into());
        self
    }
}

/// Read a labeled CSV file with a header row.
pub fn read_labeled_csv(path: impl AsRef<Path>, layout: &CsvLayout) -> IoResult<Dataset> {
    let reader = csv::Reader::from_path(path.as_ref())?;
    read_labeled(reader, layout)
}

/// Same as [`read_labeled_csv`], from any reader.
pub fn read_labeled_from<R: Read>(source: R, layout: &CsvLayout) -> IoResult<Dataset> {
    read_labeled(csv::Reader::from_reader(source), layout)
}

fn read_labeled<R: Read>(mut rdr: csv::Reader<R>, layout: &CsvLayout) -> IoResult<Dataset> {
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| IoError::MissingColumn(name.to_string()))
    };
    let label_at = find(&layout.label_column)?;
    let id_at = layout.id_column.as_deref().map(find).transpose()?;
    let feature_at: Vec<usize> = (0..headers.len())
        .filter(|&i| i != label_at && Some(i) != id_at)
        .collect();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let number = |i: usize| -> IoResult<f64> {
            let field = record.get(i).unwrap_or("").trim();
            field.parse().map_err(|_| IoError::Parse {
                line,
                column: headers[i].clone(),
                value: field.to_string(),
            })
        };
        let label = number(label_at)?;
        let x = feature_at
            .iter()
            .map(|&i| number(i))
            .collect::<IoResult<Vec<f64>>>()?;
        let mut row = LabeledRow::new(label, x);
        if let Some(i) = id_at {
            row = row.with_id(record.get(i).unwrap_or("").trim());
        }
        rows.push(row);
    }
    debug!(rows = rows.len(), features = feature_at.len(), "read labeled csv");
    Ok(Dataset::new(rows)?)
}

/// Write cascade output: `id` (if any row has one), label, prediction, then
/// one column per class for raw scores and probabilities.
pub fn write_scored_csv(
    path: impl AsRef<Path>,
    rows: &[ScoredRow],
    columns: &OutputColumns,
) -> IoResult<()> {
    let writer = csv::Writer::from_path(path.as_ref())?;
    write_scored(writer, rows, columns)
}

pub fn write_scored_to<W: Write>(
    sink: W,
    rows: &[ScoredRow],
    columns: &OutputColumns,
) -> IoResult<()> {
    write_scored(csv::Writer::from_writer(sink), rows, columns)
}

fn write_scored<W: Write>(
    mut wtr: csv::Writer<W>,
    rows: &[ScoredRow],
    columns: &OutputColumns,
) -> IoResult<()> {
    let with_id = rows.iter().any(|r| r.id.is_some());
    let num_classes = rows.first().map(|r| r.probability.len()).unwrap_or(0);

    let mut header = Vec::new();
    if with_id {
        header.push("id".to_string());
    }
    header.push("label".to_string());
    header.push(columns.prediction.clone());
    header.extend((0..num_classes).map(|c| format!("{}_{}", columns.raw_prediction, c)));
    header.extend((0..num_classes).map(|c| format!("{}_{}", columns.probability, c)));
    wtr.write_record(&header)?;

    for row in rows {
        let mut record = Vec::with_capacity(header.len());
        if with_id {
            record.push(row.id.clone().unwrap_or_default());
        }
        record.push(row.label.to_string());
        record.push(row.prediction.to_string());
        record.extend(row.raw_scores.iter().map(f64::to_string));
        record.extend(row.probability.iter().map(f64::to_string));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

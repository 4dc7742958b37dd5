use crate::error::{ReportError, Result};
use crate::normalize::normalize_cell;
use crate::schema::{AccountRecord, CellValue, FieldValue, Period, ReportSchema, Snapshot, Workbook};
use log::{debug, info};
use std::collections::BTreeMap;

/// Maps one data row onto the header.
///
/// Identity columns are coerced to text; every other named column is normalized
/// to a number. Returns `None` when both identity cells are empty, which is the
/// only reason a row is ever excluded.
pub fn build_record(
    header: &[String],
    row: &[CellValue],
    schema: &ReportSchema,
) -> Option<AccountRecord> {
    let mut primary_name: Option<String> = None;
    let mut alternate_name: Option<String> = None;
    let mut fields = BTreeMap::new();

    for (idx, name) in header.iter().enumerate() {
        if name.is_empty() {
            continue;
        }
        let cell = row.get(idx).unwrap_or(&CellValue::Empty);

        if *name == schema.primary_name_field {
            primary_name.get_or_insert_with(|| cell.to_text());
        } else if *name == schema.alternate_name_field {
            alternate_name.get_or_insert_with(|| cell.to_text());
        } else {
            fields
                .entry(name.clone())
                .or_insert_with(|| FieldValue::Number(normalize_cell(cell)));
        }
    }

    let primary_name = primary_name.unwrap_or_default();
    let alternate_name = alternate_name.unwrap_or_default();

    if primary_name.is_empty() && alternate_name.is_empty() {
        return None;
    }

    Some(AccountRecord::new(primary_name, alternate_name, fields))
}

/// Parses a whole sheet: row 0 is the header, every later row a candidate record.
pub fn parse_sheet(
    sheet_name: &str,
    rows: &[Vec<CellValue>],
    schema: &ReportSchema,
) -> Result<Vec<AccountRecord>> {
    let too_few_rows = || ReportError::TooFewRows {
        sheet: sheet_name.to_string(),
        rows: rows.len(),
    };

    let first = rows.first().ok_or_else(too_few_rows)?;
    if first.iter().all(CellValue::is_blank) {
        return Err(ReportError::MissingHeader {
            sheet: sheet_name.to_string(),
        });
    }
    if rows.len() < 2 {
        return Err(too_few_rows());
    }

    let header: Vec<String> = first.iter().map(|c| c.to_text().trim().to_string()).collect();

    let has_primary = header.contains(&schema.primary_name_field);
    let has_alternate = header.contains(&schema.alternate_name_field);
    if !has_primary && !has_alternate {
        return Err(ReportError::MissingIdentityColumn {
            sheet: sheet_name.to_string(),
            column: schema.primary_name_field.clone(),
        });
    }

    let mut records = Vec::with_capacity(rows.len() - 1);
    for (idx, row) in rows.iter().enumerate().skip(1) {
        match build_record(&header, row, schema) {
            Some(record) => records.push(record),
            None => debug!("Sheet '{}' row {}: no account name, row excluded", sheet_name, idx + 1),
        }
    }

    Ok(records)
}

/// Ingests one period's workbook into a [`Snapshot`].
///
/// Reads `schema.sheet` when set, the first sheet otherwise. Any structural
/// problem fails the whole period; no partial snapshot is produced.
pub fn ingest_workbook(workbook: &Workbook, period: &Period, schema: &ReportSchema) -> Result<Snapshot> {
    let sheet_name = match &schema.sheet {
        Some(name) => name.clone(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or(ReportError::EmptyWorkbook)?,
    };

    let rows = workbook
        .sheet(&sheet_name)
        .ok_or_else(|| ReportError::SheetNotFound(sheet_name.clone()))?;

    let records = parse_sheet(&sheet_name, rows, schema)?;

    info!(
        "Ingested period {} from sheet '{}': {} record(s), {} row(s) excluded",
        period,
        sheet_name,
        records.len(),
        rows.len() - 1 - records.len()
    );

    Ok(Snapshot::new(period.clone(), records))
}

/// Ingests many periods independently. Output order always follows input order.
pub fn ingest_periods(
    inputs: &[(Period, Workbook)],
    schema: &ReportSchema,
) -> Vec<(Period, Result<Snapshot>)> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;

        inputs
            .par_iter()
            .map(|(period, workbook)| (period.clone(), ingest_workbook(workbook, period, schema)))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        inputs
            .iter()
            .map(|(period, workbook)| (period.clone(), ingest_workbook(workbook, period, schema)))
            .collect()
    }
}

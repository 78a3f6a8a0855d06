use crate::metrics::MetricValue;
use crate::regions::RegionDb;
use crate::{Error, Result};
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};

const LOG_TARGET: &str = "   tabular";
const DATE_FORMAT: &str = "%Y-%m-%d";
const MAX_REPORTED_INVALID_IDS: usize = 5;

/// Column names a table is read with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumns {
    pub region: String,
    pub date: Option<String>,

    /// Long tables only: the column naming the variable of each row.
    pub variable: String,

    /// Long tables only: the column holding the value of each row.
    pub value: String,
}

impl Default for TableColumns {
    fn default() -> Self {
        Self {
            region: "region".to_string(),
            date: None,
            variable: "variable".to_string(),
            value: "value".to_string(),
        }
    }
}

/// One cell of a source record, before interpretation.
#[derive(Debug, Clone)]
pub enum Cell {
    Text(String),
    Json(Value),
}

impl Cell {
    /// The cell as an identifier: trimmed non-blank text, or a JSON string or number.
    fn key(&self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s.trim()).filter(|s| !s.is_empty()).map(str::to_string),
            Self::Json(Value::String(s)) => Some(s.trim()).filter(|s| !s.is_empty()).map(str::to_string),
            Self::Json(Value::Number(n)) => Some(n.to_string()),
            Self::Json(_) => None,
        }
    }

    fn value(&self) -> Option<MetricValue> {
        match self {
            Self::Text(s) => MetricValue::from_cell(s),
            Self::Json(v) => MetricValue::from_json(v),
        }
    }
}

/// A source record: column name to cell, in column order.
pub type Record = Vec<(String, Cell)>;

/// Split CSV text into records.
pub fn csv_records(text: &str, source_name: &str) -> Result<(Vec<String>, Vec<Record>)> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::parse(format!("CSV headers of '{source_name}'"), e))?
        .iter()
        .map(str::to_string)
        .collect();

    let records = reader
        .records()
        .map(|record| {
            let record = record.map_err(|e| Error::parse(format!("CSV source '{source_name}'"), e))?;
            Ok(headers
                .iter()
                .zip(record.iter())
                .map(|(h, cell)| (h.clone(), Cell::Text(cell.to_string())))
                .collect())
        })
        .collect::<Result<Vec<Record>>>()?;

    Ok((headers, records))
}

/// Split JSON text holding an array of objects into records.
pub fn json_records(text: &str, source_name: &str) -> Result<(Vec<String>, Vec<Record>)> {
    let rows: Vec<Map<String, Value>> =
        serde_json::from_str(text).map_err(|e| Error::parse(format!("JSON source '{source_name}'"), e))?;
    Ok(object_records(rows))
}

/// Convert JSON objects into records; the columns are the union of all keys.
pub fn object_records(rows: Vec<Map<String, Value>>) -> (Vec<String>, Vec<Record>) {
    let mut columns: Vec<String> = Vec::new();
    let records = rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|(k, v)| {
                    if !columns.contains(&k) {
                        columns.push(k.clone());
                    }
                    (k, Cell::Json(v))
                })
                .collect()
        })
        .collect();

    (columns, records)
}

/// Values of one region at one date (or at no date, for tables without a date column).
#[derive(Debug, Clone, Default)]
pub struct TableRow {
    pub date: Option<NaiveDate>,
    pub values: HashMap<String, MetricValue>,
}

/// A parsed, region-validated table in wide form.
#[derive(Debug, Default)]
pub struct Table {
    pub name: String,
    pub columns: BTreeSet<String>,
    pub rows: HashMap<String, Vec<TableRow>>,
    pub has_dates: bool,
}

impl Table {
    /// Build a table where every record holds all values of one region and date.
    pub fn from_wide_records(name: &str, headers: &[String], records: Vec<Record>, columns: &TableColumns, regions: &RegionDb) -> Result<Self> {
        require_rows(name, &records)?;
        require_column(name, headers, &columns.region)?;
        if let Some(date) = &columns.date {
            require_column(name, headers, date)?;
        }

        let value_columns = headers
            .iter()
            .filter(|h| **h != columns.region && Some(*h) != columns.date.as_ref())
            .cloned()
            .collect();

        let mut builder = TableBuilder::new(name, columns, regions, value_columns, false);
        for record in records {
            let (key, date) = builder.row_key(&record)?;
            let values = record
                .iter()
                .filter(|(column, _)| builder.table.columns.contains(column))
                .filter_map(|(column, cell)| cell.value().map(|v| (column.clone(), v)))
                .collect::<Vec<_>>();
            builder.add(key, date, values);
        }

        builder.finish()
    }

    /// Build a table from records each holding one `(region, date, variable, value)` observation.
    ///
    /// Observations sharing a region and date are pivoted into a single row.
    pub fn from_long_records(name: &str, headers: &[String], records: Vec<Record>, columns: &TableColumns, regions: &RegionDb) -> Result<Self> {
        require_rows(name, &records)?;
        require_column(name, headers, &columns.region)?;
        require_column(name, headers, &columns.variable)?;
        require_column(name, headers, &columns.value)?;
        if let Some(date) = &columns.date {
            require_column(name, headers, date)?;
        }

        let variables = records
            .iter()
            .filter_map(|record| cell(record, &columns.variable).and_then(Cell::key))
            .collect();

        let mut builder = TableBuilder::new(name, columns, regions, variables, true);
        for record in records {
            let (key, date) = builder.row_key(&record)?;
            let observation = cell(&record, &columns.variable)
                .and_then(Cell::key)
                .zip(cell(&record, &columns.value).and_then(Cell::value));
            builder.add(key, date, observation);
        }

        builder.finish()
    }
}

fn cell<'a>(record: &'a Record, column: &str) -> Option<&'a Cell> {
    record.iter().find(|(c, _)| c == column).map(|(_, cell)| cell)
}

fn require_rows(name: &str, records: &[Record]) -> Result<()> {
    if records.is_empty() {
        Err(Error::EmptySourceData(name.to_string()))
    } else {
        Ok(())
    }
}

fn require_column(name: &str, headers: &[String], column: &str) -> Result<()> {
    if headers.iter().any(|h| h == column) {
        Ok(())
    } else {
        Err(Error::UnknownColumn {
            source_name: name.to_string(),
            column: column.to_string(),
        })
    }
}

struct TableBuilder<'a> {
    table: Table,
    columns: &'a TableColumns,
    regions: &'a RegionDb,
    pivot: bool,
    row_index: HashMap<(String, Option<NaiveDate>), usize>,
    total_rows: usize,
    invalid_ids: BTreeSet<String>,
    invalid_rows: usize,
}

impl<'a> TableBuilder<'a> {
    fn new(name: &str, columns: &'a TableColumns, regions: &'a RegionDb, value_columns: BTreeSet<String>, pivot: bool) -> Self {
        Self {
            table: Table {
                name: name.to_string(),
                columns: value_columns,
                rows: HashMap::new(),
                has_dates: columns.date.is_some(),
            },
            columns,
            regions,
            pivot,
            row_index: HashMap::new(),
            total_rows: 0,
            invalid_ids: BTreeSet::new(),
            invalid_rows: 0,
        }
    }

    /// The region id and date of a record; `None` for the region when it is not a known region.
    fn row_key(&mut self, record: &Record) -> Result<(Option<String>, Option<NaiveDate>)> {
        self.total_rows += 1;

        let date = match &self.columns.date {
            Some(column) => {
                let text = cell(record, column).and_then(Cell::key).ok_or_else(|| {
                    Error::parse(format!("row {} of '{}'", self.total_rows, self.table.name), format!("missing value in date column '{column}'"))
                })?;
                let date = NaiveDate::parse_from_str(&text, DATE_FORMAT)
                    .map_err(|e| Error::parse(format!("date '{text}' in '{}'", self.table.name), e))?;
                Some(date)
            }
            None => None,
        };

        let region = cell(record, &self.columns.region).and_then(Cell::key);
        let key = match region {
            Some(id) if self.regions.find_by_region_id(&id).is_some() => Some(id),
            other => {
                self.invalid_rows += 1;
                let _ = self.invalid_ids.insert(other.unwrap_or_default());
                None
            }
        };

        Ok((key, date))
    }

    fn add(&mut self, region: Option<String>, date: Option<NaiveDate>, values: impl IntoIterator<Item = (String, MetricValue)>) {
        let Some(region) = region else {
            return;
        };

        let rows = self.table.rows.entry(region.clone()).or_default();

        let index = if self.pivot {
            *self.row_index.entry((region, date)).or_insert_with(|| {
                rows.push(TableRow { date, values: HashMap::new() });
                rows.len() - 1
            })
        } else {
            rows.push(TableRow { date, values: HashMap::new() });
            rows.len() - 1
        };

        if let Some(row) = rows.get_mut(index) {
            row.values.extend(values);
        }
    }

    fn finish(self) -> Result<Table> {
        if self.invalid_rows == self.total_rows {
            return Err(Error::AllRegionIdsInvalid {
                source_name: self.table.name,
                column: self.columns.region.clone(),
            });
        }

        if self.invalid_rows > 0 {
            let examples: Vec<&str> = self.invalid_ids.iter().take(MAX_REPORTED_INVALID_IDS).map(String::as_str).collect();
            log::warn!(
                target: LOG_TARGET,
                "Ignoring {} of {} rows of '{}' with unknown region ids in column '{}' (e.g. {examples:?})",
                self.invalid_rows,
                self.total_rows,
                self.table.name,
                self.columns.region
            );
        }

        log::debug!(
            target: LOG_TARGET,
            "Parsed '{}': {} column(s), {} region(s)",
            self.table.name,
            self.table.columns.len(),
            self.table.rows.len()
        );

        Ok(self.table)
    }
}

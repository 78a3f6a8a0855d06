mod table;

use self::table::{Table, TableColumns, csv_records, json_records, object_records};
use super::{MetricDataProvider, ResilientClient};
use crate::catalog::MetricCatalog;
use crate::data::{MetricData, MultiRegionMultiMetricDataStore};
use crate::metrics::{Metric, MetricValue};
use crate::regions::{Region, RegionDb};
use crate::timeseries::{Timeseries, TimeseriesPoint};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use strum::Display;
use tokio::sync::OnceCell;
use url::Url;

const LOG_TARGET: &str = "   tabular";

/// Shape of a tabular source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum TableFormat {
    /// One row per region (and date), one column per variable. Metrics select a `column`.
    WideCsv,

    /// One row per `(region, date, variable)` observation. Metrics select a `variable`.
    LongCsv,

    /// An array of objects, one per region (and date). Metrics select a `field`.
    Json,
}

impl TableFormat {
    /// The data reference field metrics use to pick their variable.
    #[must_use]
    pub const fn reference_key(self) -> &'static str {
        match self {
            Self::WideCsv => "column",
            Self::LongCsv => "variable",
            Self::Json => "field",
        }
    }
}

/// Where the table comes from.
#[derive(Debug, Clone)]
pub enum TableSource {
    /// Downloaded once, on first use.
    Url(Url),

    /// Inline CSV or JSON text.
    Text(String),

    /// Already-decoded records, interpreted like JSON objects.
    Rows(Vec<Map<String, Value>>),
}

/// Serves metrics out of a single table.
///
/// The table is loaded and parsed on first use and the parsed form is shared by every later
/// request. Concurrent first requests wait on the same in-flight load. A failed load is not
/// cached, so the next request retries it.
///
/// Region ids are validated against the region directory. Rows with unknown ids are skipped
/// with a warning; a table where no row has a known id is rejected.
#[derive(Debug)]
pub struct TabularProvider {
    id: String,
    format: TableFormat,
    source: TableSource,
    columns: TableColumns,
    regions: Arc<RegionDb>,
    client: ResilientClient,
    table: OnceCell<Arc<Table>>,
}

impl TabularProvider {
    #[must_use]
    pub fn new(id: impl Into<String>, format: TableFormat, source: TableSource, regions: Arc<RegionDb>) -> Self {
        Self {
            id: id.into(),
            format,
            source,
            columns: TableColumns::default(),
            regions,
            client: ResilientClient::default(),
            table: OnceCell::new(),
        }
    }

    /// The column holding region ids (default `region`).
    #[must_use]
    pub fn with_region_column(mut self, column: impl Into<String>) -> Self {
        self.columns.region = column.into();
        self
    }

    /// The column holding `YYYY-MM-DD` dates. Without one, the table holds current values only.
    #[must_use]
    pub fn with_date_column(mut self, column: impl Into<String>) -> Self {
        self.columns.date = Some(column.into());
        self
    }

    /// The variable and value columns of long tables (defaults `variable` and `value`).
    #[must_use]
    pub fn with_long_columns(mut self, variable: impl Into<String>, value: impl Into<String>) -> Self {
        self.columns.variable = variable.into();
        self.columns.value = value.into();
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: ResilientClient) -> Self {
        self.client = client;
        self
    }

    fn source_name(&self) -> String {
        match &self.source {
            TableSource::Url(url) => url.to_string(),
            TableSource::Text(_) | TableSource::Rows(_) => self.id.clone(),
        }
    }

    async fn table(&self) -> Result<&Arc<Table>> {
        if self.table.initialized() {
            log::debug!(target: LOG_TARGET, "Using parsed table for provider '{}'", self.id);
        }

        self.table.get_or_try_init(|| self.load()).await
    }

    async fn load(&self) -> Result<Arc<Table>> {
        let name = self.source_name();
        log::debug!(target: LOG_TARGET, "Loading {} table '{name}' for provider '{}'", self.format, self.id);

        let (headers, records) = match &self.source {
            TableSource::Url(url) => {
                let text = self.client.get_text(url).await?;
                self.split(&text, &name)?
            }
            TableSource::Text(text) => self.split(text, &name)?,
            TableSource::Rows(rows) => object_records(rows.clone()),
        };

        let table = match self.format {
            TableFormat::LongCsv => Table::from_long_records(&name, &headers, records, &self.columns, &self.regions)?,
            TableFormat::WideCsv | TableFormat::Json => Table::from_wide_records(&name, &headers, records, &self.columns, &self.regions)?,
        };

        Ok(Arc::new(table))
    }

    fn split(&self, text: &str, name: &str) -> Result<(Vec<String>, Vec<table::Record>)> {
        match self.format {
            TableFormat::WideCsv | TableFormat::LongCsv => csv_records(text, name),
            TableFormat::Json => json_records(text, name),
        }
    }

    fn column_for<'a>(&self, metric: &'a Metric, table: &Table) -> Result<&'a str> {
        let key = self.format.reference_key();
        let column = metric
            .data_reference()
            .require(metric.id(), key)?
            .as_str()
            .ok_or_else(|| Error::InvalidDataReference {
                metric: metric.id().to_string(),
                reason: format!("'{key}' must be a string"),
            })?;

        if table.columns.contains(column) {
            Ok(column)
        } else {
            Err(Error::UnknownColumn {
                source_name: table.name.clone(),
                column: column.to_string(),
            })
        }
    }
}

fn extract(table: &Table, region: &Arc<Region>, metric: &Arc<Metric>, column: &str, include_timeseries: bool) -> Result<MetricData> {
    let rows = table.rows.get(&region.region_id).map_or(&[][..], Vec::as_slice);

    if !table.has_dates {
        if rows.len() > 1 {
            return Err(Error::AmbiguousNonTimeseriesRow {
                source_name: table.name.clone(),
                region: region.region_id.clone(),
                rows: rows.len(),
            });
        }

        let current_value = rows.first().and_then(|row| row.values.get(column)).cloned();

        // no date column means no history; an empty series says so without forcing a refetch
        let timeseries = include_timeseries.then(Timeseries::empty);
        return Ok(MetricData::new(Arc::clone(metric), Arc::clone(region), current_value, timeseries));
    }

    let timeseries: Timeseries<MetricValue> = rows
        .iter()
        .filter_map(|row| Some(TimeseriesPoint::new(row.date?, row.values.get(column)?.clone())))
        .collect();

    let current_value = timeseries.last_value().cloned();
    Ok(MetricData::new(Arc::clone(metric), Arc::clone(region), current_value, Some(timeseries)))
}

#[async_trait]
impl MetricDataProvider for TabularProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch_data(
        &self,
        regions: &[Arc<Region>],
        metrics: &[Arc<Metric>],
        include_timeseries: bool,
        _catalog: &MetricCatalog,
    ) -> Result<MultiRegionMultiMetricDataStore> {
        let table = self.table().await?;

        let columns = metrics
            .iter()
            .map(|m| self.column_for(m, table).map(|c| (m, c)))
            .collect::<Result<Vec<_>>>()?;

        let mut data = Vec::with_capacity(regions.len() * columns.len());
        for region in regions {
            for (metric, column) in &columns {
                data.push(extract(table, region, metric, column, include_timeseries)?);
            }
        }

        Ok(MultiRegionMultiMetricDataStore::from_data(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogOptions;
    use crate::metrics::{CategorySets, DataReference, MetricDefinition};
    use chrono::NaiveDate;

    const WIDE: &str = "region,date,cases,label\n06,2022-01-02,7,b\n06,2022-01-01,5,a\n36,2022-01-01,3,a\n";

    fn regions() -> Arc<RegionDb> {
        Arc::new(RegionDb::new([Region::new("06", "California"), Region::new("36", "New York")]))
    }

    fn catalog(provider: TabularProvider, metric_reference: DataReference) -> (Arc<TabularProvider>, MetricCatalog) {
        let provider = Arc::new(provider);
        let metric = Metric::new(MetricDefinition::new("m", metric_reference), &CategorySets::default()).unwrap();
        let dyn_provider = Arc::clone(&provider) as Arc<dyn MetricDataProvider>;
        let catalog = MetricCatalog::new([metric], [dyn_provider], CatalogOptions::default()).unwrap();
        (provider, catalog)
    }

    async fn fetch(provider: &TabularProvider, catalog: &MetricCatalog, region_ids: &[&str]) -> Result<MultiRegionMultiMetricDataStore> {
        let db = regions();
        let regions: Vec<_> = region_ids.iter().map(|id| Arc::clone(db.find_by_region_id(id).unwrap())).collect();
        provider.fetch_data(&regions, catalog.metrics(), true, catalog).await
    }

    #[tokio::test]
    async fn test_wide_csv_timeseries() {
        let (provider, catalog) = catalog(
            TabularProvider::new("csv", TableFormat::WideCsv, TableSource::Text(WIDE.to_string()), regions()).with_date_column("date"),
            DataReference::new("csv").with_field("column", "cases"),
        );

        let store = fetch(&provider, &catalog, &["06", "36"]).await.unwrap();
        let data = store.metric_data("06", "m").unwrap();
        let ts = data.timeseries().unwrap();

        assert_eq!(ts.len(), 2);
        assert_eq!(ts.min_date(), NaiveDate::from_ymd_opt(2022, 1, 1));
        assert_eq!(data.current_number(), Some(7.0));
        assert_eq!(store.metric_data("36", "m").unwrap().current_number(), Some(3.0));
    }

    #[tokio::test]
    async fn test_region_without_rows_has_no_value() {
        let db = Arc::new(RegionDb::new([Region::new("06", "California"), Region::new("48", "Texas")]));
        let (provider, catalog) = catalog(
            TabularProvider::new("csv", TableFormat::WideCsv, TableSource::Text("region,cases\n06,1\n".to_string()), Arc::clone(&db)),
            DataReference::new("csv").with_field("column", "cases"),
        );

        let texas = Arc::clone(db.find_by_region_id("48").unwrap());
        let store = provider.fetch_data(&[texas], catalog.metrics(), false, &catalog).await.unwrap();
        assert_eq!(store.metric_data("48", "m").unwrap().current_value(), None);
    }

    #[tokio::test]
    async fn test_current_values_without_date_column() {
        let (provider, catalog) = catalog(
            TabularProvider::new("csv", TableFormat::WideCsv, TableSource::Text("region,cases\n06,12\n".to_string()), regions()),
            DataReference::new("csv").with_field("column", "cases"),
        );

        let store = fetch(&provider, &catalog, &["06"]).await.unwrap();
        let data = store.metric_data("06", "m").unwrap();
        assert_eq!(data.current_number(), Some(12.0));
        assert!(data.timeseries().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ambiguous_rows_without_date_column() {
        let (provider, catalog) = catalog(
            TabularProvider::new("csv", TableFormat::WideCsv, TableSource::Text("region,cases\n06,1\n06,2\n".to_string()), regions()),
            DataReference::new("csv").with_field("column", "cases"),
        );

        let err = fetch(&provider, &catalog, &["06"]).await.unwrap_err();
        assert!(matches!(err, Error::AmbiguousNonTimeseriesRow { rows: 2, ref region, .. } if region == "06"));
    }

    #[tokio::test]
    async fn test_unknown_column() {
        let (provider, catalog) = catalog(
            TabularProvider::new("csv", TableFormat::WideCsv, TableSource::Text(WIDE.to_string()), regions()).with_date_column("date"),
            DataReference::new("csv").with_field("column", "deaths"),
        );

        let err = fetch(&provider, &catalog, &["06"]).await.unwrap_err();
        assert!(matches!(err, Error::UnknownColumn { ref column, .. } if column == "deaths"));
    }

    #[tokio::test]
    async fn test_reference_key_depends_on_format() {
        let (provider, catalog) = catalog(
            TabularProvider::new("csv", TableFormat::WideCsv, TableSource::Text(WIDE.to_string()), regions()).with_date_column("date"),
            DataReference::new("csv").with_field("field", "cases"),
        );

        let err = fetch(&provider, &catalog, &["06"]).await.unwrap_err();
        assert!(matches!(err, Error::MissingDataReferenceField { ref field, .. } if field == "column"));
    }

    #[tokio::test]
    async fn test_rows_source() {
        let rows = serde_json::from_str::<Vec<Map<String, Value>>>(r#"[{"fips":"06","date":"2022-01-01","cases":5}]"#).unwrap();
        let (provider, catalog) = catalog(
            TabularProvider::new("rows", TableFormat::Json, TableSource::Rows(rows), regions())
                .with_region_column("fips")
                .with_date_column("date"),
            DataReference::new("rows").with_field("field", "cases"),
        );

        let store = fetch(&provider, &catalog, &["06"]).await.unwrap();
        assert_eq!(store.metric_data("06", "m").unwrap().current_number(), Some(5.0));
    }

    #[tokio::test]
    async fn test_long_csv() {
        let text = "region,date,variable,value\n06,2022-01-01,cases,5\n06,2022-01-01,deaths,1\n06,2022-01-02,cases,6\n";
        let (provider, catalog) = catalog(
            TabularProvider::new("long", TableFormat::LongCsv, TableSource::Text(text.to_string()), regions()).with_date_column("date"),
            DataReference::new("long").with_field("variable", "deaths"),
        );

        let store = fetch(&provider, &catalog, &["06"]).await.unwrap();
        let data = store.metric_data("06", "m").unwrap();
        assert_eq!(data.timeseries().unwrap().len(), 1);
        assert_eq!(data.current_number(), Some(1.0));
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() {
        let (provider, catalog) = catalog(
            TabularProvider::new("csv", TableFormat::WideCsv, TableSource::Text("region,cases\n99,1\n".to_string()), regions()),
            DataReference::new("csv").with_field("column", "cases"),
        );

        assert!(matches!(fetch(&provider, &catalog, &["06"]).await, Err(Error::AllRegionIdsInvalid { .. })));
        assert!(!provider.table.initialized());
    }
}

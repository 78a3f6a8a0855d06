use chrono::{DateTime, Utc};

/// Every failure the catalog, its providers, and the timeseries algebra can report.
///
/// Variants are grouped by the point at which they surface:
/// - configuration errors are raised while building metrics and catalogs,
/// - lookup errors are raised synchronously at the call site,
/// - data-shape and I/O errors are raised by providers and propagate unchanged through the catalog,
/// - series errors are raised by timeseries construction and type narrowing.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid metric '{metric}': {reason}")]
    InvalidMetric { metric: String, reason: String },

    #[error("invalid category set '{category_set}': {reason}")]
    InvalidCategorySet { category_set: String, reason: String },

    #[error("duplicate metric id '{0}'")]
    DuplicateMetric(String),

    #[error("duplicate provider id '{0}'")]
    DuplicateProvider(String),

    #[error("metric '{metric}' references unknown provider '{provider}'")]
    UnknownProvider { metric: String, provider: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("metric '{0}' does not belong to this catalog")]
    MetricNotFromThisCatalog(String),

    #[error("unknown region '{0}'")]
    UnknownRegion(String),

    #[error("no data for metric '{metric}' in region '{region}'")]
    MissingMetricData { region: String, metric: String },

    #[error("no data for region '{0}'")]
    MissingRegionData(String),

    #[error("no timeseries for metric '{metric}' in region '{region}'")]
    MissingTimeseries { region: String, metric: String },

    #[error("metric '{metric}' is missing data reference field '{field}' required by provider '{provider}'")]
    MissingDataReferenceField { metric: String, provider: String, field: String },

    #[error("invalid data reference for metric '{metric}': {reason}")]
    InvalidDataReference { metric: String, reason: String },

    #[error("source '{0}' contains no rows")]
    EmptySourceData(String),

    #[error("no row of source '{source_name}' has a recognized region id in column '{column}'")]
    AllRegionIdsInvalid { source_name: String, column: String },

    #[error("found {rows} rows for region '{region}' in source '{source_name}' but no date column is configured")]
    AmbiguousNonTimeseriesRow { source_name: String, region: String, rows: usize },

    #[error("source '{source_name}' has no column '{column}'")]
    UnknownColumn { source_name: String, column: String },

    #[error("unable to parse {what}: {reason}")]
    Parse { what: String, reason: String },

    #[error("unable to serialize {what}: {reason}")]
    Serialize { what: String, reason: String },

    #[error("unable to fetch '{url}': {reason}")]
    Fetch { url: String, reason: String },

    #[error("timeseries date {0} has a nonzero time-of-day component")]
    InvalidDate(DateTime<Utc>),

    #[error("timeseries point at {0} has a null value")]
    NullValue(String),

    #[error("timeseries value at {date} is not {expected}")]
    UnexpectedValueType { date: String, expected: &'static str },

    #[error("window size must be at least one day, got {0}")]
    InvalidWindow(u32),

    #[error("metric '{0}' has no category thresholds or category values")]
    NoCategories(String),

    #[error("injected failure for metric '{metric}' in region '{region}': {message}")]
    InjectedFailure { region: String, metric: String, message: String },
}

impl Error {
    pub(crate) fn invalid_metric(metric: &str, reason: impl Into<String>) -> Self {
        Self::InvalidMetric {
            metric: metric.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn parse(what: impl Into<String>, reason: impl ToString) -> Self {
        Self::Parse {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}

use chrono::NaiveDate;

/// Date bounds used by [`Timeseries::filter_to_date_range`](super::Timeseries::filter_to_date_range).
///
/// Any combination of bounds may be set; a date is inside the range when it satisfies all of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    /// Inclusive lower bound.
    pub start_at: Option<NaiveDate>,

    /// Exclusive lower bound.
    pub start_after: Option<NaiveDate>,

    /// Inclusive upper bound.
    pub end_at: Option<NaiveDate>,

    /// Exclusive upper bound.
    pub end_before: Option<NaiveDate>,
}

impl DateRange {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            start_at: None,
            start_after: None,
            end_at: None,
            end_before: None,
        }
    }

    #[must_use]
    pub const fn start_at(mut self, date: NaiveDate) -> Self {
        self.start_at = Some(date);
        self
    }

    #[must_use]
    pub const fn start_after(mut self, date: NaiveDate) -> Self {
        self.start_after = Some(date);
        self
    }

    #[must_use]
    pub const fn end_at(mut self, date: NaiveDate) -> Self {
        self.end_at = Some(date);
        self
    }

    #[must_use]
    pub const fn end_before(mut self, date: NaiveDate) -> Self {
        self.end_before = Some(date);
        self
    }

    /// Returns `true` if `date` satisfies every bound that is set.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_at.is_none_or(|start| date >= start)
            && self.start_after.is_none_or(|start| date > start)
            && self.end_at.is_none_or(|end| date <= end)
            && self.end_before.is_none_or(|end| date < end)
    }
}

use serde::{Deserialize, Serialize};
use strum::Display;

/// Default fraction digits for decimal values when none are configured.
const DEFAULT_DECIMAL_FRACTION_DIGITS: u32 = 3;

/// Default fraction digits for percentages when none are configured.
const DEFAULT_PERCENT_FRACTION_DIGITS: u32 = 0;

/// Largest number of fraction digits honored; beyond this `f64` has nothing left to show.
const MAX_FRACTION_DIGITS: u32 = 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NumberStyle {
    #[default]
    Decimal,

    /// Values are fractions; formatting multiplies by 100 and appends `%`.
    Percent,
}

/// Numeric formatting policy for a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatOptions {
    pub style: NumberStyle,
    pub minimum_fraction_digits: Option<u32>,
    pub maximum_fraction_digits: Option<u32>,

    /// When set, takes precedence over the fraction digit settings.
    pub maximum_significant_digits: Option<u32>,

    /// Insert `,` between groups of thousands.
    pub use_grouping: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            style: NumberStyle::Decimal,
            minimum_fraction_digits: None,
            maximum_fraction_digits: None,
            maximum_significant_digits: None,
            use_grouping: true,
        }
    }
}

impl FormatOptions {
    #[must_use]
    pub fn percent() -> Self {
        Self {
            style: NumberStyle::Percent,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_fraction_digits(mut self, digits: u32) -> Self {
        self.maximum_fraction_digits = Some(digits);
        self
    }

    #[must_use]
    pub const fn with_significant_digits(mut self, digits: u32) -> Self {
        self.maximum_significant_digits = Some(digits);
        self
    }

    #[must_use]
    pub const fn with_grouping(mut self, use_grouping: bool) -> Self {
        self.use_grouping = use_grouping;
        self
    }

    /// The number of fraction digits values are rounded to, before any percent scaling.
    #[must_use]
    pub fn effective_maximum_fraction_digits(&self) -> u32 {
        let default = match self.style {
            NumberStyle::Decimal => DEFAULT_DECIMAL_FRACTION_DIGITS,
            NumberStyle::Percent => DEFAULT_PERCENT_FRACTION_DIGITS,
        };

        let max = self.maximum_fraction_digits.unwrap_or(default);
        max.max(self.minimum_fraction_digits.unwrap_or(0)).min(MAX_FRACTION_DIGITS)
    }

    /// Format a finite number according to this policy.
    #[must_use]
    pub fn format(&self, value: f64) -> String {
        let scaled = match self.style {
            NumberStyle::Decimal => value,
            NumberStyle::Percent => value * 100.0,
        };

        let min_fraction = self.minimum_fraction_digits.unwrap_or(0).min(MAX_FRACTION_DIGITS);
        let (rounded, max_fraction) = match self.maximum_significant_digits {
            Some(significant) if significant > 0 => round_significant(scaled, significant),
            _ => {
                let digits = self.effective_maximum_fraction_digits();
                (round_to(scaled, digits), digits)
            }
        };

        let mut text = format_fixed(rounded, max_fraction.max(min_fraction), min_fraction);
        if self.use_grouping {
            text = group_thousands(&text);
        }

        if self.style == NumberStyle::Percent {
            text.push('%');
        }

        text
    }
}

/// Round half away from zero to `digits` fraction digits.
pub(crate) fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(i32::try_from(digits.min(MAX_FRACTION_DIGITS)).unwrap_or(0));
    let scaled = value * factor;
    if !scaled.is_finite() {
        // already beyond any fraction digits
        return value;
    }

    scaled.round() / factor
}

/// Round to `significant` digits, returning the value and the fraction digits it needs.
fn round_significant(value: f64, significant: u32) -> (f64, u32) {
    if value == 0.0 {
        return (0.0, 0);
    }

    #[expect(clippy::cast_possible_truncation, reason = "log10 of a finite f64 fits in i32")]
    let magnitude = value.abs().log10().floor() as i32;
    let decimals = i32::try_from(significant).unwrap_or(i32::MAX).saturating_sub(1).saturating_sub(magnitude);

    if decimals >= 0 {
        let decimals = decimals.unsigned_abs().min(MAX_FRACTION_DIGITS);
        (round_to(value, decimals), decimals)
    } else {
        let factor = 10f64.powi(-decimals);
        ((value / factor).round() * factor, 0)
    }
}

/// Fixed-point text with trailing zeros trimmed down to `min_fraction` digits.
fn format_fixed(value: f64, max_fraction: u32, min_fraction: u32) -> String {
    let text = format!("{:.*}", max_fraction as usize, value);

    let text = if let Some(dot) = text.find('.') {
        let keep = dot + 1 + min_fraction as usize;
        let trimmed = text.trim_end_matches('0');
        let trimmed = if trimmed.len() < keep { &text[..keep] } else { trimmed };
        trimmed.trim_end_matches('.').to_string()
    } else {
        text
    };

    // `-0` reads oddly once rounding has erased the magnitude.
    if text.trim_start_matches('-').chars().all(|c| c == '0' || c == '.') {
        text.trim_start_matches('-').to_string()
    } else {
        text
    }
}

fn group_thousands(text: &str) -> String {
    let (sign, unsigned) = text.strip_prefix('-').map_or(("", text), |rest| ("-", rest));
    let (integer, fraction) = unsigned.split_once('.').map_or((unsigned, None), |(i, f)| (i, Some(f)));

    let mut grouped = String::with_capacity(text.len() + integer.len() / 3);
    grouped.push_str(sign);
    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i).is_multiple_of(3) {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if let Some(fraction) = fraction {
        grouped.push('.');
        grouped.push_str(fraction);
    }

    grouped
}

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::domain::calendar::format_iso_date;
use crate::{Symbol, ValidationError};

/// Host encoding for "no value published".
pub const MISSING_VALUE: &str = ".";

/// Whether a raw cell means "no observation at this vintage".
pub fn is_missing_value(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || trimmed == MISSING_VALUE
}

/// Whether two published values denote the same quantity.
///
/// Numeric text compares as decimals, so `"1.50"` equals `"1.5"`; anything else compares
/// as text.
pub fn same_value(left: &str, right: &str) -> bool {
    match (left.parse::<Decimal>(), right.parse::<Decimal>()) {
        (Ok(left), Ok(right)) => left == right,
        _ => left == right,
    }
}

/// Output shape requested from the host and returned by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataDensity {
    /// Only new or changed values per vintage.
    #[default]
    Sparse,
    /// Every observation date at every vintage, forward-filled.
    Dense,
}

impl DataDensity {
    /// Host `output_type` parameter value.
    pub const fn output_type(self) -> u8 {
        match self {
            Self::Dense => 2,
            Self::Sparse => 3,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sparse => "sparse",
            Self::Dense => "dense",
        }
    }
}

impl Display for DataDensity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One published value: the quantity for `obs_date` as known on `vintage_date`.
///
/// Ordering is canonical: `(symbol, obs_date, vintage_date)`, then value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Observation {
    pub symbol: Symbol,
    pub obs_date: Date,
    pub vintage_date: Date,
    pub value: String,
}

impl Observation {
    /// Builds an observation, rejecting the "not available" sentinel.
    pub fn new(
        symbol: Symbol,
        obs_date: Date,
        vintage_date: Date,
        value: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let value = value.into();
        if is_missing_value(&value) {
            return Err(ValidationError::MissingValue {
                obs_date: format_iso_date(obs_date),
                vintage_date: format_iso_date(vintage_date),
            });
        }

        Ok(Self {
            symbol,
            obs_date,
            vintage_date,
            value: value.trim().to_owned(),
        })
    }

    /// Copy of this observation stamped with another vintage date.
    pub fn restamped(&self, vintage_date: Date) -> Self {
        Self {
            vintage_date,
            ..self.clone()
        }
    }

    /// Decimal reading of the published text, when it is numeric.
    pub fn decimal_value(&self) -> Option<Decimal> {
        self.value.parse().ok()
    }

    /// Whether `other` reports the same quantity, ignoring decimal formatting.
    pub fn same_value_as(&self, other: &Self) -> bool {
        same_value(&self.value, &other.value)
    }
}

impl PartialOrd for Observation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Observation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.symbol
            .cmp(&other.symbol)
            .then(self.obs_date.cmp(&other.obs_date))
            .then(self.vintage_date.cmp(&other.vintage_date))
            .then_with(|| self.value.cmp(&other.value))
    }
}

/// All observations of one series as published on one revision date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vintage {
    pub symbol: Symbol,
    pub vintage_date: Date,
    pub observations: Vec<Observation>,
}

impl Vintage {
    /// A vintage with no observations attached.
    pub fn empty(symbol: Symbol, vintage_date: Date) -> Self {
        Self {
            symbol,
            vintage_date,
            observations: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn symbol() -> Symbol {
        Symbol::parse("GDP").expect("valid symbol")
    }

    #[test]
    fn rejects_sentinel_values() {
        for raw in [".", " . ", ""] {
            let err = Observation::new(symbol(), date!(2012 - 01 - 01), date!(2015 - 07 - 30), raw)
                .expect_err("sentinel must be rejected");
            assert!(matches!(err, ValidationError::MissingValue { .. }));
        }
    }

    #[test]
    fn canonical_order_is_symbol_obs_vintage() {
        let mut rows = vec![
            Observation::new(symbol(), date!(2012 - 04 - 01), date!(2013 - 01 - 01), "2").unwrap(),
            Observation::new(symbol(), date!(2012 - 01 - 01), date!(2014 - 01 - 01), "3").unwrap(),
            Observation::new(symbol(), date!(2012 - 01 - 01), date!(2013 - 01 - 01), "1").unwrap(),
        ];
        rows.sort();

        let keys = rows
            .iter()
            .map(|row| (row.obs_date, row.vintage_date))
            .collect::<Vec<_>>();
        assert_eq!(
            keys,
            vec![
                (date!(2012 - 01 - 01), date!(2013 - 01 - 01)),
                (date!(2012 - 01 - 01), date!(2014 - 01 - 01)),
                (date!(2012 - 04 - 01), date!(2013 - 01 - 01)),
            ]
        );
    }

    #[test]
    fn restamp_leaves_original_untouched() {
        let original =
            Observation::new(symbol(), date!(2012 - 01 - 01), date!(2013 - 01 - 01), "1.5").unwrap();
        let copy = original.restamped(date!(2014 - 01 - 01));

        assert_eq!(original.vintage_date, date!(2013 - 01 - 01));
        assert_eq!(copy.vintage_date, date!(2014 - 01 - 01));
        assert_eq!(copy.value, "1.5");
        assert_eq!(copy.decimal_value(), Some(Decimal::new(15, 1)));
    }

    #[test]
    fn values_compare_as_decimals() {
        assert!(same_value("1.50", "1.5"));
        assert!(same_value("100", "100.000"));
        assert!(!same_value("1.5", "1.05"));
        assert!(same_value("n/a", "n/a"));
        assert!(!same_value("n/a", "1.5"));

        let before =
            Observation::new(symbol(), date!(2012 - 01 - 01), date!(2013 - 01 - 01), "2.10").unwrap();
        let after = before.restamped(date!(2014 - 01 - 01));
        assert!(before.same_value_as(&Observation { value: String::from("2.1"), ..after }));
    }

    #[test]
    fn density_maps_to_output_type() {
        assert_eq!(DataDensity::Dense.output_type(), 2);
        assert_eq!(DataDensity::Sparse.output_type(), 3);
        assert_eq!(DataDensity::default(), DataDensity::Sparse);
    }
}

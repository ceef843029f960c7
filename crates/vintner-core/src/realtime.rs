//! "What was known then": restricting a dense revision history to a real-time window.

use std::collections::BTreeMap;

use time::Date;

use crate::Observation;

/// Span of vintage dates. `None` bounds are open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RealTimeWindow {
    pub start: Option<Date>,
    pub end: Option<Date>,
}

impl RealTimeWindow {
    pub const fn new(start: Option<Date>, end: Option<Date>) -> Self {
        Self { start, end }
    }

    pub const fn between(start: Date, end: Date) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub const fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    pub const fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    fn admits_end(&self, vintage_date: Date) -> bool {
        self.end.map_or(true, |end| vintage_date <= end)
    }
}

/// Restricts dense observations to the vintages in force during `window`.
///
/// With a start bound, the first kept vintage for each observation date is the one in
/// force at `start`, moved earlier while the preceding vintage reported the same value.
/// The result is in canonical order.
pub fn resolve_as_of(observations: Vec<Observation>, window: RealTimeWindow) -> Vec<Observation> {
    let mut resolved = match (window.start, window.end) {
        (None, None) => observations,
        (None, Some(end)) => observations
            .into_iter()
            .filter(|row| row.vintage_date <= end)
            .collect(),
        (Some(start), _) => {
            let mut series: BTreeMap<_, Vec<Observation>> = BTreeMap::new();
            for row in observations {
                series
                    .entry((row.symbol.clone(), row.obs_date))
                    .or_default()
                    .push(row);
            }

            series
                .into_values()
                .flat_map(|rows| resolve_series(rows, start, window))
                .collect()
        }
    };

    resolved.sort();
    resolved
}

/// Resolves the history of a single observation date.
fn resolve_series(mut rows: Vec<Observation>, start: Date, window: RealTimeWindow) -> Vec<Observation> {
    rows.sort_by_key(|row| row.vintage_date);

    let first = rows
        .iter()
        .rposition(|row| row.vintage_date <= start)
        .or_else(|| rows.iter().position(|row| window.admits_end(row.vintage_date)));
    let Some(mut first) = first else {
        return Vec::new();
    };

    while first > 0 && rows[first - 1].same_value_as(&rows[first]) {
        first -= 1;
    }

    rows.into_iter()
        .skip(first)
        .filter(|row| window.admits_end(row.vintage_date))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Symbol;
    use time::macros::date;

    fn history() -> Vec<Observation> {
        let symbol = Symbol::parse("GDP").expect("valid symbol");
        [
            (date!(2014 - 07 - 30), "101"),
            (date!(2015 - 07 - 30), "102"),
            (date!(2016 - 07 - 29), "102"),
            (date!(2017 - 07 - 28), "102"),
            (date!(2017 - 10 - 27), "103"),
            (date!(2018 - 07 - 27), "104"),
        ]
        .into_iter()
        .map(|(vintage_date, value)| {
            Observation::new(symbol.clone(), date!(2012 - 01 - 01), vintage_date, value)
                .expect("valid observation")
        })
        .collect()
    }

    #[test]
    fn walks_back_to_the_vintage_that_introduced_the_value() {
        let window = RealTimeWindow::between(date!(2017 - 10 - 05), date!(2018 - 08 - 20));

        let resolved = resolve_as_of(history(), window);

        let vintages = resolved.iter().map(|row| row.vintage_date).collect::<Vec<_>>();
        assert_eq!(
            vintages,
            vec![
                date!(2015 - 07 - 30),
                date!(2016 - 07 - 29),
                date!(2017 - 07 - 28),
                date!(2017 - 10 - 27),
                date!(2018 - 07 - 27),
            ]
        );
    }

    #[test]
    fn window_before_first_vintage_is_empty() {
        let window = RealTimeWindow::between(date!(1990 - 01 - 01), date!(1990 - 12 - 31));
        assert!(resolve_as_of(history(), window).is_empty());
    }

    #[test]
    fn end_only_keeps_vintages_up_to_end() {
        let window = RealTimeWindow::new(None, Some(date!(2016 - 12 - 31)));
        assert_eq!(resolve_as_of(history(), window).len(), 3);
    }

    #[test]
    fn open_end_runs_to_latest_vintage() {
        let window = RealTimeWindow::new(Some(date!(2018 - 01 - 01)), None);

        let resolved = resolve_as_of(history(), window);

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].vintage_date, date!(2017 - 10 - 27));
    }

    #[test]
    fn start_before_history_begins_at_first_vintage() {
        let window = RealTimeWindow::between(date!(2010 - 01 - 01), date!(2015 - 12 - 31));

        let resolved = resolve_as_of(history(), window);

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].vintage_date, date!(2014 - 07 - 30));
    }

    #[test]
    fn walk_back_ignores_decimal_formatting() {
        let symbol = Symbol::parse("GDP").expect("valid symbol");
        let rows = [
            (date!(2015 - 07 - 30), "102.0"),
            (date!(2016 - 07 - 29), "102"),
            (date!(2017 - 07 - 28), "102.00"),
        ]
        .into_iter()
        .map(|(vintage_date, value)| {
            Observation::new(symbol.clone(), date!(2012 - 01 - 01), vintage_date, value)
                .expect("valid observation")
        })
        .collect();
        let window = RealTimeWindow::between(date!(2017 - 10 - 05), date!(2018 - 08 - 20));

        let resolved = resolve_as_of(rows, window);

        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved[0].vintage_date, date!(2015 - 07 - 30));
    }

    #[test]
    fn unbounded_window_returns_everything() {
        assert!(RealTimeWindow::unbounded().is_unbounded());
        assert_eq!(resolve_as_of(history(), RealTimeWindow::unbounded()).len(), 6);
    }
}

//! Sparse/dense conversion of revision histories.
//!
//! A sparse history lists, per vintage, only the observation dates that are new or whose
//! value changed. A dense history lists every known observation date at every vintage.
//! Both are keyed by `(symbol, obs_date, vintage_date)` and returned in canonical order.

use std::collections::{BTreeMap, HashMap};

use time::Date;

use crate::domain::same_value;
use crate::{Observation, Symbol, Vintage};

/// Conversions between sparse and dense revision histories.
///
/// Implementations are stateless between calls.
pub trait VintageComposer: Send + Sync {
    /// Forward-fills every observation date into every later vintage.
    fn make_dense(&self, sparse: Vec<Observation>) -> Vec<Observation>;

    /// Keeps only first appearances and value changes. Idempotent.
    fn make_sparse(&self, dense: Vec<Observation>) -> Vec<Observation>;

    /// Densifies vintages as a whole. An empty vintage receives a copy of the nearest
    /// earlier non-empty vintage of the same symbol, re-stamped with its own date.
    fn make_dense_vintages(&self, vintages: Vec<Vintage>) -> Vec<Vintage>;

    /// One [`Vintage`] per requested date, plus any other vintage date the observations
    /// carry. Observations of other symbols are ignored.
    fn group_vintages(
        &self,
        symbol: &Symbol,
        observations: Vec<Observation>,
        vintage_dates: &[Date],
    ) -> Vec<Vintage>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardComposer;

impl StandardComposer {
    pub const fn new() -> Self {
        Self
    }
}

impl VintageComposer for StandardComposer {
    fn make_dense(&self, sparse: Vec<Observation>) -> Vec<Observation> {
        let mut dense = Vec::with_capacity(sparse.len());

        for (_, mut rows) in by_symbol(sparse) {
            rows.sort_by(|left, right| {
                left.vintage_date
                    .cmp(&right.vintage_date)
                    .then(left.obs_date.cmp(&right.obs_date))
            });

            let mut known: BTreeMap<Date, Observation> = BTreeMap::new();
            let mut current: Option<Date> = None;

            for row in rows {
                if current != Some(row.vintage_date) {
                    if let Some(vintage_date) = current {
                        flush_snapshot(&known, vintage_date, &mut dense);
                    }
                    current = Some(row.vintage_date);
                }

                let unchanged = known
                    .get(&row.obs_date)
                    .is_some_and(|existing| existing.same_value_as(&row));
                if !unchanged {
                    known.insert(row.obs_date, row);
                }
            }

            if let Some(vintage_date) = current {
                flush_snapshot(&known, vintage_date, &mut dense);
            }
        }

        dense.sort();
        dense
    }

    fn make_sparse(&self, dense: Vec<Observation>) -> Vec<Observation> {
        let mut sparse = Vec::new();

        for (symbol, rows) in by_symbol(dense) {
            let mut snapshots: BTreeMap<Date, BTreeMap<Date, Observation>> = BTreeMap::new();
            for row in rows {
                snapshots
                    .entry(row.vintage_date)
                    .or_default()
                    .insert(row.obs_date, row);
            }

            // Values of obs dates missing from the previous vintage.
            let mut last_known: HashMap<Date, String> = HashMap::new();
            let mut previous: Vec<Observation> = Vec::new();

            for (vintage_date, snapshot) in snapshots {
                let current = snapshot.into_values().collect::<Vec<_>>();
                let transition = align(&previous, &current);
                if !previous.is_empty() {
                    tracing::trace!(
                        symbol = %symbol,
                        vintage_date = %vintage_date,
                        added = transition.added,
                        removed = transition.removed,
                        "vintage transition"
                    );
                }

                for (row, predecessor) in current.iter().zip(&transition.predecessors) {
                    let prior = match predecessor {
                        Some(index) => Some(previous[*index].value.as_str()),
                        None => last_known.get(&row.obs_date).map(String::as_str),
                    };
                    if prior.map_or(true, |value| !same_value(value, &row.value)) {
                        sparse.push(row.clone());
                    }
                }

                for row in &previous {
                    last_known.insert(row.obs_date, row.value.clone());
                }
                previous = current;
            }
        }

        sparse.sort();
        sparse
    }

    fn make_dense_vintages(&self, vintages: Vec<Vintage>) -> Vec<Vintage> {
        let mut grouped: BTreeMap<(Symbol, Date), Vec<Observation>> = BTreeMap::new();
        let mut flattened = Vec::new();

        for vintage in vintages {
            grouped
                .entry((vintage.symbol, vintage.vintage_date))
                .or_default();
            flattened.extend(vintage.observations);
        }

        for row in self.make_dense(flattened) {
            grouped
                .entry((row.symbol.clone(), row.vintage_date))
                .or_default()
                .push(row);
        }

        let mut result = Vec::with_capacity(grouped.len());
        let mut carried: Option<(Symbol, Vec<Observation>)> = None;

        for ((symbol, vintage_date), observations) in grouped {
            let observations = if observations.is_empty() {
                match &carried {
                    Some((carried_symbol, rows)) if *carried_symbol == symbol => rows
                        .iter()
                        .map(|row| row.restamped(vintage_date))
                        .collect(),
                    _ => Vec::new(),
                }
            } else {
                observations
            };

            if !observations.is_empty() {
                carried = Some((symbol.clone(), observations.clone()));
            }

            result.push(Vintage {
                symbol,
                vintage_date,
                observations,
            });
        }

        result
    }

    fn group_vintages(
        &self,
        symbol: &Symbol,
        observations: Vec<Observation>,
        vintage_dates: &[Date],
    ) -> Vec<Vintage> {
        let mut grouped: BTreeMap<Date, Vec<Observation>> = vintage_dates
            .iter()
            .map(|vintage_date| (*vintage_date, Vec::new()))
            .collect();

        for row in observations.into_iter().filter(|row| row.symbol == *symbol) {
            grouped.entry(row.vintage_date).or_default().push(row);
        }

        grouped
            .into_iter()
            .map(|(vintage_date, mut observations)| {
                observations.sort();
                Vintage {
                    symbol: symbol.clone(),
                    vintage_date,
                    observations,
                }
            })
            .collect()
    }
}

fn by_symbol(rows: Vec<Observation>) -> BTreeMap<Symbol, Vec<Observation>> {
    let mut grouped: BTreeMap<Symbol, Vec<Observation>> = BTreeMap::new();
    for row in rows {
        grouped.entry(row.symbol.clone()).or_default().push(row);
    }
    grouped
}

fn flush_snapshot(known: &BTreeMap<Date, Observation>, vintage_date: Date, out: &mut Vec<Observation>) {
    out.extend(known.values().map(|row| row.restamped(vintage_date)));
}

/// Alignment of one vintage against the one before it.
#[derive(Debug, PartialEq, Eq)]
struct Transition {
    /// For each current row, the index of the previous row with the same obs date.
    predecessors: Vec<Option<usize>>,
    added: usize,
    removed: usize,
}

/// Merge-joins two vintages ordered by obs date.
fn align(previous: &[Observation], current: &[Observation]) -> Transition {
    let mut predecessors = Vec::with_capacity(current.len());
    let (mut cursor, mut added, mut removed) = (0, 0, 0);

    for row in current {
        while cursor < previous.len() && previous[cursor].obs_date < row.obs_date {
            removed += 1;
            cursor += 1;
        }
        if cursor < previous.len() && previous[cursor].obs_date == row.obs_date {
            predecessors.push(Some(cursor));
            cursor += 1;
        } else {
            added += 1;
            predecessors.push(None);
        }
    }
    removed += previous.len() - cursor;

    Transition {
        predecessors,
        added,
        removed,
    }
}

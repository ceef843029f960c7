//! In-memory stand-in for the FRED/ALFRED host used by the behavior tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{json, Map, Value};
use time::Date;
use vintner_core::domain::calendar::{format_compact_date, format_iso_date, parse_iso_date};
use vintner_core::{
    ClientConfig, HttpClient, HttpError, HttpRequest, HttpResponse, Observation, Symbol,
};

/// vintage date -> (obs date -> value). An obs date absent from a snapshot was not
/// published at that vintage.
pub type History = BTreeMap<Date, BTreeMap<Date, String>>;

/// Sentinel status that makes the fake fail at the transport level.
pub const TRANSPORT_FAILURE: u16 = 0;

pub fn symbol(raw: &str) -> Symbol {
    Symbol::parse(raw).expect("test symbol is valid")
}

pub fn obs(symbol: &Symbol, obs_date: Date, vintage_date: Date, value: &str) -> Observation {
    Observation::new(symbol.clone(), obs_date, vintage_date, value).expect("test value is valid")
}

/// Routes library logs to the test harness. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn test_config() -> ClientConfig {
    ClientConfig::default()
        .with_base_url("http://fred.test/fred/")
        .with_api_key("test-key")
}

/// Builds a history from `(vintage, [(obs, value)])` snapshots.
pub fn history(snapshots: &[(Date, &[(Date, &str)])]) -> History {
    snapshots
        .iter()
        .map(|(vintage_date, rows)| {
            let snapshot = rows
                .iter()
                .map(|(obs_date, value)| (*obs_date, (*value).to_owned()))
                .collect();
            (*vintage_date, snapshot)
        })
        .collect()
}

/// `vintages` weekly vintages; vintage `i` first publishes obs date `i` and revises every
/// obs date published ten or more vintages earlier once per ten vintages.
pub fn long_history(vintages: usize) -> History {
    let first_vintage = time::macros::date!(2000 - 01 - 03);
    let first_obs = time::macros::date!(1990 - 01 - 01);

    (0..vintages)
        .map(|i| {
            let vintage_date = first_vintage + time::Duration::weeks(i as i64);
            let snapshot = (0..=i)
                .map(|j| {
                    let obs_date = first_obs + time::Duration::days(30 * j as i64);
                    (obs_date, format!("{j}.{}", (i - j) / 10))
                })
                .collect();
            (vintage_date, snapshot)
        })
        .collect()
}

/// Every (obs, vintage) value of a history as canonical dense observations.
pub fn dense_rows(symbol: &Symbol, history: &History) -> Vec<Observation> {
    let mut rows = history
        .iter()
        .flat_map(|(vintage_date, snapshot)| {
            snapshot
                .iter()
                .map(move |(obs_date, value)| obs(symbol, *obs_date, *vintage_date, value))
        })
        .collect::<Vec<_>>();
    rows.sort();
    rows
}

#[derive(Default)]
pub struct FakeFred {
    series: HashMap<String, History>,
    malformed: HashSet<String>,
    releases: usize,
    failures: Mutex<VecDeque<u16>>,
    latency: Duration,
    urls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakeFred {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, symbol: &str, history: History) -> Self {
        self.series.insert(symbol.to_owned(), history);
        self
    }

    /// Observation requests for `symbol` answer with a non-JSON body.
    pub fn with_malformed_observations(mut self, symbol: &str) -> Self {
        self.malformed.insert(symbol.to_owned());
        self
    }

    pub fn with_releases(mut self, count: usize) -> Self {
        self.releases = count;
        self
    }

    /// Statuses returned, in order, before any request is served normally.
    pub fn with_failures(self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.failures
            .lock()
            .expect("failure script")
            .extend(statuses);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().expect("url log").clone()
    }

    pub fn request_count(&self) -> usize {
        self.urls.lock().expect("url log").len()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn respond(&self, url: &str) -> Result<HttpResponse, HttpError> {
        if let Some(status) = self.failures.lock().expect("failure script").pop_front() {
            return match status {
                TRANSPORT_FAILURE => Err(HttpError::new("connection reset by peer")),
                status => Ok(HttpResponse::status(status)),
            };
        }

        let (path, query) = split_url(url);
        if path.ends_with("/releases") {
            return Ok(self.releases_page(&query));
        }

        let Some(history) = query.get("series_id").and_then(|id| self.series.get(id)) else {
            return Ok(HttpResponse::status(404));
        };

        if path.ends_with("/series/vintagedates") {
            Ok(vintage_dates_page(history, &query))
        } else if path.ends_with("/series/observations") {
            if self.malformed.contains(&query["series_id"]) {
                return Ok(HttpResponse::ok("<html>upstream error</html>"));
            }
            Ok(observations_page(history, &query))
        } else {
            Ok(HttpResponse::status(404))
        }
    }

    fn releases_page(&self, query: &HashMap<String, String>) -> HttpResponse {
        let offset = number(query, "offset", 0);
        let limit = number(query, "limit", 1_000);
        let releases = (offset..self.releases.min(offset + limit))
            .map(|id| json!({"id": id, "name": format!("Release {id}")}))
            .collect::<Vec<_>>();
        HttpResponse::ok(json!({ "releases": releases }).to_string())
    }
}

impl HttpClient for FakeFred {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            self.urls.lock().expect("url log").push(request.url.clone());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            let response = self.respond(&request.url);

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            response
        })
    }
}

fn split_url(url: &str) -> (String, HashMap<String, String>) {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let query = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| {
            let value = urlencoding::decode(value).expect("query value decodes");
            (name.to_owned(), value.into_owned())
        })
        .collect();
    (path.to_owned(), query)
}

fn number(query: &HashMap<String, String>, name: &str, default: usize) -> usize {
    query
        .get(name)
        .map(|raw| raw.parse().expect("numeric query value"))
        .unwrap_or(default)
}

fn date_param(query: &HashMap<String, String>, name: &str) -> Option<Date> {
    query
        .get(name)
        .map(|raw| parse_iso_date(raw).expect("iso date query value"))
}

fn vintage_dates_page(history: &History, query: &HashMap<String, String>) -> HttpResponse {
    let start = date_param(query, "realtime_start");
    let end = date_param(query, "realtime_end");
    let offset = number(query, "offset", 0);
    let limit = number(query, "limit", 10_000);

    let dates = history
        .keys()
        .filter(|date| start.map_or(true, |start| **date >= start))
        .filter(|date| end.map_or(true, |end| **date <= end))
        .skip(offset)
        .take(limit)
        .map(|date| format_iso_date(*date))
        .collect::<Vec<_>>();

    HttpResponse::ok(json!({ "count": dates.len(), "vintage_dates": dates }).to_string())
}

/// Snapshot in force on `date`.
fn snapshot_at(history: &History, date: Date) -> Option<&BTreeMap<Date, String>> {
    history.range(..=date).next_back().map(|(_, snapshot)| snapshot)
}

fn observations_page(history: &History, query: &HashMap<String, String>) -> HttpResponse {
    let series_id = &query["series_id"];
    let obs_start = date_param(query, "observation_start");
    let obs_end = date_param(query, "observation_end");
    let obs_dates = history
        .values()
        .flat_map(|snapshot| snapshot.keys().copied())
        .filter(|date| obs_start.map_or(true, |start| *date >= start))
        .filter(|date| obs_end.map_or(true, |end| *date <= end))
        .collect::<BTreeSet<_>>();

    let Some(vintage_csv) = query.get("vintage_dates") else {
        let latest = history.values().next_back();
        let rows = obs_dates
            .iter()
            .map(|obs_date| {
                let value = latest
                    .and_then(|snapshot| snapshot.get(obs_date))
                    .map_or(".", String::as_str);
                json!({"realtime_start": "2024-01-01", "date": format_iso_date(*obs_date), "value": value})
            })
            .collect::<Vec<_>>();
        return HttpResponse::ok(json!({ "observations": rows }).to_string());
    };

    let mut vintages = vintage_csv
        .split(',')
        .map(|raw| parse_iso_date(raw).expect("vintage date"))
        .collect::<Vec<_>>();
    vintages.sort();
    let sparse = query.get("output_type").map(String::as_str) == Some("3");

    let rows = obs_dates
        .iter()
        .map(|obs_date| {
            let mut row = Map::new();
            row.insert(String::from("date"), Value::from(format_iso_date(*obs_date)));

            let mut previous: Option<&String> = None;
            for (index, vintage_date) in vintages.iter().enumerate() {
                let value = snapshot_at(history, *vintage_date).and_then(|s| s.get(obs_date));
                let published = match value {
                    Some(value) if !sparse || index == 0 || previous != Some(value) => value.as_str(),
                    _ => ".",
                };
                previous = value;

                let column = format!(
                    "{}_{}",
                    series_id.to_ascii_uppercase(),
                    format_compact_date(*vintage_date)
                );
                row.insert(column, Value::from(published));
            }
            Value::Object(row)
        })
        .collect::<Vec<_>>();

    HttpResponse::ok(json!({ "observations": rows }).to_string())
}

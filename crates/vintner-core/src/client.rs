//! Series-level facade over the fetch pipeline.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use time::Date;
use tokio_util::sync::CancellationToken;

use crate::composer::{StandardComposer, VintageComposer};
use crate::config::ClientConfig;
use crate::domain::calendar::format_iso_date;
use crate::fetcher::{append_query, RetryingFetcher};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::observations::ChunkedObservationFetcher;
use crate::payload::{JsonPayloadParser, PayloadParser, OBSERVATIONS_ROOT};
use crate::realtime::{resolve_as_of, RealTimeWindow};
use crate::statistics::DownloadStatistics;
use crate::throttling::RequestGate;
use crate::vintage_dates::VintageDateResolver;
use crate::{DataDensity, Observation, SourceError, Symbol, Vintage};

/// Client for revision-stamped series.
///
/// Every request issued through one client shares a single [`RequestGate`], so the
/// concurrency cap and request window hold across concurrent calls.
pub struct FredClient<P: PayloadParser = JsonPayloadParser> {
    config: ClientConfig,
    fetcher: RetryingFetcher,
    parser: Arc<P>,
    composer: Arc<dyn VintageComposer>,
    resolver: VintageDateResolver<P>,
    chunked: ChunkedObservationFetcher<P>,
}

impl FredClient<JsonPayloadParser> {
    /// JSON client with the standard composer, no statistics and its own cancellation token.
    pub fn new(config: ClientConfig, http: Arc<dyn HttpClient>) -> Result<Self, SourceError> {
        Self::builder(config).http_client(http).build()
    }

    pub fn builder(config: ClientConfig) -> FredClientBuilder<JsonPayloadParser> {
        FredClientBuilder::new(config)
    }
}

impl<P: PayloadParser> FredClient<P> {
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn gate(&self) -> &Arc<RequestGate> {
        self.fetcher.gate()
    }

    pub fn composer(&self) -> &Arc<dyn VintageComposer> {
        &self.composer
    }

    /// Aborts in-flight calls and fails every later call with a cancellation error.
    pub fn cancel(&self) {
        self.fetcher.cancellation().cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.fetcher.cancellation().is_cancelled()
    }

    /// Vintage dates of `symbol`, optionally limited to a real-time period.
    pub async fn vintage_dates(
        &self,
        symbol: &Symbol,
        rt_start: Option<Date>,
        rt_end: Option<Date>,
    ) -> Result<Vec<Date>, SourceError> {
        self.resolver.resolve(symbol, rt_start, rt_end).await
    }

    /// Vintages of `symbol` without their observations.
    pub async fn vintages(
        &self,
        symbol: &Symbol,
        rt_start: Option<Date>,
        rt_end: Option<Date>,
    ) -> Result<Vec<Vintage>, SourceError> {
        let dates = self.vintage_dates(symbol, rt_start, rt_end).await?;
        Ok(dates
            .into_iter()
            .map(|vintage_date| Vintage::empty(symbol.clone(), vintage_date))
            .collect())
    }

    /// Observations at explicit vintage dates. The list must not be empty.
    pub async fn observations_for_vintages(
        &self,
        symbol: &Symbol,
        vintage_dates: &[Date],
        obs_start: Option<Date>,
        obs_end: Option<Date>,
        density: DataDensity,
    ) -> Result<Vec<Observation>, SourceError> {
        check_obs_range(obs_start, obs_end)?;
        self.chunked
            .fetch(symbol, vintage_dates, obs_start, obs_end, density)
            .await
    }

    /// Full revision history of `symbol`.
    pub async fn observations(
        &self,
        symbol: &Symbol,
        density: DataDensity,
    ) -> Result<Vec<Observation>, SourceError> {
        self.observations_between(symbol, None, None, density).await
    }

    /// Revision history of the observation dates in `[obs_start, obs_end]`.
    pub async fn observations_between(
        &self,
        symbol: &Symbol,
        obs_start: Option<Date>,
        obs_end: Option<Date>,
        density: DataDensity,
    ) -> Result<Vec<Observation>, SourceError> {
        check_obs_range(obs_start, obs_end)?;
        let dates = self.vintage_dates(symbol, None, None).await?;
        if dates.is_empty() {
            return Ok(Vec::new());
        }
        self.chunked
            .fetch(symbol, &dates, obs_start, obs_end, density)
            .await
    }

    /// Values of one observation date as known during `window`.
    ///
    /// The result starts at the vintage that introduced the value in force at the window
    /// start and runs through the window end.
    pub async fn observations_as_of(
        &self,
        symbol: &Symbol,
        obs_date: Date,
        window: RealTimeWindow,
        density: DataDensity,
    ) -> Result<Vec<Observation>, SourceError> {
        if let (Some(start), Some(end)) = (window.start, window.end) {
            if start > end {
                return Err(SourceError::invalid_request(format!(
                    "real-time window starts at {} after it ends at {}",
                    format_iso_date(start),
                    format_iso_date(end)
                )));
            }
        }

        let dates = self.vintage_dates(symbol, None, window.end).await?;
        if dates.is_empty() {
            return Ok(Vec::new());
        }

        let dense = self
            .chunked
            .fetch(symbol, &dates, Some(obs_date), Some(obs_date), DataDensity::Dense)
            .await?;
        let resolved = resolve_as_of(dense, window);

        Ok(match density {
            DataDensity::Dense => resolved,
            DataDensity::Sparse => self.composer.make_sparse(resolved),
        })
    }

    /// Current values without revision history; each vintage date equals its observation
    /// date. `None` when the host does not know the series.
    pub async fn non_vintage_observations(
        &self,
        symbol: &Symbol,
    ) -> Result<Option<Vec<Observation>>, SourceError> {
        let uri = append_query("series/observations", "series_id", symbol.as_str());
        let uri = append_query(&uri, "file_type", self.parser.file_type());

        let Some(body) = self.fetcher.download(&uri).await? else {
            return Ok(None);
        };

        let mut observations = self
            .parser
            .parse_observation_values(symbol, &body)
            .map_err(|error| SourceError::malformed_response(&uri, OBSERVATIONS_ROOT, &error))?;
        observations.sort();
        Ok(Some(observations))
    }

    /// Every vintage of `symbol` with its observations attached.
    ///
    /// Sparse vintages without changes are empty; dense vintages always carry the full
    /// snapshot in force on their date.
    pub async fn vintages_with_observations(
        &self,
        symbol: &Symbol,
        density: DataDensity,
    ) -> Result<Vec<Vintage>, SourceError> {
        let dates = self.vintage_dates(symbol, None, None).await?;
        if dates.is_empty() {
            return Ok(Vec::new());
        }

        let sparse = self
            .chunked
            .fetch(symbol, &dates, None, None, DataDensity::Sparse)
            .await?;
        let vintages = self.composer.group_vintages(symbol, sparse, &dates);

        Ok(match density {
            DataDensity::Sparse => vintages,
            DataDensity::Dense => self.composer.make_dense_vintages(vintages),
        })
    }

    /// Rows under `root` of a single response. A missing resource yields no rows.
    pub async fn page<T: DeserializeOwned>(
        &self,
        uri: &str,
        root: &str,
    ) -> Result<Vec<T>, SourceError> {
        let uri = append_query(uri, "file_type", self.parser.file_type());
        let Some(body) = self.fetcher.download(&uri).await? else {
            return Ok(Vec::new());
        };

        self.parser
            .parse_page(&body, root)
            .map_err(|error| SourceError::malformed_response(&uri, root, &error))
    }

    /// Rows under `root` across every `offset`/`limit` page of `uri`.
    pub async fn paginate<T: DeserializeOwned>(
        &self,
        uri: &str,
        root: &str,
    ) -> Result<Vec<T>, SourceError> {
        let page_size = self.config.page_size;
        let mut rows = Vec::new();
        let mut offset = 0;

        loop {
            let page_uri = append_query(uri, "offset", &offset.to_string());
            let page_uri = append_query(&page_uri, "limit", &page_size.to_string());
            let page: Vec<T> = self.page(&page_uri, root).await?;
            let received = page.len();
            rows.extend(page);

            if received < page_size {
                break;
            }
            offset += received;
        }

        Ok(rows)
    }
}

fn check_obs_range(obs_start: Option<Date>, obs_end: Option<Date>) -> Result<(), SourceError> {
    match (obs_start, obs_end) {
        (Some(start), Some(end)) if start > end => Err(SourceError::invalid_request(format!(
            "observation range starts at {} after it ends at {}",
            format_iso_date(start),
            format_iso_date(end)
        ))),
        _ => Ok(()),
    }
}

/// Builder for [`FredClient`].
///
/// ```rust,ignore
/// let client = FredClient::builder(ClientConfig::from_env())
///     .statistics(Arc::new(RequestCounters::new()))
///     .build()?;
/// ```
pub struct FredClientBuilder<P> {
    config: ClientConfig,
    parser: P,
    http: Option<Arc<dyn HttpClient>>,
    composer: Option<Arc<dyn VintageComposer>>,
    statistics: Option<Arc<dyn DownloadStatistics>>,
    cancel: Option<CancellationToken>,
}

impl FredClientBuilder<JsonPayloadParser> {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            parser: JsonPayloadParser,
            http: None,
            composer: None,
            statistics: None,
            cancel: None,
        }
    }
}

impl<P: PayloadParser> FredClientBuilder<P> {
    /// Replaces the payload format.
    pub fn parser<Q: PayloadParser>(self, parser: Q) -> FredClientBuilder<Q> {
        FredClientBuilder {
            config: self.config,
            parser,
            http: self.http,
            composer: self.composer,
            statistics: self.statistics,
            cancel: self.cancel,
        }
    }

    /// Transport to use. Defaults to [`ReqwestHttpClient`].
    pub fn http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    /// Defaults to [`StandardComposer`].
    pub fn composer(mut self, composer: Arc<dyn VintageComposer>) -> Self {
        self.composer = Some(composer);
        self
    }

    pub fn statistics(mut self, statistics: Arc<dyn DownloadStatistics>) -> Self {
        self.statistics = Some(statistics);
        self
    }

    /// Token observed by every suspension point of every call.
    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn build(self) -> Result<FredClient<P>, SourceError> {
        self.config.validate()?;

        let http = self
            .http
            .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()) as Arc<dyn HttpClient>);
        let composer = self
            .composer
            .unwrap_or_else(|| Arc::new(StandardComposer::new()) as Arc<dyn VintageComposer>);
        let gate = Arc::new(RequestGate::from_config(&self.config));
        let fetcher = RetryingFetcher::new(
            &self.config,
            http,
            gate,
            self.statistics,
            self.cancel.unwrap_or_default(),
        );
        let parser = Arc::new(self.parser);

        Ok(FredClient {
            resolver: VintageDateResolver::new(
                fetcher.clone(),
                Arc::clone(&parser),
                self.config.vintage_date_page_size,
            ),
            chunked: ChunkedObservationFetcher::new(
                fetcher.clone(),
                Arc::clone(&parser),
                Arc::clone(&composer),
                self.config.vintage_chunk_size,
            ),
            config: self.config,
            fetcher,
            parser,
            composer,
        })
    }
}

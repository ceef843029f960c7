//! Observation retrieval split into host-sized vintage chunks.
//!
//! The host answers sparse requests relative to the first vintage of each request, so a
//! chunk's first vintage repeats every value. When more than one chunk is fetched sparse,
//! each chunk is densified, the chunks are concatenated, and the whole is sparsified once.

use std::sync::Arc;

use futures::future::join_all;
use time::Date;

use crate::composer::VintageComposer;
use crate::domain::calendar::{format_iso_date, join_iso_dates};
use crate::fetcher::{append_query, RetryingFetcher};
use crate::payload::{PayloadParser, OBSERVATIONS_ROOT};
use crate::{DataDensity, Observation, SourceError, Symbol};

pub struct ChunkedObservationFetcher<P> {
    fetcher: RetryingFetcher,
    parser: Arc<P>,
    composer: Arc<dyn VintageComposer>,
    chunk_size: usize,
}

impl<P: PayloadParser> ChunkedObservationFetcher<P> {
    pub fn new(
        fetcher: RetryingFetcher,
        parser: Arc<P>,
        composer: Arc<dyn VintageComposer>,
        chunk_size: usize,
    ) -> Self {
        Self {
            fetcher,
            parser,
            composer,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Observations of `symbol` at the given vintages, canonically sorted.
    pub async fn fetch(
        &self,
        symbol: &Symbol,
        vintage_dates: &[Date],
        obs_start: Option<Date>,
        obs_end: Option<Date>,
        density: DataDensity,
    ) -> Result<Vec<Observation>, SourceError> {
        if vintage_dates.is_empty() {
            return Err(SourceError::invalid_request(format!(
                "at least one vintage date is required for {symbol}"
            )));
        }

        let mut dates = vintage_dates.to_vec();
        dates.sort_unstable();
        dates.dedup();

        let requests = dates
            .chunks(self.chunk_size)
            .map(|chunk| self.fetch_chunk(symbol, chunk, obs_start, obs_end, density));
        let mut chunks = Vec::new();
        for result in join_all(requests).await {
            chunks.push(result?);
        }

        let chunk_count = chunks.len();
        let mut observations: Vec<Observation> =
            if chunk_count > 1 && density == DataDensity::Sparse {
                let dense = chunks
                    .into_iter()
                    .flat_map(|rows| self.composer.make_dense(rows))
                    .collect();
                self.composer.make_sparse(dense)
            } else {
                chunks.into_iter().flatten().collect()
            };
        observations.sort();

        tracing::debug!(
            symbol = %symbol,
            chunks = chunk_count,
            vintages = dates.len(),
            rows = observations.len(),
            %density,
            "fetched observations"
        );
        Ok(observations)
    }

    async fn fetch_chunk(
        &self,
        symbol: &Symbol,
        chunk: &[Date],
        obs_start: Option<Date>,
        obs_end: Option<Date>,
        density: DataDensity,
    ) -> Result<Vec<Observation>, SourceError> {
        let uri = self.chunk_uri(symbol, chunk, obs_start, obs_end, density);
        let Some(body) = self.fetcher.download(&uri).await? else {
            return Ok(Vec::new());
        };

        self.parser
            .parse_observation_rows(symbol, &body)
            .map_err(|error| SourceError::malformed_response(&uri, OBSERVATIONS_ROOT, &error))
    }

    fn chunk_uri(
        &self,
        symbol: &Symbol,
        chunk: &[Date],
        obs_start: Option<Date>,
        obs_end: Option<Date>,
        density: DataDensity,
    ) -> String {
        let mut uri = append_query("series/observations", "series_id", symbol.as_str());
        uri = append_query(&uri, "vintage_dates", &join_iso_dates(chunk));
        uri = append_query(&uri, "output_type", &density.output_type().to_string());
        if let Some(start) = obs_start {
            uri = append_query(&uri, "observation_start", &format_iso_date(start));
        }
        if let Some(end) = obs_end {
            uri = append_query(&uri, "observation_end", &format_iso_date(end));
        }
        append_query(&uri, "file_type", self.parser.file_type())
    }
}

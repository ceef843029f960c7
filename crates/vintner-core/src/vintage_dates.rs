//! Paged retrieval of the revision dates published for a series.

use std::sync::Arc;

use time::Date;

use crate::domain::calendar::format_iso_date;
use crate::fetcher::{append_query, RetryingFetcher};
use crate::payload::{PayloadParser, VINTAGE_DATES_ROOT};
use crate::{SourceError, Symbol};

pub struct VintageDateResolver<P> {
    fetcher: RetryingFetcher,
    parser: Arc<P>,
    page_size: usize,
}

impl<P: PayloadParser> VintageDateResolver<P> {
    pub fn new(fetcher: RetryingFetcher, parser: Arc<P>, page_size: usize) -> Self {
        Self {
            fetcher,
            parser,
            page_size: page_size.max(1),
        }
    }

    /// Ascending, de-duplicated vintage dates of `symbol`, optionally limited to a
    /// real-time period. A series the host does not know yields an empty list.
    pub async fn resolve(
        &self,
        symbol: &Symbol,
        rt_start: Option<Date>,
        rt_end: Option<Date>,
    ) -> Result<Vec<Date>, SourceError> {
        let mut dates = Vec::new();
        let mut offset = 0;

        loop {
            let uri = self.page_uri(symbol, rt_start, rt_end, offset);
            let Some(body) = self.fetcher.download(&uri).await? else {
                break;
            };

            let page = self
                .parser
                .parse_dates(&body, VINTAGE_DATES_ROOT)
                .map_err(|error| SourceError::malformed_response(&uri, VINTAGE_DATES_ROOT, &error))?;
            let received = page.len();
            dates.extend(page);

            if received < self.page_size {
                break;
            }
            offset += received;
        }

        dates.sort_unstable();
        dates.dedup();
        tracing::debug!(symbol = %symbol, count = dates.len(), "resolved vintage dates");
        Ok(dates)
    }

    fn page_uri(
        &self,
        symbol: &Symbol,
        rt_start: Option<Date>,
        rt_end: Option<Date>,
        offset: usize,
    ) -> String {
        let mut uri = append_query("series/vintagedates", "series_id", symbol.as_str());
        if let Some(start) = rt_start {
            uri = append_query(&uri, "realtime_start", &format_iso_date(start));
        }
        if let Some(end) = rt_end {
            uri = append_query(&uri, "realtime_end", &format_iso_date(end));
        }
        uri = append_query(&uri, "offset", &offset.to_string());
        uri = append_query(&uri, "limit", &self.page_size.to_string());
        append_query(&uri, "file_type", self.parser.file_type())
    }
}

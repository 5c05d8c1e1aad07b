use thiserror::Error;

/// Failure of a single HTTP exchange.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

/// Why a fetch produced no usable payload.
#[derive(Error, Debug)]
pub enum FetchFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("asked for item {requested} but the response describes item {returned}")]
    UnexpectedItem { requested: u32, returned: u32 },

    #[error("{0}")]
    Lookup(String),
}

#[derive(Error, Debug)]
pub enum Error {
    /// Recipe metadata or world list could not be retrieved. Fatal to the run.
    #[error("failed to fetch metadata from {url}: {source}")]
    MetadataFetch {
        url: String,
        #[source]
        source: FetchFailure,
    },

    /// A price-query batch failed. Nothing already merged is kept.
    #[error(
        "market data batch {batch}/{total_batches} (item ids {first_id}..={last_id}) from {url} failed: {source}"
    )]
    MarketDataFetch {
        url: String,
        batch: usize,
        total_batches: usize,
        first_id: u32,
        last_id: u32,
        #[source]
        source: FetchFailure,
    },

    #[error("invalid percentile bound {name} = {value}: {reason}")]
    InvalidPercentileBound {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("invalid config value for {field}: {reason}")]
    Config { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

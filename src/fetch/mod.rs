mod mtgio;

use std::future::Future;
use thiserror::Error;

use crate::data::{Card, ColorFilter};

pub use mtgio::{MtgIoFetcher, DEFAULT_API_URL};

// ---- Errors ---- //

#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport failure: connection, timeout, body read
    #[error("Failed to retrieve {url}: {source}")]
    RetrievalError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Remote source answered with status {0}")]
    StatusError(u16),

    #[error("Failed to build HTTP client: {0}")]
    ClientError(#[source] reqwest::Error),

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    #[error("Card not found: {0}")]
    NotFound(String),

    /// Body did not match the card schema
    #[error("Failed to parse card data: {0}")]
    DataParseError(String),
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::DataParseError(err.to_string())
    }
}

pub type FetchResult<T> = Result<T, FetchError>;

// ---- Interface ---- //

pub const DEFAULT_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
    pub filter: ColorFilter,
}

impl PageRequest {
    pub fn first(filter: ColorFilter) -> Self {
        PageRequest {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            filter,
        }
    }
}

/// A paginated remote catalog of cards.
pub trait CardSource {
    fn fetch_page(&self, request: &PageRequest) -> impl Future<Output = FetchResult<Vec<Card>>>;

    fn fetch_card(&self, id: &str) -> impl Future<Output = FetchResult<Card>>;
}

pub mod cart;
pub mod config;
pub mod core;
pub mod data;
pub mod fetch;
pub mod glue;

pub use crate::cart::{CartError, CartStore};
pub use crate::config::Config;
pub use crate::core::{fetch_next_page, CatalogState, PageTicket};
pub use crate::data::{Card, CartEntry, Color, ColorFilter};
pub use crate::fetch::{CardSource, FetchError, FetchResult, MtgIoFetcher, PageRequest};
pub use crate::glue::{BrowseCommand, CatalogSession, Flow};

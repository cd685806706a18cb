use std::path::PathBuf;
use std::time::Duration;

use crate::fetch::{DEFAULT_API_URL, DEFAULT_PAGE_SIZE};

pub const DEFAULT_SLOT: &str = "favorites";

/// Upper bound the remote API accepts for `pageSize`.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub page_size: u32,
    pub data_dir: PathBuf,
    pub slot: String,
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: DEFAULT_API_URL.to_owned(),
            page_size: DEFAULT_PAGE_SIZE,
            data_dir: default_data_dir(),
            slot: DEFAULT_SLOT.to_owned(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn cart_path(&self) -> PathBuf {
        crate::cart::CartStore::slot_path(&self.data_dir, &self.slot)
    }
}

/// `~/.alexandria`, or the working directory when there is no home.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".alexandria")
}

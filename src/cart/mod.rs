use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

use crate::data::{Card, CartEntry};

#[derive(Error, Debug)]
pub enum CartError {
    #[error("Cart storage error: {0}")]
    Io(#[from] io::Error),

    #[error("Cart slot {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize cart: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type CartResult<T> = Result<T, CartError>;

pub type CartMap = HashMap<String, CartEntry>;

/// Favorites keyed by card id, written through to a single JSON slot on
/// every change.
pub struct CartStore {
    path: PathBuf,
    entries: CartMap,
}

impl CartStore {
    pub fn slot_path(data_dir: &Path, slot: &str) -> PathBuf {
        data_dir.join(format!("{}.json", slot))
    }

    /// Loads the slot at `path`. A missing slot is an empty cart.
    pub fn open(path: impl Into<PathBuf>) -> CartResult<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str::<CartMap>(&raw).map_err(|source| {
                CartError::Corrupt {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => CartMap::new(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), entries = entries.len(), "Opened cart");
        Ok(CartStore { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bumps the quantity for `card`, starting at 1. Returns the new quantity.
    pub fn add(&mut self, card: &Card) -> CartResult<u32> {
        let entry = self
            .entries
            .entry(card.id.clone())
            .or_insert_with(|| CartEntry::new(card.clone()));
        entry.quantity += 1;
        let quantity = entry.quantity;
        self.persist()?;
        info!(id = %card.id, name = %card.name, quantity, "Added to cart");
        Ok(quantity)
    }

    /// Drops one copy of `id`; the entry goes away at zero. Returns the new
    /// quantity, or `None` if the id was not in the cart.
    pub fn remove(&mut self, id: &str) -> CartResult<Option<u32>> {
        let Some(entry) = self.entries.get_mut(id) else {
            return Ok(None);
        };
        entry.quantity = entry.quantity.saturating_sub(1);
        let quantity = entry.quantity;
        if quantity == 0 {
            self.entries.remove(id);
        }
        self.persist()?;
        Ok(Some(quantity))
    }

    pub fn clear(&mut self) -> CartResult<()> {
        self.entries.clear();
        self.persist()?;
        info!("Cart cleared");
        Ok(())
    }

    /// All entries, sorted by card name.
    pub fn list(&self) -> Vec<&CartEntry> {
        let mut entries = self.entries.values().collect::<Vec<&CartEntry>>();
        entries.sort_by(|a, b| a.card.name.cmp(&b.card.name).then(a.card.id.cmp(&b.card.id)));
        entries
    }

    pub fn get(&self, id: &str) -> Option<&CartEntry> {
        self.entries.get(id)
    }

    pub fn total_quantity(&self) -> u32 {
        self.entries.values().map(|e| e.quantity).sum()
    }

    fn persist(&self) -> CartResult<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let json = serde_json::to_vec_pretty(&self.entries)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&json)?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|err| err.error)?;
        debug!(path = %self.path.display(), "Cart persisted");
        Ok(())
    }
}

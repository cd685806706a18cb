use futures::{stream, StreamExt};
use std::io::{self, Write};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cart::{CartResult, CartStore};
use crate::core::{fetch_next_page, CatalogState};
use crate::data::{Card, CartEntry, ColorFilter, UnknownColor};
use crate::fetch::{CardSource, FetchResult};

// ---- Session ---- //

/// The catalog view: accumulated results, search term and cart over one source.
pub struct CatalogSession<S: CardSource> {
    source: S,
    state: CatalogState,
    search: String,
    cart: CartStore,
}

impl<S: CardSource> CatalogSession<S> {
    pub fn new(source: S, page_size: u32, cart: CartStore) -> Self {
        CatalogSession {
            source,
            state: CatalogState::new(page_size),
            search: String::new(),
            cart,
        }
    }

    pub fn state(&self) -> &CatalogState {
        &self.state
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub async fn load_more(&mut self) {
        let state = std::mem::take(&mut self.state);
        self.state = fetch_next_page(state, &self.source).await;
    }

    /// Loads up to `pages` pages one after another, stopping early once the
    /// source runs dry.
    pub async fn load_pages(&mut self, pages: u32) {
        let state = std::mem::take(&mut self.state);
        let source = &self.source;
        self.state = stream::iter(0..pages)
            .fold(state, |state, _| fetch_next_page(state, source))
            .await;
    }

    /// Returns whether the filter changed, which discards the loaded results.
    pub fn set_colors(&mut self, filter: ColorFilter) -> bool {
        if *self.state.filter() == filter {
            return false;
        }
        let state = std::mem::take(&mut self.state);
        self.state = state.with_filter(filter);
        true
    }

    pub fn set_search(&mut self, term: &str) {
        self.search = term.trim().to_owned();
    }

    pub fn visible(&self) -> impl Iterator<Item = &Card> {
        self.state.query(&self.search)
    }

    /// Card detail, from the loaded results when possible.
    pub async fn show(&self, id: &str) -> FetchResult<Card> {
        if let Some(card) = self.state.find(id) {
            return Ok(card.clone());
        }
        debug!(id, "Card not loaded, asking remote source");
        self.source.fetch_card(id).await
    }

    pub async fn add_to_cart(&mut self, id: &str) -> Result<(Card, u32), SessionError> {
        let card = self.show(id).await?;
        let quantity = self.cart.add(&card)?;
        Ok((card, quantity))
    }

    pub fn remove_from_cart(&mut self, id: &str) -> CartResult<Option<u32>> {
        self.cart.remove(id)
    }

    pub fn clear_cart(&mut self) -> CartResult<()> {
        self.cart.clear()
    }

    pub fn cart(&self) -> Vec<&CartEntry> {
        self.cart.list()
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Fetch(#[from] crate::fetch::FetchError),

    #[error(transparent)]
    Cart(#[from] crate::cart::CartError),
}

// ---- Browse commands ---- //

#[derive(Debug, Clone, PartialEq)]
pub enum BrowseCommand {
    More,
    List,
    Colors(ColorFilter),
    Search(String),
    Show(String),
    Add(String),
    Remove(String),
    Cart,
    Clear,
    Help,
    Quit,
}

#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("Unknown command '{0}', try 'help'")]
    Unknown(String),

    #[error("'{0}' needs a card id")]
    MissingId(&'static str),

    #[error(transparent)]
    Color(#[from] UnknownColor),
}

impl BrowseCommand {
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((w, r)) => (w, r.trim()),
            None => (line, ""),
        };
        let id = |name: &'static str| {
            if rest.is_empty() {
                Err(CommandError::MissingId(name))
            } else {
                Ok(rest.to_owned())
            }
        };
        let cmd = match word.to_lowercase().as_str() {
            "more" | "m" => BrowseCommand::More,
            "list" | "ls" => BrowseCommand::List,
            "colors" | "c" => BrowseCommand::Colors(ColorFilter::parse(rest)?),
            "search" | "s" => BrowseCommand::Search(rest.to_owned()),
            "show" => BrowseCommand::Show(id("show")?),
            "add" => BrowseCommand::Add(id("add")?),
            "remove" | "rm" => BrowseCommand::Remove(id("remove")?),
            "cart" => BrowseCommand::Cart,
            "clear" => BrowseCommand::Clear,
            "help" | "?" => BrowseCommand::Help,
            "quit" | "exit" | "q" => BrowseCommand::Quit,
            other => return Err(CommandError::Unknown(other.to_owned())),
        };
        Ok(Some(cmd))
    }
}

pub const HELP: &str = "\
commands:
  more               load the next page
  list               show loaded cards matching the search
  colors [WUBRG]     filter by colors (no argument clears)
  search [text]      filter loaded cards by name (no argument clears)
  show <id>          card details
  add <id>           add a card to favorites
  remove <id>        remove one copy from favorites
  cart               list favorites
  clear              empty favorites
  quit";

#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

impl<S: CardSource> CatalogSession<S> {
    /// Runs one browse command, writing its outcome to `out`. Command
    /// failures are reported and the session carries on.
    pub async fn handle(&mut self, cmd: BrowseCommand, out: &mut impl Write) -> io::Result<Flow> {
        match cmd {
            BrowseCommand::More => {
                let before = self.state.len();
                self.load_more().await;
                let added = self.state.len() - before;
                if added == 0 && self.state.is_exhausted() {
                    writeln!(out, "No more cards.")?;
                } else {
                    writeln!(out, "{} new cards, {} loaded.", added, self.state.len())?;
                }
            }
            BrowseCommand::List => write_cards(out, self.visible())?,
            BrowseCommand::Colors(filter) => {
                if self.set_colors(filter) {
                    self.load_more().await;
                }
                writeln!(
                    out,
                    "Colors: {}. {} cards loaded.",
                    self.state.filter(),
                    self.state.len()
                )?;
            }
            BrowseCommand::Search(term) => {
                self.set_search(&term);
                write_cards(out, self.visible())?;
            }
            BrowseCommand::Show(id) => match self.show(&id).await {
                Ok(card) => write_card_detail(out, &card)?,
                Err(err) => writeln!(out, "{}", err)?,
            },
            BrowseCommand::Add(id) => match self.add_to_cart(&id).await {
                Ok((card, quantity)) => writeln!(out, "{} x{}", card.name, quantity)?,
                Err(err) => {
                    warn!("Add to cart failed: {}", err);
                    writeln!(out, "{}", err)?
                }
            },
            BrowseCommand::Remove(id) => match self.remove_from_cart(&id) {
                Ok(Some(quantity)) => writeln!(out, "{} left: {}", id, quantity)?,
                Ok(None) => writeln!(out, "{} is not in favorites.", id)?,
                Err(err) => writeln!(out, "{}", err)?,
            },
            BrowseCommand::Cart => write_cart(out, &self.cart())?,
            BrowseCommand::Clear => match self.clear_cart() {
                Ok(()) => writeln!(out, "Favorites cleared.")?,
                Err(err) => writeln!(out, "{}", err)?,
            },
            BrowseCommand::Help => writeln!(out, "{}", HELP)?,
            BrowseCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }
}

// ---- Output ---- //

pub fn write_cards<'a>(out: &mut impl Write, cards: impl Iterator<Item = &'a Card>) -> io::Result<()> {
    let mut count = 0;
    for card in cards {
        writeln!(
            out,
            "{:<38} {:<32} {}",
            card.id,
            card.name,
            card.mana_cost.as_deref().unwrap_or("")
        )?;
        count += 1;
    }
    writeln!(out, "({} cards)", count)
}

pub fn write_card_detail(out: &mut impl Write, card: &Card) -> io::Result<()> {
    writeln!(out, "{}  {}", card.name, card.mana_cost.as_deref().unwrap_or(""))?;
    writeln!(out, "{}", card.type_line)?;
    if let Some(text) = &card.text {
        writeln!(out, "{}", text)?;
    }
    if let Some(pt) = card.power_toughness() {
        writeln!(out, "{}", pt)?;
    }
    let mut identity = card
        .color_identity
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<String>>()
        .join("");
    if identity.is_empty() {
        identity.push_str("colorless");
    }
    writeln!(out, "Mana value: {}  Identity: {}", card.cmc, identity)?;
    writeln!(out, "{} ({})", card.set_name, card.rarity)?;
    if let Some(url) = &card.image_url {
        writeln!(out, "Image: {}", url)?;
    }
    writeln!(out, "Id: {}", card.id)
}

pub fn write_cart(out: &mut impl Write, entries: &[&CartEntry]) -> io::Result<()> {
    if entries.is_empty() {
        return writeln!(out, "Favorites are empty.");
    }
    for entry in entries {
        writeln!(
            out,
            "{:>3} x {:<32} {} (added {})",
            entry.quantity,
            entry.card.name,
            entry.card.id,
            entry.added_at.format("%Y-%m-%d")
        )?;
    }
    Ok(())
}

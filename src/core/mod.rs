use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::data::{Card, ColorFilter};
use crate::fetch::{CardSource, FetchResult, PageRequest, DEFAULT_PAGE_SIZE};

/// Outstanding page request. A ticket is consumed on completion; it is
/// dropped if a reset happened in between or it is not for the awaited page.
#[derive(Debug, PartialEq, Eq)]
pub struct PageTicket {
    pub request: PageRequest,
    generation: u64,
}

/// Deduplicated, order-preserving accumulation of fetched pages.
#[derive(Debug, Clone)]
pub struct CatalogState {
    cards: Vec<Card>,
    seen_names: HashSet<String>,
    next_page: u32,
    page_size: u32,
    filter: ColorFilter,
    generation: u64,
    in_flight: bool,
    exhausted: bool,
}

impl Default for CatalogState {
    fn default() -> Self {
        CatalogState::new(DEFAULT_PAGE_SIZE)
    }
}

impl CatalogState {
    pub fn new(page_size: u32) -> Self {
        CatalogState {
            cards: vec![],
            seen_names: HashSet::new(),
            next_page: 1,
            page_size: page_size.max(1),
            filter: ColorFilter::default(),
            generation: 0,
            in_flight: false,
            exhausted: false,
        }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn next_page(&self) -> u32 {
        self.next_page
    }

    pub fn filter(&self) -> &ColorFilter {
        &self.filter
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn reset(self) -> Self {
        CatalogState {
            generation: self.generation + 1,
            filter: self.filter,
            ..CatalogState::new(self.page_size)
        }
    }

    /// Swaps the color filter, restarting pagination when it changed.
    pub fn with_filter(self, filter: ColorFilter) -> Self {
        if filter == self.filter {
            return self;
        }
        info!(from = %self.filter, to = %filter, "Color filter changed, restarting from page 1");
        CatalogState { filter, ..self }.reset()
    }

    /// Claims the next page. No ticket is handed out while another request
    /// is outstanding or after the source ran dry.
    pub fn begin_fetch(mut self) -> (Self, Option<PageTicket>) {
        if self.in_flight {
            debug!(page = self.next_page, "Page request already in flight");
            return (self, None);
        }
        if self.exhausted {
            debug!("No more pages under filter {}", self.filter);
            return (self, None);
        }
        self.in_flight = true;
        let ticket = PageTicket {
            request: PageRequest {
                page: self.next_page,
                page_size: self.page_size,
                filter: self.filter.clone(),
            },
            generation: self.generation,
        };
        (self, Some(ticket))
    }

    pub fn complete_fetch(mut self, ticket: PageTicket, result: FetchResult<Vec<Card>>) -> Self {
        if ticket.generation != self.generation {
            debug!(page = ticket.request.page, "Dropping response to a stale request");
            return self;
        }
        if !self.in_flight || ticket.request.page != self.next_page {
            debug!(
                page = ticket.request.page,
                expected = self.next_page,
                in_flight = self.in_flight,
                "Dropping response nobody is waiting for"
            );
            return self;
        }
        self.in_flight = false;
        match result {
            Ok(batch) => {
                let received = batch.len();
                let added = self.absorb(batch);
                info!(
                    page = ticket.request.page,
                    received, added, total = self.cards.len(),
                    "Page merged"
                );
                self.next_page += 1;
                if (received as u32) < self.page_size {
                    self.exhausted = true;
                }
            }
            Err(err) => {
                warn!(page = ticket.request.page, "Failed to fetch page: {}", err);
            }
        }
        self
    }

    /// Appends the unseen names of `batch` in arrival order.
    fn absorb(&mut self, batch: Vec<Card>) -> usize {
        let before = self.cards.len();
        for card in batch {
            if self.seen_names.insert(card.name.clone()) {
                self.cards.push(card);
            }
        }
        self.cards.len() - before
    }

    /// Cards whose name contains `term`, ignoring case. An empty term yields
    /// the full result set.
    pub fn query<'a>(&'a self, term: &str) -> impl Iterator<Item = &'a Card> + 'a {
        let needle = term.to_lowercase();
        self.cards.iter().filter(move |c| c.name_contains(&needle))
    }

    pub fn find(&self, id: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }
}

pub async fn fetch_next_page<S: CardSource>(state: CatalogState, source: &S) -> CatalogState {
    let (state, ticket) = state.begin_fetch();
    let Some(ticket) = ticket else {
        return state;
    };
    let result = source.fetch_page(&ticket.request).await;
    state.complete_fetch(ticket, result)
}

//! Property tests for the result accumulator.

use std::collections::{BTreeSet, HashSet};

use alexandria::{Card, CatalogState};
use proptest::prelude::*;

fn card(id: usize, name: &str) -> Card {
    Card {
        id: format!("id-{}", id),
        name: name.to_owned(),
        image_url: None,
        type_line: "Instant".to_owned(),
        cmc: 1.0,
        mana_cost: None,
        text: None,
        power: None,
        toughness: None,
        set_name: "Test".to_owned(),
        rarity: "Common".to_owned(),
        color_identity: BTreeSet::new(),
    }
}

/// Pages of names drawn from a small pool so duplicates are frequent.
fn pages_strategy() -> impl Strategy<Value = Vec<Vec<String>>> {
    let name = prop::sample::select(vec![
        "Shock", "Bolt", "Counterspell", "Giant Growth", "Dark Ritual", "Swords to Plowshares",
        "bolt",
    ])
    .prop_map(str::to_owned);
    prop::collection::vec(prop::collection::vec(name, 0..7), 0..6)
}

fn run_pages(mut state: CatalogState, pages: &[Vec<String>]) -> CatalogState {
    let mut next_id = 0;
    for page in pages {
        let (s, ticket) = state.begin_fetch();
        let Some(ticket) = ticket else {
            return s;
        };
        let batch = page
            .iter()
            .map(|n| {
                next_id += 1;
                card(next_id, n)
            })
            .collect::<Vec<Card>>();
        state = s.complete_fetch(ticket, Ok(batch));
    }
    state
}

proptest! {
    #[test]
    fn names_stay_unique(pages in pages_strategy()) {
        let state = run_pages(CatalogState::new(4), &pages);
        let mut seen = HashSet::new();
        for c in state.cards() {
            prop_assert!(seen.insert(c.name.clone()), "duplicate name {}", c.name);
        }
    }

    #[test]
    fn first_occurrence_wins(pages in pages_strategy()) {
        let state = run_pages(CatalogState::new(4), &pages);
        let mut expected: Vec<String> = vec![];
        'pages: for (i, page) in pages.iter().enumerate() {
            for n in page {
                if !expected.contains(n) {
                    expected.push(n.clone());
                }
            }
            // A short page ends pagination.
            if page.len() < 4 && i + 1 < pages.len() {
                break 'pages;
            }
        }
        let names = state.cards().iter().map(|c| c.name.clone()).collect::<Vec<String>>();
        prop_assert_eq!(names, expected);
    }

    #[test]
    fn reset_matches_fresh_start(pages in pages_strategy()) {
        let fresh = run_pages(CatalogState::new(4), &pages);
        let replayed = run_pages(run_pages(CatalogState::new(4), &pages).reset(), &pages);
        let a = fresh.cards().iter().map(|c| c.name.as_str()).collect::<Vec<&str>>();
        let b = replayed.cards().iter().map(|c| c.name.as_str()).collect::<Vec<&str>>();
        prop_assert_eq!(a, b);
        prop_assert_eq!(fresh.next_page(), replayed.next_page());
    }

    #[test]
    fn query_is_a_matching_subset(pages in pages_strategy(), term in "[a-zA-Z ]{0,4}") {
        let state = run_pages(CatalogState::new(4), &pages);
        if term.is_empty() {
            prop_assert_eq!(state.query(&term).count(), state.len());
        }
        let needle = term.to_lowercase();
        let ids = state.cards().iter().map(|c| c.id.as_str()).collect::<HashSet<&str>>();
        for c in state.query(&term) {
            prop_assert!(c.name.to_lowercase().contains(&needle));
            prop_assert!(ids.contains(c.id.as_str()));
        }
        let expected = state
            .cards()
            .iter()
            .filter(|c| c.name.to_lowercase().contains(&needle))
            .count();
        prop_assert_eq!(state.query(&term).count(), expected);
    }
}

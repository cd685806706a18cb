use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

// ---- Cards ---- //

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Card {
    pub id: String,
    pub name: String,
    pub image_url: Option<String>,
    pub type_line: String,
    pub cmc: f64,
    pub mana_cost: Option<String>,
    pub text: Option<String>,
    pub power: Option<String>,
    pub toughness: Option<String>,
    pub set_name: String,
    pub rarity: String,
    pub color_identity: BTreeSet<Color>,
}

impl Card {
    /// Case-insensitive substring match on the card name.
    pub fn name_contains(&self, needle_lower: &str) -> bool {
        needle_lower.is_empty() || self.name.to_lowercase().contains(needle_lower)
    }

    pub fn power_toughness(&self) -> Option<String> {
        match (&self.power, &self.toughness) {
            (Some(p), Some(t)) => Some(format!("{}/{}", p, t)),
            _ => None,
        }
    }
}

// ---- Colors ---- //

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Color {
    #[serde(rename = "W")]
    White,
    #[serde(rename = "U")]
    Blue,
    #[serde(rename = "B")]
    Black,
    #[serde(rename = "R")]
    Red,
    #[serde(rename = "G")]
    Green,
}

lazy_static! {
    static ref COLOR_NAMES: HashMap<&'static str, Color> = {
        let mut m = HashMap::new();
        for c in Color::ALL {
            m.insert(c.symbol(), c);
            m.insert(c.name(), c);
        }
        m
    };
}

impl Color {
    pub const ALL: [Color; 5] = [
        Color::White,
        Color::Blue,
        Color::Black,
        Color::Red,
        Color::Green,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            Color::White => "w",
            Color::Blue => "u",
            Color::Black => "b",
            Color::Red => "r",
            Color::Green => "g",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Blue => "blue",
            Color::Black => "black",
            Color::Red => "red",
            Color::Green => "green",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol().to_uppercase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownColor(pub String);

impl fmt::Display for UnknownColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown color '{}', expected one of W, U, B, R, G", self.0)
    }
}

impl std::error::Error for UnknownColor {}

impl FromStr for Color {
    type Err = UnknownColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        COLOR_NAMES
            .get(s.trim().to_lowercase().as_str())
            .copied()
            .ok_or_else(|| UnknownColor(s.to_owned()))
    }
}

// ---- Filter State ---- //

/// Server-side color selection. Ordered so the query fragment is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorFilter {
    colors: BTreeSet<Color>,
}

impl ColorFilter {
    pub fn new(colors: impl IntoIterator<Item = Color>) -> Self {
        ColorFilter {
            colors: colors.into_iter().collect(),
        }
    }

    /// Parses either a run of symbols ("wub") or a comma separated list
    /// of symbols or names ("white,blue").
    pub fn parse(input: &str) -> Result<Self, UnknownColor> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(ColorFilter::default());
        }
        let colors = if input.contains(',') {
            input
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(Color::from_str)
                .collect::<Result<Vec<Color>, UnknownColor>>()?
        } else if let Ok(c) = Color::from_str(input) {
            vec![c]
        } else {
            input
                .chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| Color::from_str(&c.to_string()))
                .collect::<Result<Vec<Color>, UnknownColor>>()?
        };
        Ok(ColorFilter::new(colors))
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn colors(&self) -> impl Iterator<Item = &Color> {
        self.colors.iter()
    }

    /// Query string fragment for the remote source, `None` when no colors
    /// are selected.
    pub fn query_fragment(&self) -> Option<String> {
        if self.colors.is_empty() {
            return None;
        }
        let names = self
            .colors
            .iter()
            .map(|c| c.name())
            .collect::<Vec<&str>>();
        Some(format!("colors={}", names.join(",")))
    }
}

impl fmt::Display for ColorFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.colors.is_empty() {
            return write!(f, "any");
        }
        for c in self.colors.iter() {
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

// ---- Cart ---- //

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CartEntry {
    pub card: Card,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

impl CartEntry {
    pub fn new(card: Card) -> Self {
        CartEntry {
            card,
            quantity: 0,
            added_at: Utc::now(),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_card(id: &str, name: &str) -> Card {
    Card {
        id: id.to_owned(),
        name: name.to_owned(),
        image_url: None,
        type_line: "Instant".to_owned(),
        cmc: 1.0,
        mana_cost: Some("{R}".to_owned()),
        text: None,
        power: None,
        toughness: None,
        set_name: "Alpha".to_owned(),
        rarity: "Common".to_owned(),
        color_identity: BTreeSet::from([Color::Red]),
    }
}

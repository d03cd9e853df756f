//! Core types for the Picky restaurant recommendation server.
//!
//! Wire strings on the enums are part of the tool contract: they match the
//! Notion database options and the values documented in the usage guide, so
//! renaming a variant here is a breaking change for existing databases.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cuisine tag as stored in the Notion multi-select.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Cuisine {
    American,
    Italian,
    Japanese,
    Chinese,
    Mexican,
    Indian,
    French,
    Thai,
    Mediterranean,
    Seafood,
    Steakhouse,
    Pizza,
    Sushi,
    Barbecue,
    Vegetarian,
    Vegan,
    #[serde(rename = "Fast Food")]
    FastFood,
    Cafe,
    Bakery,
    Other,
}

impl Cuisine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cuisine::American => "American",
            Cuisine::Italian => "Italian",
            Cuisine::Japanese => "Japanese",
            Cuisine::Chinese => "Chinese",
            Cuisine::Mexican => "Mexican",
            Cuisine::Indian => "Indian",
            Cuisine::French => "French",
            Cuisine::Thai => "Thai",
            Cuisine::Mediterranean => "Mediterranean",
            Cuisine::Seafood => "Seafood",
            Cuisine::Steakhouse => "Steakhouse",
            Cuisine::Pizza => "Pizza",
            Cuisine::Sushi => "Sushi",
            Cuisine::Barbecue => "Barbecue",
            Cuisine::Vegetarian => "Vegetarian",
            Cuisine::Vegan => "Vegan",
            Cuisine::FastFood => "Fast Food",
            Cuisine::Cafe => "Cafe",
            Cuisine::Bakery => "Bakery",
            Cuisine::Other => "Other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        ALL_CUISINES
            .iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .copied()
    }

    /// Parse a comma-separated list, skipping unrecognized names with a
    /// warning (a bad tag never fails the whole request).
    pub fn parse_list(s: &str) -> Vec<Self> {
        s.split(',')
            .filter(|part| !part.trim().is_empty())
            .filter_map(|part| {
                let parsed = Self::parse(part);
                if parsed.is_none() {
                    tracing::warn!("skipping unknown cuisine: {}", part.trim());
                }
                parsed
            })
            .collect()
    }
}

pub const ALL_CUISINES: [Cuisine; 20] = [
    Cuisine::American,
    Cuisine::Italian,
    Cuisine::Japanese,
    Cuisine::Chinese,
    Cuisine::Mexican,
    Cuisine::Indian,
    Cuisine::French,
    Cuisine::Thai,
    Cuisine::Mediterranean,
    Cuisine::Seafood,
    Cuisine::Steakhouse,
    Cuisine::Pizza,
    Cuisine::Sushi,
    Cuisine::Barbecue,
    Cuisine::Vegetarian,
    Cuisine::Vegan,
    Cuisine::FastFood,
    Cuisine::Cafe,
    Cuisine::Bakery,
    Cuisine::Other,
];

/// Ordinal price tier, rendered as `$` through `$$$$`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PriceTier {
    #[serde(rename = "$")]
    Budget,
    #[serde(rename = "$$")]
    Moderate,
    #[serde(rename = "$$$")]
    Expensive,
    #[serde(rename = "$$$$")]
    VeryExpensive,
}

impl PriceTier {
    /// Ordinal value in 1..=4.
    pub fn tier(&self) -> u8 {
        match self {
            PriceTier::Budget => 1,
            PriceTier::Moderate => 2,
            PriceTier::Expensive => 3,
            PriceTier::VeryExpensive => 4,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            PriceTier::Budget => "$",
            PriceTier::Moderate => "$$",
            PriceTier::Expensive => "$$$",
            PriceTier::VeryExpensive => "$$$$",
        }
    }

    pub fn from_tier(tier: u8) -> Option<Self> {
        match tier {
            1 => Some(PriceTier::Budget),
            2 => Some(PriceTier::Moderate),
            3 => Some(PriceTier::Expensive),
            4 => Some(PriceTier::VeryExpensive),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "$" => Some(PriceTier::Budget),
            "$$" => Some(PriceTier::Moderate),
            "$$$" => Some(PriceTier::Expensive),
            "$$$$" => Some(PriceTier::VeryExpensive),
            _ => None,
        }
    }

    /// Google Places price_level (0-4) collapsed onto our four tiers.
    pub fn from_price_level(level: u8) -> Self {
        match level {
            0 | 1 => PriceTier::Budget,
            2 => PriceTier::Moderate,
            3 => PriceTier::Expensive,
            _ => PriceTier::VeryExpensive,
        }
    }
}

/// Atmosphere tag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Vibe {
    #[serde(rename = "casual")]
    Casual,
    #[serde(rename = "romantic")]
    Romantic,
    #[serde(rename = "family-friendly")]
    FamilyFriendly,
    #[serde(rename = "fine dining")]
    FineDining,
    #[serde(rename = "trendy")]
    Trendy,
    #[serde(rename = "cozy")]
    Cozy,
    #[serde(rename = "lively")]
    Lively,
    #[serde(rename = "quiet")]
    Quiet,
    #[serde(rename = "outdoor")]
    Outdoor,
    #[serde(rename = "sports bar")]
    SportsBar,
    #[serde(rename = "date night")]
    DateNight,
    #[serde(rename = "business")]
    Business,
    #[serde(rename = "brunch")]
    Brunch,
    #[serde(rename = "late night")]
    LateNight,
    #[serde(rename = "counter service")]
    CounterService,
}

pub const ALL_VIBES: [Vibe; 15] = [
    Vibe::Casual,
    Vibe::Romantic,
    Vibe::FamilyFriendly,
    Vibe::FineDining,
    Vibe::Trendy,
    Vibe::Cozy,
    Vibe::Lively,
    Vibe::Quiet,
    Vibe::Outdoor,
    Vibe::SportsBar,
    Vibe::DateNight,
    Vibe::Business,
    Vibe::Brunch,
    Vibe::LateNight,
    Vibe::CounterService,
];

impl Vibe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vibe::Casual => "casual",
            Vibe::Romantic => "romantic",
            Vibe::FamilyFriendly => "family-friendly",
            Vibe::FineDining => "fine dining",
            Vibe::Trendy => "trendy",
            Vibe::Cozy => "cozy",
            Vibe::Lively => "lively",
            Vibe::Quiet => "quiet",
            Vibe::Outdoor => "outdoor",
            Vibe::SportsBar => "sports bar",
            Vibe::DateNight => "date night",
            Vibe::Business => "business",
            Vibe::Brunch => "brunch",
            Vibe::LateNight => "late night",
            Vibe::CounterService => "counter service",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        ALL_VIBES
            .iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
            .copied()
    }

    pub fn parse_list(s: &str) -> Vec<Self> {
        s.split(',')
            .filter(|part| !part.trim().is_empty())
            .filter_map(|part| {
                let parsed = Self::parse(part);
                if parsed.is_none() {
                    tracing::warn!("skipping unknown vibe: {}", part.trim());
                }
                parsed
            })
            .collect()
    }
}

/// Dining occasion. Unknown occasions fall back to `CasualDining` rather than
/// failing the request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Occasion {
    #[default]
    #[serde(rename = "casual dining")]
    CasualDining,
    #[serde(rename = "date night")]
    DateNight,
    #[serde(rename = "business lunch")]
    BusinessLunch,
    #[serde(rename = "family dinner")]
    FamilyDinner,
    #[serde(rename = "celebration")]
    Celebration,
    #[serde(rename = "quick bite")]
    QuickBite,
    #[serde(rename = "weekend brunch")]
    WeekendBrunch,
    #[serde(rename = "happy hour")]
    HappyHour,
    #[serde(rename = "late night")]
    LateNight,
    #[serde(rename = "takeout")]
    Takeout,
}

impl Occasion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Occasion::CasualDining => "casual dining",
            Occasion::DateNight => "date night",
            Occasion::BusinessLunch => "business lunch",
            Occasion::FamilyDinner => "family dinner",
            Occasion::Celebration => "celebration",
            Occasion::QuickBite => "quick bite",
            Occasion::WeekendBrunch => "weekend brunch",
            Occasion::HappyHour => "happy hour",
            Occasion::LateNight => "late night",
            Occasion::Takeout => "takeout",
        }
    }

    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        [
            Occasion::CasualDining,
            Occasion::DateNight,
            Occasion::BusinessLunch,
            Occasion::FamilyDinner,
            Occasion::Celebration,
            Occasion::QuickBite,
            Occasion::WeekendBrunch,
            Occasion::HappyHour,
            Occasion::LateNight,
            Occasion::Takeout,
        ]
        .into_iter()
        .find(|o| o.as_str().eq_ignore_ascii_case(s))
        .unwrap_or_default()
    }
}

/// Geographic location. City is the only required field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl Location {
    pub fn new(city: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            ..Default::default()
        }
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    /// "City, ST" display string.
    pub fn display(&self) -> String {
        match &self.state {
            Some(state) => format!("{}, {}", self.city, state),
            None => self.city.clone(),
        }
    }
}

/// Enrichment data returned by the places API for one venue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaceDetails {
    pub place_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_level: Option<u8>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

/// One restaurant record, as stored in (or discovered for) the Notion
/// database. `id` is the opaque store page id and is absent until persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restaurant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub location: Location,
    #[serde(default)]
    pub cuisines: Vec<Cuisine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_tier: Option<PriceTier>,
    #[serde(default)]
    pub vibes: Vec<Vibe>,
    /// Personal rating in [1.0, 5.0] when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_visited: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub wishlist: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revisit: Option<bool>,
    /// External place reference (Google place id) once enriched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_ref: Option<String>,
    /// Latest enrichment payload, when fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_details: Option<PlaceDetails>,
}

impl Restaurant {
    pub fn new(name: impl Into<String>, location: Location) -> Self {
        Self {
            id: None,
            name: name.into(),
            location,
            cuisines: Vec::new(),
            price_tier: None,
            vibes: Vec::new(),
            rating: None,
            date_visited: None,
            notes: None,
            wishlist: false,
            revisit: None,
            place_ref: None,
            place_details: None,
        }
    }

    /// A record counts as a visit once it carries a personal rating.
    pub fn is_visited(&self) -> bool {
        self.rating.is_some()
    }
}

/// Per-cuisine aggregate inside a [`DiningProfile`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CuisineStat {
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,
}

/// Derived dining-preference profile. Recomputed on demand from the full
/// record set, never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DiningProfile {
    pub total_restaurants: usize,
    pub total_visits: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,
    pub cuisine_stats: HashMap<Cuisine, CuisineStat>,
    /// Histogram indexed by price tier - 1.
    pub price_histogram: [u32; 4],
    pub city_counts: HashMap<String, u32>,
    pub vibe_counts: HashMap<Vibe, u32>,
    pub personality: String,
}

/// Explicit preference signals handed to the recommendation engine. Weights
/// default to 1.0 per requested tag; the session manager accumulates deltas
/// on top.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub cuisine_weights: HashMap<Cuisine, f64>,
    #[serde(default)]
    pub vibe_weights: HashMap<Vibe, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price_tier: Option<PriceTier>,
}

impl Preferences {
    pub fn is_empty(&self) -> bool {
        self.cuisine_weights.is_empty()
            && self.vibe_weights.is_empty()
            && self.max_price_tier.is_none()
    }
}

/// Everything the engine needs for one recommendation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub target: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occasion: Option<Occasion>,
    #[serde(default)]
    pub preferences: Preferences,
    pub max_distance_km: f64,
    pub max_results: usize,
    #[serde(default)]
    pub exclude_visited: bool,
    #[serde(default = "default_true")]
    pub include_wishlist: bool,
}

fn default_true() -> bool {
    true
}

impl RecommendationRequest {
    pub fn new(target: Location) -> Self {
        Self {
            target,
            occasion: None,
            preferences: Preferences::default(),
            max_distance_km: 25.0,
            max_results: 10,
            exclude_visited: false,
            include_wishlist: true,
        }
    }
}

/// Named score components, each normalized to [0, 1] before weighting.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    pub cuisine_match: f64,
    pub price_match: f64,
    pub distance_penalty: f64,
    pub rating_bonus: f64,
    pub vibe_match: f64,
}

/// A scored candidate. Wraps the restaurant by value; candidates have no
/// lifetime independent of the response they appear in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub restaurant: Restaurant,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    pub reasoning: String,
}

/// One round of session feedback. Everything is optional; an empty feedback
/// call is a no-op by contract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionFeedback {
    #[serde(default)]
    pub liked_ids: Vec<String>,
    #[serde(default)]
    pub disliked_ids: Vec<String>,
    #[serde(default)]
    pub cuisine_weights: HashMap<Cuisine, f64>,
    #[serde(default)]
    pub vibe_weights: HashMap<Vibe, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SessionFeedback {
    pub fn is_empty(&self) -> bool {
        self.liked_ids.is_empty()
            && self.disliked_ids.is_empty()
            && self.cuisine_weights.is_empty()
            && self.vibe_weights.is_empty()
    }
}

/// Server status projection for the `config://status` resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub server: String,
    pub version: String,
    pub notion_connected: bool,
    pub google_maps_connected: bool,
    pub total_restaurants: usize,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cuisine_wire_strings_round_trip() {
        for cuisine in ALL_CUISINES {
            let json = serde_json::to_string(&cuisine).unwrap();
            assert_eq!(json, format!("\"{}\"", cuisine.as_str()));
            let back: Cuisine = serde_json::from_str(&json).unwrap();
            assert_eq!(back, cuisine);
        }
    }

    #[test]
    fn test_cuisine_parse_list_skips_unknown() {
        let parsed = Cuisine::parse_list("Italian, Pizza, Klingon, sushi");
        assert_eq!(parsed, vec![Cuisine::Italian, Cuisine::Pizza, Cuisine::Sushi]);
    }

    #[test]
    fn test_price_tier_ordering() {
        assert!(PriceTier::Budget < PriceTier::VeryExpensive);
        assert_eq!(PriceTier::Expensive.tier(), 3);
        assert_eq!(PriceTier::from_tier(2), Some(PriceTier::Moderate));
        assert_eq!(PriceTier::from_tier(5), None);
        assert_eq!(PriceTier::parse("$$$$"), Some(PriceTier::VeryExpensive));
    }

    #[test]
    fn test_price_level_mapping() {
        assert_eq!(PriceTier::from_price_level(0), PriceTier::Budget);
        assert_eq!(PriceTier::from_price_level(1), PriceTier::Budget);
        assert_eq!(PriceTier::from_price_level(2), PriceTier::Moderate);
        assert_eq!(PriceTier::from_price_level(4), PriceTier::VeryExpensive);
    }

    #[test]
    fn test_vibe_parse_multiword() {
        assert_eq!(Vibe::parse("Fine Dining"), Some(Vibe::FineDining));
        assert_eq!(Vibe::parse("sports bar"), Some(Vibe::SportsBar));
        assert_eq!(Vibe::parse("mysterious"), None);
    }

    #[test]
    fn test_occasion_unknown_falls_back() {
        assert_eq!(Occasion::parse("date night"), Occasion::DateNight);
        assert_eq!(Occasion::parse("intergalactic brunch"), Occasion::CasualDining);
    }

    #[test]
    fn test_location_display_and_coordinates() {
        let mut loc = Location::new("Austin");
        assert_eq!(loc.display(), "Austin");
        assert_eq!(loc.coordinates(), None);

        loc.state = Some("TX".to_string());
        loc.latitude = Some(30.27);
        loc.longitude = Some(-97.74);
        assert_eq!(loc.display(), "Austin, TX");
        assert_eq!(loc.coordinates(), Some((30.27, -97.74)));
    }

    #[test]
    fn test_empty_feedback_detection() {
        let feedback = SessionFeedback::default();
        assert!(feedback.is_empty());

        let feedback = SessionFeedback {
            disliked_ids: vec!["r1".to_string()],
            ..Default::default()
        };
        assert!(!feedback.is_empty());
    }
}

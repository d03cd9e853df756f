//! Profile Builder - derives a dining-preference profile from the record set.
//!
//! Pure and deterministic: identical input always yields the same profile.
//! The profile is recomputed on demand and never persisted, so there is no
//! cache to invalidate.

use crate::types::{
    Cuisine, CuisineStat, DiningProfile, PriceTier, Restaurant, Vibe,
};
use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Fallback personality when no rule matches (including an empty record set).
pub const DEFAULT_PERSONALITY: &str = "Balanced Diner";

/// Build the derived profile from the full record set.
///
/// Records without a rating are counted as restaurants but excluded from
/// every average; records without a price tier are excluded from the
/// histogram.
pub fn build_profile(records: &[Restaurant]) -> DiningProfile {
    let mut cuisine_counts: HashMap<Cuisine, u32> = HashMap::new();
    let mut cuisine_rating_sums: HashMap<Cuisine, (f64, u32)> = HashMap::new();
    let mut price_histogram = [0u32; 4];
    let mut city_counts: HashMap<String, u32> = HashMap::new();
    let mut vibe_counts: HashMap<Vibe, u32> = HashMap::new();

    let mut rating_sum = 0.0;
    let mut rating_count = 0u32;

    for record in records {
        for cuisine in &record.cuisines {
            *cuisine_counts.entry(*cuisine).or_default() += 1;
            if let Some(rating) = record.rating {
                let entry = cuisine_rating_sums.entry(*cuisine).or_insert((0.0, 0));
                entry.0 += rating;
                entry.1 += 1;
            }
        }

        if let Some(tier) = record.price_tier {
            price_histogram[(tier.tier() - 1) as usize] += 1;
        }

        *city_counts.entry(record.location.city.clone()).or_default() += 1;

        for vibe in &record.vibes {
            *vibe_counts.entry(*vibe).or_default() += 1;
        }

        if let Some(rating) = record.rating {
            rating_sum += rating;
            rating_count += 1;
        }
    }

    let cuisine_stats = cuisine_counts
        .into_iter()
        .map(|(cuisine, count)| {
            let average_rating = cuisine_rating_sums
                .get(&cuisine)
                .filter(|(_, n)| *n > 0)
                .map(|(sum, n)| sum / *n as f64);
            (cuisine, CuisineStat { count, average_rating })
        })
        .collect();

    let average_rating = if rating_count > 0 {
        Some(rating_sum / rating_count as f64)
    } else {
        None
    };

    DiningProfile {
        total_restaurants: records.len(),
        total_visits: rating_count as usize,
        average_rating,
        cuisine_stats,
        price_histogram,
        city_counts,
        vibe_counts,
        personality: personality(records, average_rating),
    }
}

/// Fixed priority rule over the aggregates. Total: always returns a label.
fn personality(records: &[Restaurant], average_rating: Option<f64>) -> String {
    if records.is_empty() {
        return DEFAULT_PERSONALITY.to_string();
    }

    let cuisine_diversity = records
        .iter()
        .flat_map(|r| r.cuisines.iter().copied())
        .collect::<HashSet<_>>()
        .len();

    let fine_dining = records
        .iter()
        .filter(|r| r.vibes.contains(&Vibe::FineDining))
        .count();

    let priced = records.iter().filter(|r| r.price_tier.is_some()).count();
    let upscale = records
        .iter()
        .filter(|r| {
            matches!(
                r.price_tier,
                Some(PriceTier::Expensive) | Some(PriceTier::VeryExpensive)
            )
        })
        .count();

    let avg = average_rating.unwrap_or(0.0);
    let total = records.len();

    let label = if cuisine_diversity > 10 && avg > 4.0 {
        "Adventurous Eater"
    } else if fine_dining as f64 > total as f64 * 0.3 {
        "Fine Dining Enthusiast"
    } else if priced > 0 && upscale as f64 > priced as f64 * 0.5 {
        "Upscale Diner"
    } else if avg > 4.2 {
        "Discerning Foodie"
    } else {
        DEFAULT_PERSONALITY
    };

    label.to_string()
}

/// Cuisines worth preferring by default: visited at least twice with an
/// average rating of 4.0 or better.
pub fn favorite_cuisines(profile: &DiningProfile) -> Vec<Cuisine> {
    let mut favorites: Vec<Cuisine> = profile
        .cuisine_stats
        .iter()
        .filter(|(_, stat)| {
            stat.count >= 2 && stat.average_rating.map_or(false, |avg| avg >= 4.0)
        })
        .map(|(cuisine, _)| *cuisine)
        .collect();
    favorites.sort();
    favorites
}

/// Vibes seen on at least two well-rated visits.
pub fn preferred_vibes(records: &[Restaurant]) -> Vec<Vibe> {
    let mut sums: HashMap<Vibe, (f64, u32)> = HashMap::new();
    for record in records {
        if let Some(rating) = record.rating {
            for vibe in &record.vibes {
                let entry = sums.entry(*vibe).or_insert((0.0, 0));
                entry.0 += rating;
                entry.1 += 1;
            }
        }
    }
    let mut preferred: Vec<Vibe> = sums
        .into_iter()
        .filter(|(_, (sum, n))| *n >= 2 && sum / *n as f64 >= 4.0)
        .map(|(vibe, _)| vibe)
        .collect();
    preferred.sort();
    preferred
}

/// Trend lines over the last 30 days relative to `today`.
pub fn recent_trends(records: &[Restaurant], today: NaiveDate) -> Vec<String> {
    let cutoff = today - Duration::days(30);
    let recent: Vec<&Restaurant> = records
        .iter()
        .filter(|r| r.date_visited.map_or(false, |d| d > cutoff))
        .collect();

    if recent.is_empty() {
        return vec!["No recent dining activity".to_string()];
    }

    let mut trends = Vec::new();

    // BTreeMap so ties resolve the same way every run.
    let mut cuisine_counts: BTreeMap<Cuisine, u32> = BTreeMap::new();
    for record in &recent {
        for cuisine in &record.cuisines {
            *cuisine_counts.entry(*cuisine).or_default() += 1;
        }
    }
    if let Some((top, _)) = cuisine_counts.iter().max_by_key(|(_, n)| **n) {
        trends.push(format!("Recently favoring {} cuisine", top.as_str()));
    }

    let ratings: Vec<f64> = recent.iter().filter_map(|r| r.rating).collect();
    if !ratings.is_empty() {
        let avg = ratings.iter().sum::<f64>() / ratings.len() as f64;
        trends.push(format!("Recent average rating: {avg:.1}"));
    }

    trends
}

/// Short observations the profile resource surfaces alongside the stats.
pub fn insights(profile: &DiningProfile) -> Vec<String> {
    let mut insights = Vec::new();

    if profile.average_rating.map_or(false, |avg| avg > 4.0) {
        insights.push("You tend to choose restaurants you really enjoy".to_string());
    }

    if favorite_cuisines(profile).len() > 5 {
        insights.push("You're an adventurous eater who enjoys diverse cuisines".to_string());
    }

    let upscale = profile.price_histogram[2] + profile.price_histogram[3];
    let priced: u32 = profile.price_histogram.iter().sum();
    if priced > 0 && upscale * 2 > priced {
        insights.push("You prefer upscale dining experiences".to_string());
    }

    insights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Location;

    fn record(
        name: &str,
        city: &str,
        cuisines: Vec<Cuisine>,
        tier: Option<PriceTier>,
        rating: Option<f64>,
    ) -> Restaurant {
        let mut r = Restaurant::new(name, Location::new(city));
        r.cuisines = cuisines;
        r.price_tier = tier;
        r.rating = rating;
        r
    }

    #[test]
    fn test_empty_input_yields_default_profile() {
        let profile = build_profile(&[]);
        assert_eq!(profile.total_restaurants, 0);
        assert_eq!(profile.total_visits, 0);
        assert_eq!(profile.average_rating, None);
        assert_eq!(profile.personality, DEFAULT_PERSONALITY);
        assert_eq!(profile.price_histogram, [0, 0, 0, 0]);
    }

    #[test]
    fn test_profile_is_deterministic() {
        let records = vec![
            record("A", "Austin", vec![Cuisine::Thai], Some(PriceTier::Moderate), Some(4.5)),
            record("B", "Austin", vec![Cuisine::Thai, Cuisine::Sushi], None, Some(3.5)),
            record("C", "Dallas", vec![Cuisine::Pizza], Some(PriceTier::Budget), None),
        ];
        let a = build_profile(&records);
        let b = build_profile(&records);
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_ratings_excluded_from_averages() {
        let records = vec![
            record("A", "Austin", vec![Cuisine::Thai], None, Some(4.0)),
            record("B", "Austin", vec![Cuisine::Thai], None, None),
        ];
        let profile = build_profile(&records);
        let stat = &profile.cuisine_stats[&Cuisine::Thai];
        assert_eq!(stat.count, 2);
        // The unrated visit must not drag the average toward zero.
        assert_eq!(stat.average_rating, Some(4.0));
        assert_eq!(profile.total_visits, 1);
    }

    #[test]
    fn test_price_histogram_skips_unpriced() {
        let records = vec![
            record("A", "Austin", vec![], Some(PriceTier::Budget), None),
            record("B", "Austin", vec![], Some(PriceTier::Budget), None),
            record("C", "Austin", vec![], Some(PriceTier::VeryExpensive), None),
            record("D", "Austin", vec![], None, None),
        ];
        let profile = build_profile(&records);
        assert_eq!(profile.price_histogram, [2, 0, 0, 1]);
    }

    #[test]
    fn test_personality_adventurous() {
        let cuisines = [
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
            Cuisine::Barbecue,
        ];
        let records: Vec<Restaurant> = cuisines
            .iter()
            .enumerate()
            .map(|(i, c)| record(&format!("R{i}"), "Austin", vec![*c], None, Some(4.5)))
            .collect();
        assert_eq!(build_profile(&records).personality, "Adventurous Eater");
    }

    #[test]
    fn test_personality_fine_dining() {
        let mut records = vec![
            record("A", "Austin", vec![Cuisine::French], None, Some(3.5)),
            record("B", "Austin", vec![Cuisine::French], None, Some(3.5)),
        ];
        records[0].vibes = vec![Vibe::FineDining];
        assert_eq!(build_profile(&records).personality, "Fine Dining Enthusiast");
    }

    #[test]
    fn test_personality_upscale() {
        let records = vec![
            record("A", "Austin", vec![], Some(PriceTier::Expensive), Some(3.0)),
            record("B", "Austin", vec![], Some(PriceTier::VeryExpensive), Some(3.0)),
            record("C", "Austin", vec![], Some(PriceTier::Budget), Some(3.0)),
        ];
        assert_eq!(build_profile(&records).personality, "Upscale Diner");
    }

    #[test]
    fn test_personality_fallback() {
        let records = vec![record("A", "Austin", vec![Cuisine::Pizza], None, Some(3.0))];
        assert_eq!(build_profile(&records).personality, DEFAULT_PERSONALITY);
    }

    #[test]
    fn test_favorite_cuisines_threshold() {
        let records = vec![
            record("A", "Austin", vec![Cuisine::Thai], None, Some(4.5)),
            record("B", "Austin", vec![Cuisine::Thai], None, Some(4.0)),
            // Sushi rated once: not enough visits.
            record("C", "Austin", vec![Cuisine::Sushi], None, Some(5.0)),
            // Pizza visited twice but poorly rated.
            record("D", "Austin", vec![Cuisine::Pizza], None, Some(2.0)),
            record("E", "Austin", vec![Cuisine::Pizza], None, Some(3.0)),
        ];
        let profile = build_profile(&records);
        assert_eq!(favorite_cuisines(&profile), vec![Cuisine::Thai]);
    }

    #[test]
    fn test_recent_trends_window() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
        let mut recent = record("A", "Austin", vec![Cuisine::Thai], None, Some(4.0));
        recent.date_visited = NaiveDate::from_ymd_opt(2026, 8, 20);
        let mut stale = record("B", "Austin", vec![Cuisine::Pizza], None, Some(5.0));
        stale.date_visited = NaiveDate::from_ymd_opt(2026, 1, 5);

        let trends = recent_trends(&[recent, stale], today);
        assert!(trends.iter().any(|t| t.contains("Thai")));
        assert!(!trends.iter().any(|t| t.contains("Pizza")));
    }

    #[test]
    fn test_recent_trends_empty() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
        let trends = recent_trends(&[], today);
        assert_eq!(trends, vec!["No recent dining activity".to_string()]);
    }
}

//! Recommendation engine: pure filtering, scoring, and ranking.
//!
//! Every score is a weighted sum of five components, each normalized to
//! [0, 1] before weighting, so a total score always lands in [0, 1] and the
//! breakdown explains exactly where it came from. No I/O happens here; the
//! candidate pool arrives fully loaded.

use crate::types::{
    Cuisine, Location, Occasion, Preferences, Recommendation, RecommendationRequest, Restaurant,
    ScoreBreakdown, Vibe,
};
use std::collections::HashMap;

pub const CUISINE_WEIGHT: f64 = 0.30;
pub const PRICE_WEIGHT: f64 = 0.15;
pub const DISTANCE_WEIGHT: f64 = 0.20;
pub const RATING_WEIGHT: f64 = 0.20;
pub const VIBE_WEIGHT: f64 = 0.15;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two coordinate pairs.
pub fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Vibes that fit an occasion. Each listed vibe gets +1.0 of effective weight
/// on top of whatever the caller asked for.
pub fn occasion_vibe_boosts(occasion: Occasion) -> &'static [Vibe] {
    match occasion {
        Occasion::DateNight => &[Vibe::Romantic, Vibe::FineDining],
        Occasion::BusinessLunch => &[Vibe::Business, Vibe::Quiet],
        Occasion::FamilyDinner => &[Vibe::FamilyFriendly, Vibe::Casual],
        Occasion::Celebration => &[Vibe::FineDining, Vibe::Trendy],
        Occasion::QuickBite => &[Vibe::CounterService, Vibe::Casual],
        Occasion::WeekendBrunch => &[Vibe::Brunch, Vibe::Casual],
        Occasion::HappyHour => &[Vibe::SportsBar, Vibe::Lively],
        Occasion::LateNight => &[Vibe::LateNight, Vibe::Casual],
        Occasion::Takeout => &[Vibe::CounterService, Vibe::Casual],
        Occasion::CasualDining => &[Vibe::Casual],
    }
}

/// Rank candidates for one request. Pure: the same pool and request always
/// produce the same ordered result.
pub fn recommend(pool: &[Restaurant], request: &RecommendationRequest) -> Vec<Recommendation> {
    let effective_vibes = effective_vibe_weights(request);

    let mut scored: Vec<Recommendation> = pool
        .iter()
        .filter(|r| passes_filters(r, request))
        .filter_map(|r| score_candidate(r, request, &effective_vibes))
        .collect();

    // Total order: score desc, then rating desc (unrated last), then name.
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let ra = a.restaurant.rating.unwrap_or(f64::NEG_INFINITY);
                let rb = b.restaurant.rating.unwrap_or(f64::NEG_INFINITY);
                rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.restaurant.name.cmp(&b.restaurant.name))
    });

    scored.truncate(request.max_results);
    scored
}

fn effective_vibe_weights(request: &RecommendationRequest) -> Vec<(Vibe, f64)> {
    let mut weights: Vec<(Vibe, f64)> = request
        .preferences
        .vibe_weights
        .iter()
        .map(|(v, w)| (*v, *w))
        .collect();
    if let Some(occasion) = request.occasion {
        for vibe in occasion_vibe_boosts(occasion) {
            match weights.iter_mut().find(|(v, _)| v == vibe) {
                Some(entry) => entry.1 += 1.0,
                None => weights.push((*vibe, 1.0)),
            }
        }
    }
    weights
}

fn passes_filters(restaurant: &Restaurant, request: &RecommendationRequest) -> bool {
    if request.exclude_visited && restaurant.is_visited() {
        return false;
    }
    if !request.include_wishlist && restaurant.wishlist && !restaurant.is_visited() {
        return false;
    }
    // Without target coordinates the search is city-scoped: a candidate in
    // another city (or another state when both sides name one) is out.
    if request.target.coordinates().is_none()
        && !location_matches(&restaurant.location, &request.target)
    {
        return false;
    }
    true
}

fn location_matches(candidate: &Location, target: &Location) -> bool {
    if !candidate.city.eq_ignore_ascii_case(&target.city) {
        return false;
    }
    match (&candidate.state, &target.state) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => true,
    }
}

/// Score one candidate, or drop it when it lies outside the distance bound.
fn score_candidate(
    restaurant: &Restaurant,
    request: &RecommendationRequest,
    effective_vibes: &[(Vibe, f64)],
) -> Option<Recommendation> {
    // Distance: haversine when both sides have coordinates. A candidate
    // without coordinates under a coordinate target stays in but counts as
    // maximally far; without target coordinates the city filter already ran,
    // so the candidate is local.
    let (distance_km, distance_penalty) =
        match (restaurant.location.coordinates(), request.target.coordinates()) {
            (Some(a), Some(b)) => {
                let d = haversine_km(a, b);
                if d > request.max_distance_km {
                    return None;
                }
                let component = if request.max_distance_km > 0.0 {
                    (1.0 - d / request.max_distance_km).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                (Some(d), component)
            }
            (None, Some(_)) => (None, 0.0),
            _ => (Some(0.0), 1.0),
        };

    let breakdown = ScoreBreakdown {
        cuisine_match: cuisine_component(&restaurant.cuisines, &request.preferences.cuisine_weights),
        price_match: price_component(restaurant, &request.preferences),
        distance_penalty,
        rating_bonus: rating_component(restaurant.rating),
        vibe_match: vibe_component(&restaurant.vibes, effective_vibes),
    };

    let score = CUISINE_WEIGHT * breakdown.cuisine_match
        + PRICE_WEIGHT * breakdown.price_match
        + DISTANCE_WEIGHT * breakdown.distance_penalty
        + RATING_WEIGHT * breakdown.rating_bonus
        + VIBE_WEIGHT * breakdown.vibe_match;

    let cuisine_requested = request
        .preferences
        .cuisine_weights
        .values()
        .any(|w| *w > 0.0);
    Some(Recommendation {
        restaurant: restaurant.clone(),
        score,
        breakdown,
        distance_km,
        reasoning: reasoning(restaurant, &breakdown, distance_km, cuisine_requested),
    })
}

/// Fraction of requested cuisines the candidate carries, weighted by the
/// request's per-cuisine weights (all 1.0 on a plain request, so this is the
/// plain fraction of requested tags present). Nothing requested scores 1.0;
/// matched negative weights from session dislikes pull the component down.
fn cuisine_component(cuisines: &[Cuisine], weights: &HashMap<Cuisine, f64>) -> f64 {
    tag_fraction(weights.iter().map(|(c, w)| (cuisines.contains(c), *w)))
}

fn tag_fraction(tags: impl Iterator<Item = (bool, f64)>) -> f64 {
    let mut wanted = 0.0;
    let mut matched = 0.0;
    for (present, weight) in tags {
        if weight > 0.0 {
            wanted += weight;
            if present {
                matched += weight;
            }
        } else if present {
            matched += weight;
        }
    }
    if wanted <= 0.0 {
        return 1.0;
    }
    (matched / wanted).clamp(0.0, 1.0)
}

/// 1.0 at or under the cap, decaying by a third per tier over. A candidate
/// with no known tier is not penalized.
fn price_component(restaurant: &Restaurant, prefs: &Preferences) -> f64 {
    let (Some(max_tier), Some(tier)) = (prefs.max_price_tier, restaurant.price_tier) else {
        return 1.0;
    };
    let over = tier.tier().saturating_sub(max_tier.tier()) as f64;
    (1.0 - over / 3.0).max(0.0)
}

/// Rating normalized onto [0, 1]. An unrated candidate earns no bonus.
fn rating_component(rating: Option<f64>) -> f64 {
    match rating {
        Some(r) => (r / 5.0).clamp(0.0, 1.0),
        None => 0.0,
    }
}

/// Weighted fraction of the effective vibes (request weights plus occasion
/// boosts) the candidate carries. 1.0 when none are in play.
fn vibe_component(vibes: &[Vibe], effective: &[(Vibe, f64)]) -> f64 {
    tag_fraction(effective.iter().map(|(v, w)| (vibes.contains(v), *w)))
}

/// Human-readable justification assembled from the strongest components.
fn reasoning(
    restaurant: &Restaurant,
    breakdown: &ScoreBreakdown,
    distance_km: Option<f64>,
    cuisine_requested: bool,
) -> String {
    let mut parts = Vec::new();

    if cuisine_requested && breakdown.cuisine_match >= 0.99 && !restaurant.cuisines.is_empty() {
        let names: Vec<&str> = restaurant.cuisines.iter().map(|c| c.as_str()).collect();
        parts.push(format!("matches your taste for {}", names.join("/")));
    }
    if let Some(rating) = restaurant.rating {
        if rating >= 4.0 {
            parts.push(format!("you rated it {rating:.1}/5"));
        }
    }
    if let Some(d) = distance_km {
        if d < 2.0 {
            parts.push("very close by".to_string());
        } else if breakdown.distance_penalty > 0.5 {
            parts.push(format!("{d:.1} km away"));
        }
    }
    if breakdown.vibe_match >= 0.99 && !restaurant.vibes.is_empty() {
        parts.push("the vibe fits".to_string());
    }
    if restaurant.wishlist && !restaurant.is_visited() {
        parts.push("on your wishlist".to_string());
    }

    if parts.is_empty() {
        format!("A solid option in {}", restaurant.location.display())
    } else {
        let mut s = parts.join(", ");
        if let Some(first) = s.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        s
    }
}

/// How alike two restaurants are: shared cuisine 0.4, same price tier 0.3,
/// shared vibe 0.3.
pub fn similarity(a: &Restaurant, b: &Restaurant) -> f64 {
    let mut score = 0.0;
    if a.cuisines.iter().any(|c| b.cuisines.contains(c)) {
        score += 0.4;
    }
    if let (Some(pa), Some(pb)) = (a.price_tier, b.price_tier) {
        if pa == pb {
            score += 0.3;
        }
    }
    if a.vibes.iter().any(|v| b.vibes.contains(v)) {
        score += 0.3;
    }
    score
}

/// Minimum [`similarity`] for a candidate to count as "similar".
pub const SIMILARITY_THRESHOLD: f64 = 0.3;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PriceTier;

    fn restaurant(name: &str, city: &str) -> Restaurant {
        Restaurant::new(name, Location::new(city))
    }

    fn nyc_request() -> RecommendationRequest {
        RecommendationRequest::new(Location::new("New York"))
    }

    #[test]
    fn test_haversine_known_distance() {
        // JFK to LAX is roughly 3974 km.
        let jfk = (40.6413, -73.7781);
        let lax = (33.9416, -118.4085);
        let d = haversine_km(jfk, lax);
        assert!((d - 3974.0).abs() < 40.0, "got {d}");
    }

    #[test]
    fn test_haversine_zero_for_same_point() {
        let p = (30.2672, -97.7431);
        assert!(haversine_km(p, p).abs() < 1e-9);
    }

    #[test]
    fn test_results_bounded_and_sorted() {
        let mut pool = Vec::new();
        for i in 0..20 {
            let mut r = restaurant(&format!("R{i:02}"), "New York");
            r.rating = Some(1.0 + (i % 5) as f64);
            pool.push(r);
        }
        let mut request = nyc_request();
        request.max_results = 5;

        let results = recommend(&pool, &request);
        assert_eq!(results.len(), 5);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_distance_bound_excludes_far_candidates() {
        let mut near = restaurant("Near", "New York");
        near.location.latitude = Some(40.7130);
        near.location.longitude = Some(-74.0060);
        let mut far = restaurant("Far", "Boston");
        far.location.latitude = Some(42.3601);
        far.location.longitude = Some(-71.0589);

        let mut request = nyc_request();
        request.target.latitude = Some(40.7128);
        request.target.longitude = Some(-74.0060);
        request.max_distance_km = 25.0;

        let results = recommend(&[near, far], &request);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].restaurant.name, "Near");
        assert!(results[0].distance_km.unwrap() <= 25.0);
    }

    #[test]
    fn test_city_mismatch_excluded_without_coordinates() {
        let local = restaurant("Local", "New York");
        let elsewhere = restaurant("Elsewhere", "Chicago");

        let results = recommend(&[local, elsewhere], &nyc_request());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].restaurant.name, "Local");
        assert_eq!(results[0].breakdown.distance_penalty, 1.0);
        assert_eq!(results[0].distance_km, Some(0.0));
    }

    #[test]
    fn test_state_mismatch_excluded_without_coordinates() {
        let mut maine = restaurant("Maine Spot", "Portland");
        maine.location.state = Some("ME".to_string());
        let mut oregon = restaurant("Oregon Spot", "Portland");
        oregon.location.state = Some("OR".to_string());
        let unstated = restaurant("Unstated Spot", "Portland");

        let mut request = RecommendationRequest::new(Location::new("Portland"));
        request.target.state = Some("OR".to_string());

        let results = recommend(&[maine, oregon, unstated], &request);
        let names: Vec<&str> = results.iter().map(|r| r.restaurant.name.as_str()).collect();
        assert!(!names.contains(&"Maine Spot"));
        assert!(names.contains(&"Oregon Spot"));
        // A candidate without a state still matches on city alone.
        assert!(names.contains(&"Unstated Spot"));
    }

    #[test]
    fn test_missing_coordinates_count_as_far_under_coordinate_target() {
        let mut located = restaurant("Located", "New York");
        located.location.latitude = Some(40.7130);
        located.location.longitude = Some(-74.0060);
        let unlocated = restaurant("Unlocated", "New York");

        let mut request = nyc_request();
        request.target.latitude = Some(40.7128);
        request.target.longitude = Some(-74.0060);

        let results = recommend(&[located, unlocated], &request);
        assert_eq!(results.len(), 2);
        let unlocated_score = results
            .iter()
            .find(|r| r.restaurant.name == "Unlocated")
            .unwrap();
        // Retained, but with no distance credit at all.
        assert_eq!(unlocated_score.breakdown.distance_penalty, 0.0);
        assert_eq!(unlocated_score.distance_km, None);
        assert_eq!(results[0].restaurant.name, "Located");
    }

    #[test]
    fn test_joes_pizza_scenario() {
        let mut joes = restaurant("Joe's Pizza", "New York");
        joes.cuisines = vec![Cuisine::Italian, Cuisine::Pizza];
        joes.price_tier = Some(PriceTier::Moderate);
        joes.rating = Some(4.5);

        let mut request = nyc_request();
        request.preferences.cuisine_weights.insert(Cuisine::Pizza, 1.0);

        let results = recommend(&[joes], &request);
        assert_eq!(results.len(), 1);
        let top = &results[0];
        assert_eq!(top.restaurant.name, "Joe's Pizza");
        assert_eq!(top.breakdown.cuisine_match, 1.0);
        assert!((top.breakdown.rating_bonus - 0.9).abs() < 1e-9);
        assert!(top.score > 0.0 && top.score <= 1.0);
        assert!(!top.reasoning.is_empty());
    }

    #[test]
    fn test_price_over_cap_decays_instead_of_filtering() {
        let mut cheap = restaurant("Cheap", "New York");
        cheap.price_tier = Some(PriceTier::Budget);
        let mut pricey = restaurant("Pricey", "New York");
        pricey.price_tier = Some(PriceTier::VeryExpensive);
        let unknown = restaurant("Unknown", "New York");

        let mut request = nyc_request();
        request.preferences.max_price_tier = Some(PriceTier::Moderate);

        let results = recommend(&[cheap, pricey, unknown], &request);
        assert_eq!(results.len(), 3);

        let price_of = |name: &str| {
            results
                .iter()
                .find(|r| r.restaurant.name == name)
                .unwrap()
                .breakdown
                .price_match
        };
        assert_eq!(price_of("Cheap"), 1.0);
        assert_eq!(price_of("Unknown"), 1.0);
        // Two tiers over the cap: 1 - 2/3.
        assert!((price_of("Pricey") - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_component_fractions_and_defaults() {
        let mut r = restaurant("Half Match", "New York");
        r.cuisines = vec![Cuisine::Thai];
        r.vibes = vec![Vibe::Casual];

        let mut request = nyc_request();
        request.preferences.cuisine_weights.insert(Cuisine::Thai, 1.0);
        request.preferences.cuisine_weights.insert(Cuisine::Mexican, 1.0);

        let results = recommend(&[r.clone()], &request);
        let breakdown = &results[0].breakdown;
        // One of two requested cuisines present.
        assert!((breakdown.cuisine_match - 0.5).abs() < 1e-9);
        // Nothing requested on the vibe axis: full credit.
        assert_eq!(breakdown.vibe_match, 1.0);
        // Unrated earns no rating bonus.
        assert_eq!(breakdown.rating_bonus, 0.0);

        // No cuisines requested at all: full credit there too.
        let plain = recommend(&[r], &nyc_request());
        assert_eq!(plain[0].breakdown.cuisine_match, 1.0);

        assert!((rating_component(Some(4.0)) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_exclude_visited() {
        let mut visited = restaurant("Visited", "New York");
        visited.rating = Some(4.0);
        let fresh = restaurant("Fresh", "New York");

        let mut request = nyc_request();
        request.exclude_visited = true;

        let results = recommend(&[visited, fresh], &request);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].restaurant.name, "Fresh");
    }

    #[test]
    fn test_occasion_boosts_matching_vibe() {
        let mut romantic = restaurant("Romantic Spot", "New York");
        romantic.vibes = vec![Vibe::Romantic];
        let mut sports = restaurant("Sports Spot", "New York");
        sports.vibes = vec![Vibe::SportsBar];

        let mut request = nyc_request();
        request.occasion = Some(Occasion::DateNight);

        let results = recommend(&[romantic, sports], &request);
        assert_eq!(results[0].restaurant.name, "Romantic Spot");
        assert!(results[0].breakdown.vibe_match > results[1].breakdown.vibe_match);
    }

    #[test]
    fn test_deterministic_tiebreak_by_name() {
        let pool = vec![restaurant("Beta", "New York"), restaurant("Alpha", "New York")];
        let results = recommend(&pool, &nyc_request());
        assert_eq!(results[0].restaurant.name, "Alpha");
        assert_eq!(results[1].restaurant.name, "Beta");
    }

    #[test]
    fn test_scores_stay_in_unit_interval() {
        let mut r = restaurant("Max", "New York");
        r.cuisines = vec![Cuisine::Thai];
        r.vibes = vec![Vibe::Casual];
        r.rating = Some(5.0);

        let mut request = nyc_request();
        request.preferences.cuisine_weights.insert(Cuisine::Thai, 4.0);
        request.preferences.vibe_weights.insert(Vibe::Casual, 4.0);

        let results = recommend(&[r], &request);
        assert!(results[0].score <= 1.0);
        assert!(results[0].score >= 0.0);
    }

    #[test]
    fn test_similarity_components() {
        let mut a = restaurant("A", "Austin");
        a.cuisines = vec![Cuisine::Thai];
        a.price_tier = Some(PriceTier::Moderate);
        a.vibes = vec![Vibe::Casual];

        let mut b = restaurant("B", "Austin");
        b.cuisines = vec![Cuisine::Thai];
        b.price_tier = Some(PriceTier::Moderate);
        b.vibes = vec![Vibe::Casual];
        assert!((similarity(&a, &b) - 1.0).abs() < 1e-9);

        b.cuisines = vec![Cuisine::Pizza];
        b.price_tier = Some(PriceTier::Budget);
        assert!((similarity(&a, &b) - 0.3).abs() < 1e-9);

        b.vibes = vec![Vibe::Quiet];
        assert!(similarity(&a, &b) < SIMILARITY_THRESHOLD);
    }
}

//! MCP tool and resource surface for the Picky server.
//!
//! Tool schemas live here as plain JSON values; `call_tool` deserializes the
//! arguments into the typed parameter structs and hands off to the manager.
//! Rendering stays in this module so the manager returns domain values, not
//! display strings.

use crate::error::{PickyError, Result};
use crate::manager::{
    AddVisitParams, FindSimilarParams, RecommendationParams, RestaurantManager,
    SessionFeedbackParams, StartSessionParams,
};
use crate::sync;
use crate::types::{Recommendation, Restaurant};
use serde_json::{json, Value};

// ============================================================================
// TOOL DEFINITIONS
// ============================================================================

pub fn get_tools() -> Vec<Value> {
    vec![
        json!({
            "name": "get_restaurant_recommendations",
            "description": "Get personalized restaurant recommendations near a location. Combines your visit history and wishlist with nearby discoveries, scored by cuisine match, price fit, distance, your past ratings, and occasion-appropriate vibes. Every result includes a score breakdown and plain-language reasoning.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "city": { "type": "string", "description": "City to search in" },
                    "state": { "type": "string", "description": "State or region (optional)" },
                    "latitude": { "type": "number", "description": "Latitude for precise search (optional)" },
                    "longitude": { "type": "number", "description": "Longitude for precise search (optional)" },
                    "occasion": {
                        "type": "string",
                        "description": "Dining occasion: casual dining, date night, business lunch, family dinner, celebration, quick bite, weekend brunch, happy hour, late night, takeout"
                    },
                    "cuisine_preferences": { "type": "string", "description": "Comma-separated cuisines to prefer (e.g. 'Thai, Sushi')" },
                    "max_distance_km": { "type": "number", "description": "Maximum distance in kilometers (defaults to the configured search radius)" },
                    "max_results": { "type": "integer", "description": "Maximum results to return (default 10)" },
                    "exclude_visited": { "type": "boolean", "description": "Only suggest places you have not rated yet" }
                },
                "required": ["city"]
            }
        }),
        json!({
            "name": "add_restaurant_visit",
            "description": "Record a restaurant visit (or wishlist entry) in your database. Re-adding a known restaurant updates it instead of duplicating. The record is enriched with place data (coordinates, price level, cuisine tags) when the places API can find it.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "restaurant_name": { "type": "string", "description": "Name of the restaurant" },
                    "city": { "type": "string", "description": "City where it is located" },
                    "state": { "type": "string", "description": "State or region (optional)" },
                    "rating": { "type": "number", "description": "Your rating, 1.0 to 5.0" },
                    "cuisine_types": { "type": "string", "description": "Comma-separated cuisines" },
                    "price_range": { "type": "string", "description": "Price range: $, $$, $$$, or $$$$" },
                    "vibes": { "type": "string", "description": "Comma-separated vibes (e.g. 'cozy, date night')" },
                    "notes": { "type": "string", "description": "Personal notes" },
                    "date_visited": { "type": "string", "description": "Visit date, YYYY-MM-DD" },
                    "wishlist": { "type": "boolean", "description": "Save as a wishlist entry instead of a visit" }
                },
                "required": ["restaurant_name", "city"]
            }
        }),
        json!({
            "name": "update_restaurant_rating",
            "description": "Update your rating (and optionally notes) for a restaurant already in the database.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "restaurant_name": { "type": "string", "description": "Name of the restaurant to update" },
                    "new_rating": { "type": "number", "description": "New rating, 1.0 to 5.0" },
                    "notes": { "type": "string", "description": "Replacement notes (optional)" }
                },
                "required": ["restaurant_name", "new_rating"]
            }
        }),
        json!({
            "name": "analyze_dining_patterns",
            "description": "Analyze your dining history: cuisine and price breakdowns, favorite cuisines, preferred vibes, recent trends, your dining personality, and insight summaries.",
            "inputSchema": { "type": "object", "properties": {} }
        }),
        json!({
            "name": "find_similar_restaurants",
            "description": "Find restaurants in your database similar to one you enjoyed, matched on shared cuisines, price tier, and vibes.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "restaurant_name": { "type": "string", "description": "Reference restaurant name" },
                    "max_results": { "type": "integer", "description": "Maximum matches to return (default 5)" }
                },
                "required": ["restaurant_name"]
            }
        }),
        json!({
            "name": "enrich_restaurant_database",
            "description": "Backfill place data (coordinates, price levels, cuisine tags) for database records that have none yet.",
            "inputSchema": { "type": "object", "properties": {} }
        }),
        json!({
            "name": "start_interactive_session",
            "description": "Start an interactive recommendation session. Returns a session id and an initial ranking; use provide_session_feedback to refine it round by round. Sessions expire after a period of inactivity.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "city": { "type": "string", "description": "City to search in" },
                    "state": { "type": "string", "description": "State or region (optional)" },
                    "occasion": { "type": "string", "description": "Dining occasion" },
                    "max_distance_km": { "type": "number", "description": "Maximum distance in kilometers (defaults to the configured search radius)" }
                },
                "required": ["city"]
            }
        }),
        json!({
            "name": "provide_session_feedback",
            "description": "Refine a session's recommendations with likes, dislikes, and preference hints. Disliked restaurants never reappear in that session; liked ones boost their cuisines and vibes. Returns the re-ranked list.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "session_id": { "type": "string", "description": "Session id from start_interactive_session" },
                    "liked_restaurant_ids": { "type": "string", "description": "Comma-separated ids you liked" },
                    "disliked_restaurant_ids": { "type": "string", "description": "Comma-separated ids to exclude" },
                    "cuisine_preferences": { "type": "string", "description": "Comma-separated cuisines to boost" },
                    "vibe_preferences": { "type": "string", "description": "Comma-separated vibes to boost" },
                    "additional_notes": { "type": "string", "description": "Free-form notes" }
                },
                "required": ["session_id"]
            }
        }),
        json!({
            "name": "get_session_recommendations",
            "description": "Get the current ranking for an active session without giving new feedback.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "session_id": { "type": "string", "description": "Session id" }
                },
                "required": ["session_id"]
            }
        }),
        json!({
            "name": "end_interactive_session",
            "description": "End an interactive session and discard its learned preferences.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "session_id": { "type": "string", "description": "Session id" }
                },
                "required": ["session_id"]
            }
        }),
        json!({
            "name": "sync_database",
            "description": "Run a full maintenance pass now: reload the database and enrich records missing place data. Reports counts and timing.",
            "inputSchema": { "type": "object", "properties": {} }
        }),
        json!({
            "name": "test_connections",
            "description": "Check connectivity to the restaurant database and the places API, reporting per-service results.",
            "inputSchema": { "type": "object", "properties": {} }
        }),
    ]
}

pub fn get_resources() -> Vec<Value> {
    vec![
        json!({
            "uri": "config://status",
            "name": "Server status",
            "description": "Server version, upstream connectivity, and record counts",
            "mimeType": "application/json"
        }),
        json!({
            "uri": "profile://dining-preferences",
            "name": "Dining profile",
            "description": "Derived dining-preference profile with personality and insights",
            "mimeType": "application/json"
        }),
        json!({
            "uri": "restaurants://recent-visits",
            "name": "Recent visits",
            "description": "Most recently visited restaurants, newest first",
            "mimeType": "application/json"
        }),
        json!({
            "uri": "restaurants://favorites",
            "name": "Favorites",
            "description": "Restaurants rated 4.0 or higher",
            "mimeType": "application/json"
        }),
        json!({
            "uri": "restaurants://wishlist",
            "name": "Wishlist",
            "description": "Restaurants saved to try",
            "mimeType": "application/json"
        }),
        json!({
            "uri": "restaurants://database",
            "name": "Full database",
            "description": "Every restaurant record",
            "mimeType": "application/json"
        }),
    ]
}

// ============================================================================
// DISPATCH
// ============================================================================

pub async fn call_tool(manager: &RestaurantManager, name: &str, args: Value) -> Result<Value> {
    match name {
        "get_restaurant_recommendations" => {
            let params: RecommendationParams = parse_args(args)?;
            let recs = manager.get_recommendations(params).await?;
            Ok(render_recommendations(&recs))
        }
        "add_restaurant_visit" => {
            let params: AddVisitParams = parse_args(args)?;
            let saved = manager.add_visit(params).await?;
            Ok(json!({
                "saved": render_restaurant(&saved),
                "message": format!("Recorded '{}'", saved.name),
            }))
        }
        "update_restaurant_rating" => {
            let params = parse_args(args)?;
            let updated = manager.update_rating(params).await?;
            Ok(json!({
                "updated": render_restaurant(&updated),
                "message": format!("Updated rating for '{}'", updated.name),
            }))
        }
        "analyze_dining_patterns" => manager.analyze_patterns().await,
        "find_similar_restaurants" => {
            let params: FindSimilarParams = parse_args(args)?;
            let reference = params.restaurant_name.clone();
            let similar = manager.find_similar(params).await?;
            let rendered: Vec<Value> = similar
                .iter()
                .map(|(r, score)| {
                    let mut v = render_restaurant(r);
                    v["similarity"] = json!(round2(*score));
                    v
                })
                .collect();
            Ok(json!({ "reference": reference, "similar": rendered }))
        }
        "enrich_restaurant_database" => manager.enrich_database().await,
        "start_interactive_session" => {
            let params: StartSessionParams = parse_args(args)?;
            let (session_id, initial) = manager.start_session(params).await?;
            Ok(json!({
                "session_id": session_id,
                "recommendations": render_recommendations(&initial)["recommendations"],
                "message": "Session started. Use provide_session_feedback to refine.",
            }))
        }
        "provide_session_feedback" => {
            let params: SessionFeedbackParams = parse_args(args)?;
            let (rounds, ranked) = manager.session_feedback(params)?;
            Ok(json!({
                "rounds": rounds,
                "recommendations": render_recommendations(&ranked)["recommendations"],
            }))
        }
        "get_session_recommendations" => {
            let session_id = required_str(&args, "session_id")?;
            let ranked = manager.session_recommendations(&session_id)?;
            Ok(render_recommendations(&ranked))
        }
        "end_interactive_session" => {
            let session_id = required_str(&args, "session_id")?;
            let ended = manager.end_session(&session_id);
            Ok(json!({ "ended": ended }))
        }
        "sync_database" => sync::manual_sync(manager).await,
        "test_connections" => Ok(manager.test_connections().await),
        other => Err(PickyError::Validation(format!("unknown tool: {other}"))),
    }
}

pub async fn read_resource(manager: &RestaurantManager, uri: &str) -> Result<Value> {
    match uri {
        "config://status" => {
            let status = manager.status().await;
            let mut value = serde_json::to_value(status)
                .map_err(|e| PickyError::Validation(e.to_string()))?;
            value["settings"] = manager.settings().summary();
            Ok(value)
        }
        "profile://dining-preferences" => manager.dining_profile().await,
        "restaurants://recent-visits" => {
            let visits = manager.recent_visits(10).await?;
            Ok(json!({ "recent_visits": render_restaurants(&visits) }))
        }
        "restaurants://favorites" => {
            let favorites = manager.favorites(4.0, 20).await?;
            Ok(json!({ "favorites": render_restaurants(&favorites) }))
        }
        "restaurants://wishlist" => {
            let wishlist = manager.wishlist().await?;
            Ok(json!({ "wishlist": render_restaurants(&wishlist) }))
        }
        "restaurants://database" => {
            let records = manager.database_snapshot().await?;
            Ok(json!({
                "total": records.len(),
                "restaurants": render_restaurants(&records),
            }))
        }
        other => Err(PickyError::NotFound(format!("resource {other}"))),
    }
}

// ============================================================================
// RENDERING
// ============================================================================

fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T> {
    serde_json::from_value(args).map_err(|e| PickyError::Validation(e.to_string()))
}

fn required_str(args: &Value, key: &str) -> Result<String> {
    args[key]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(String::from)
        .ok_or_else(|| PickyError::Validation(format!("{key} is required")))
}

fn render_recommendations(recs: &[Recommendation]) -> Value {
    let rendered: Vec<Value> = recs
        .iter()
        .map(|rec| {
            let mut v = render_restaurant(&rec.restaurant);
            v["score"] = json!(round2(rec.score));
            v["reasoning"] = json!(rec.reasoning);
            v["breakdown"] = json!({
                "cuisine_match": round2(rec.breakdown.cuisine_match),
                "price_match": round2(rec.breakdown.price_match),
                "distance": round2(rec.breakdown.distance_penalty),
                "rating": round2(rec.breakdown.rating_bonus),
                "vibe_match": round2(rec.breakdown.vibe_match),
            });
            if let Some(d) = rec.distance_km {
                v["distance_km"] = json!(round2(d));
            }
            v
        })
        .collect();
    json!({ "count": rendered.len(), "recommendations": rendered })
}

fn render_restaurants(records: &[Restaurant]) -> Vec<Value> {
    records.iter().map(render_restaurant).collect()
}

fn render_restaurant(r: &Restaurant) -> Value {
    let mut v = json!({
        "name": r.name,
        "location": r.location.display(),
        "cuisines": r.cuisines.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
        "vibes": r.vibes.iter().map(|x| x.as_str()).collect::<Vec<_>>(),
        "wishlist": r.wishlist,
    });
    if let Some(id) = &r.id {
        v["id"] = json!(id);
    }
    if let Some(tier) = r.price_tier {
        v["price_range"] = json!(tier.symbol());
    }
    if let Some(rating) = r.rating {
        v["rating"] = json!(rating);
    }
    if let Some(date) = r.date_visited {
        v["date_visited"] = json!(date.to_string());
    }
    if let Some(notes) = &r.notes {
        v["notes"] = json!(notes);
    }
    v
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Cuisine, Location, PriceTier, ScoreBreakdown};

    #[test]
    fn test_tool_schemas_are_well_formed() {
        let tools = get_tools();
        assert_eq!(tools.len(), 12);
        for tool in &tools {
            assert!(tool["name"].is_string());
            assert!(tool["description"].is_string());
            assert_eq!(tool["inputSchema"]["type"], "object");
        }
    }

    #[test]
    fn test_tool_names_are_unique() {
        let tools = get_tools();
        let mut names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
        names.sort_unstable();
        let before = names.len();
        names.dedup();
        assert_eq!(before, names.len());
    }

    #[test]
    fn test_resources_cover_known_uris() {
        let resources = get_resources();
        let uris: Vec<&str> = resources.iter().filter_map(|r| r["uri"].as_str()).collect();
        for expected in [
            "config://status",
            "profile://dining-preferences",
            "restaurants://recent-visits",
            "restaurants://favorites",
            "restaurants://wishlist",
            "restaurants://database",
        ] {
            assert!(uris.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn test_render_recommendation_shape() {
        let mut r = Restaurant::new("Joe's Pizza", Location::new("New York"));
        r.cuisines = vec![Cuisine::Pizza];
        r.price_tier = Some(PriceTier::Moderate);
        r.rating = Some(4.5);
        let rec = Recommendation {
            restaurant: r,
            score: 0.876,
            breakdown: ScoreBreakdown {
                cuisine_match: 1.0,
                price_match: 1.0,
                distance_penalty: 1.0,
                rating_bonus: 0.9,
                vibe_match: 0.5,
            },
            distance_km: Some(1.234),
            reasoning: "Matches your taste for Pizza".to_string(),
        };
        let rendered = render_recommendations(&[rec]);
        assert_eq!(rendered["count"], 1);
        let first = &rendered["recommendations"][0];
        assert_eq!(first["name"], "Joe's Pizza");
        assert_eq!(first["score"], 0.88);
        assert_eq!(first["distance_km"], 1.23);
        assert_eq!(first["breakdown"]["cuisine_match"], 1.0);
    }

    #[test]
    fn test_required_str_rejects_blank() {
        assert!(required_str(&json!({ "session_id": " " }), "session_id").is_err());
        assert_eq!(
            required_str(&json!({ "session_id": "abc" }), "session_id").unwrap(),
            "abc"
        );
    }
}

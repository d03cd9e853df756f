//! Orchestration layer tying the store, places API, profile builder,
//! recommendation engine, and session registry together. One method per
//! tool; the MCP layer only deserializes parameters and renders results.

use crate::config::Settings;
use crate::error::{PickyError, Result};
use crate::places::MapsClient;
use crate::profile;
use crate::recommend::{self, SIMILARITY_THRESHOLD};
use crate::session::SessionRegistry;
use crate::store::NotionStore;
use crate::types::{
    Cuisine, Location, Occasion, Preferences, PriceTier, Recommendation, RecommendationRequest,
    Restaurant, SessionFeedback, SystemStatus, Vibe,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 5.0;

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationParams {
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub occasion: Option<String>,
    #[serde(default)]
    pub cuisine_preferences: Option<String>,
    #[serde(default)]
    pub max_distance_km: Option<f64>,
    #[serde(default = "default_results")]
    pub max_results: usize,
    #[serde(default)]
    pub exclude_visited: bool,
}

fn default_results() -> usize {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddVisitParams {
    pub restaurant_name: String,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub cuisine_types: Option<String>,
    #[serde(default)]
    pub price_range: Option<String>,
    #[serde(default)]
    pub vibes: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub date_visited: Option<String>,
    #[serde(default)]
    pub wishlist: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRatingParams {
    pub restaurant_name: String,
    pub new_rating: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FindSimilarParams {
    pub restaurant_name: String,
    #[serde(default = "default_similar_results")]
    pub max_results: usize,
}

fn default_similar_results() -> usize {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartSessionParams {
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub occasion: Option<String>,
    #[serde(default)]
    pub max_distance_km: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionFeedbackParams {
    pub session_id: String,
    #[serde(default)]
    pub liked_restaurant_ids: Option<String>,
    #[serde(default)]
    pub disliked_restaurant_ids: Option<String>,
    #[serde(default)]
    pub cuisine_preferences: Option<String>,
    #[serde(default)]
    pub vibe_preferences: Option<String>,
    #[serde(default)]
    pub additional_notes: Option<String>,
}

pub struct RestaurantManager {
    store: NotionStore,
    maps: MapsClient,
    sessions: SessionRegistry,
    settings: Settings,
}

impl RestaurantManager {
    pub fn new(settings: Settings) -> Result<Self> {
        let store = NotionStore::new(&settings.notion_api_key, &settings.notion_database_id)?;
        let maps = MapsClient::new(&settings.google_maps_api_key)?;
        let sessions = SessionRegistry::new(settings.session_ttl_secs);
        Ok(Self {
            store,
            maps,
            sessions,
            settings,
        })
    }

    /// One-shot recommendations: stored records plus nearby discoveries,
    /// scored against the derived profile and the request's own preferences.
    pub async fn get_recommendations(
        &self,
        params: RecommendationParams,
    ) -> Result<Vec<Recommendation>> {
        let mut request = self.build_request(
            &params.city,
            params.state.as_deref(),
            params.latitude,
            params.longitude,
            params.occasion.as_deref(),
            params.cuisine_preferences.as_deref(),
            params.max_distance_km,
            params.max_results.min(self.settings.max_recommendations.max(1) * 5),
            params.exclude_visited,
        )?;
        let pool = self.build_pool(&mut request).await?;
        Ok(recommend::recommend(&pool, &request))
    }

    /// Record a visit (or wishlist entry). An existing record with the same
    /// name is updated in place rather than duplicated.
    pub async fn add_visit(&self, params: AddVisitParams) -> Result<Restaurant> {
        if params.restaurant_name.trim().is_empty() {
            return Err(PickyError::Validation("restaurant_name is required".into()));
        }
        if params.city.trim().is_empty() {
            return Err(PickyError::Validation("city is required".into()));
        }
        if let Some(rating) = params.rating {
            validate_rating(rating)?;
        }
        let date_visited = params
            .date_visited
            .as_deref()
            .map(parse_date)
            .transpose()?;

        let mut location = Location::new(params.city.trim());
        location.state = params.state.clone().filter(|s| !s.trim().is_empty());

        let existing = self.store.get_by_name(params.restaurant_name.trim()).await?;
        let mut restaurant = match existing {
            Some(found) => found,
            None => Restaurant::new(params.restaurant_name.trim(), location.clone()),
        };

        restaurant.location.city = location.city;
        if location.state.is_some() {
            restaurant.location.state = location.state;
        }
        if let Some(rating) = params.rating {
            restaurant.rating = Some(rating);
        }
        if let Some(cuisines) = params.cuisine_types.as_deref() {
            restaurant.cuisines = Cuisine::parse_list(cuisines);
        }
        if let Some(symbol) = params.price_range.as_deref() {
            restaurant.price_tier = Some(PriceTier::parse(symbol).ok_or_else(|| {
                PickyError::Validation(format!("unknown price range {symbol:?} (use $ through $$$$)"))
            })?);
        }
        if let Some(vibes) = params.vibes.as_deref() {
            restaurant.vibes = Vibe::parse_list(vibes);
        }
        if params.notes.is_some() {
            restaurant.notes = params.notes.clone();
        }
        if date_visited.is_some() {
            restaurant.date_visited = date_visited;
        }
        restaurant.wishlist = params.wishlist && restaurant.rating.is_none();

        // Enrichment is best-effort; the visit is recorded either way.
        match self.maps.enrich(restaurant.clone()).await {
            Ok(enriched) => restaurant = enriched,
            Err(err) => {
                tracing::warn!(error = %err, "enrichment failed, saving unenriched record");
            }
        }

        if restaurant.id.is_some() {
            self.store.update(&restaurant).await?;
            Ok(restaurant)
        } else {
            self.store.create(restaurant).await
        }
    }

    /// Update the rating (and optionally notes) on a known record.
    pub async fn update_rating(&self, params: UpdateRatingParams) -> Result<Restaurant> {
        validate_rating(params.new_rating)?;
        let mut restaurant = self
            .store
            .get_by_name(params.restaurant_name.trim())
            .await?
            .ok_or_else(|| {
                PickyError::NotFound(format!("restaurant '{}'", params.restaurant_name.trim()))
            })?;
        restaurant.rating = Some(params.new_rating);
        restaurant.wishlist = false;
        if params.notes.is_some() {
            restaurant.notes = params.notes;
        }
        self.store.update(&restaurant).await?;
        Ok(restaurant)
    }

    /// Full dining-pattern analysis: the derived profile plus trends and
    /// insight strings.
    pub async fn analyze_patterns(&self) -> Result<Value> {
        let records = self.store.list_all().await?;
        let profile = profile::build_profile(&records);
        let trends = profile::recent_trends(&records, Utc::now().date_naive());
        let insights = profile::insights(&profile);
        Ok(json!({
            "profile": profile,
            "favorite_cuisines": profile::favorite_cuisines(&profile),
            "preferred_vibes": profile::preferred_vibes(&records),
            "recent_trends": trends,
            "insights": insights,
        }))
    }

    /// Restaurants similar to a named one, by shared cuisine, price, and
    /// vibe. The reference itself is excluded.
    pub async fn find_similar(&self, params: FindSimilarParams) -> Result<Vec<(Restaurant, f64)>> {
        let reference = self
            .store
            .get_by_name(params.restaurant_name.trim())
            .await?
            .ok_or_else(|| {
                PickyError::NotFound(format!("restaurant '{}'", params.restaurant_name.trim()))
            })?;
        let records = self.store.list_all().await?;
        let mut similar: Vec<(Restaurant, f64)> = records
            .into_iter()
            .filter(|r| r.id != reference.id)
            .map(|r| {
                let score = recommend::similarity(&reference, &r);
                (r, score)
            })
            .filter(|(_, score)| *score >= SIMILARITY_THRESHOLD)
            .collect();
        similar.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.name.cmp(&b.0.name))
        });
        similar.truncate(params.max_results);
        Ok(similar)
    }

    /// Enrich every record that has no place reference yet. Failures on
    /// individual records are counted, not fatal.
    pub async fn enrich_database(&self) -> Result<Value> {
        let records = self.store.list_all().await?;
        let mut enriched = 0u32;
        let mut skipped = 0u32;
        let mut failed = 0u32;
        for record in records {
            if record.place_ref.is_some() {
                skipped += 1;
                continue;
            }
            let name = record.name.clone();
            match self.maps.enrich(record).await {
                Ok(updated) if updated.place_ref.is_some() => {
                    self.store.update(&updated).await?;
                    enriched += 1;
                }
                Ok(_) => skipped += 1,
                Err(err) if err.is_retryable() => {
                    tracing::warn!(name = %name, error = %err, "enrichment failed");
                    failed += 1;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(json!({ "enriched": enriched, "skipped": skipped, "failed": failed }))
    }

    /// Start an interactive session over the current candidate pool.
    pub async fn start_session(
        &self,
        params: StartSessionParams,
    ) -> Result<(String, Vec<Recommendation>)> {
        let mut request = self.build_request(
            &params.city,
            params.state.as_deref(),
            None,
            None,
            params.occasion.as_deref(),
            None,
            params.max_distance_km,
            self.settings.max_recommendations,
            false,
        )?;
        let pool = self.build_pool(&mut request).await?;
        Ok(self.sessions.start(request, pool))
    }

    /// Apply one round of feedback and return the refined ranking. Pure
    /// in-memory work; an expired session is `NotFound`.
    pub fn session_feedback(
        &self,
        params: SessionFeedbackParams,
    ) -> Result<(u32, Vec<Recommendation>)> {
        let feedback = SessionFeedback {
            liked_ids: split_ids(params.liked_restaurant_ids.as_deref()),
            disliked_ids: split_ids(params.disliked_restaurant_ids.as_deref()),
            cuisine_weights: params
                .cuisine_preferences
                .as_deref()
                .map(|s| {
                    Cuisine::parse_list(s)
                        .into_iter()
                        .map(|c| (c, 1.0))
                        .collect()
                })
                .unwrap_or_default(),
            vibe_weights: params
                .vibe_preferences
                .as_deref()
                .map(|s| Vibe::parse_list(s).into_iter().map(|v| (v, 1.0)).collect())
                .unwrap_or_default(),
            notes: params.additional_notes,
        };
        self.sessions.feedback(&params.session_id, &feedback)
    }

    /// Current ranking for a session without new feedback.
    pub fn session_recommendations(&self, session_id: &str) -> Result<Vec<Recommendation>> {
        let (_, ranked) = self
            .sessions
            .feedback(session_id, &SessionFeedback::default())?;
        Ok(ranked)
    }

    pub fn end_session(&self, session_id: &str) -> bool {
        self.sessions.end(session_id)
    }

    /// Probe both upstreams and report per-service results.
    pub async fn test_connections(&self) -> Value {
        let notion = match self.store.test_connection().await {
            Ok(title) => json!({ "success": true, "database_title": title }),
            Err(err) => json!({ "success": false, "error": err.to_string(), "kind": err.kind() }),
        };
        let maps = match self
            .maps
            .geocode(&Location::new("New York"))
            .await
        {
            Ok(_) => json!({ "success": true }),
            Err(err) => json!({ "success": false, "error": err.to_string(), "kind": err.kind() }),
        };
        json!({ "notion": notion, "google_maps": maps })
    }

    // Resource projections.

    pub async fn status(&self) -> SystemStatus {
        let (notion_ok, total) = match self.store.list_all().await {
            Ok(records) => (true, records.len()),
            Err(_) => (false, 0),
        };
        let maps_ok = self.maps.geocode(&Location::new("New York")).await.is_ok();
        SystemStatus {
            server: "picky".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            notion_connected: notion_ok,
            google_maps_connected: maps_ok,
            total_restaurants: total,
            timestamp: Utc::now(),
        }
    }

    pub async fn dining_profile(&self) -> Result<Value> {
        self.analyze_patterns().await
    }

    pub async fn recent_visits(&self, limit: usize) -> Result<Vec<Restaurant>> {
        self.store.recent_visits(limit).await
    }

    pub async fn favorites(&self, min_rating: f64, limit: usize) -> Result<Vec<Restaurant>> {
        self.store.favorites(min_rating, limit).await
    }

    pub async fn wishlist(&self) -> Result<Vec<Restaurant>> {
        self.store.wishlist(50).await
    }

    pub async fn database_snapshot(&self) -> Result<Vec<Restaurant>> {
        self.store.list_all().await
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.active_count()
    }

    #[allow(clippy::too_many_arguments)]
    fn build_request(
        &self,
        city: &str,
        state: Option<&str>,
        latitude: Option<f64>,
        longitude: Option<f64>,
        occasion: Option<&str>,
        cuisine_preferences: Option<&str>,
        max_distance_km: Option<f64>,
        max_results: usize,
        exclude_visited: bool,
    ) -> Result<RecommendationRequest> {
        if city.trim().is_empty() && latitude.is_none() {
            return Err(PickyError::Validation(
                "a city or coordinates are required".into(),
            ));
        }
        // Callers that omit the radius get the configured default.
        let max_distance_km = max_distance_km.unwrap_or(self.settings.default_search_radius_km);
        if max_distance_km <= 0.0 {
            return Err(PickyError::Validation(
                "max_distance_km must be positive".into(),
            ));
        }
        let mut target = Location::new(city.trim());
        target.state = state.map(str::trim).filter(|s| !s.is_empty()).map(String::from);
        target.latitude = latitude;
        target.longitude = longitude;

        let mut preferences = Preferences::default();
        if let Some(raw) = cuisine_preferences {
            for cuisine in Cuisine::parse_list(raw) {
                preferences.cuisine_weights.insert(cuisine, 1.0);
            }
        }

        let mut request = RecommendationRequest::new(target);
        request.occasion = occasion.map(Occasion::parse);
        request.preferences = preferences;
        request.max_distance_km = max_distance_km;
        request.max_results = max_results.max(1);
        request.exclude_visited = exclude_visited;
        Ok(request)
    }

    /// Load stored records, seed profile-derived preferences into the
    /// request where the caller gave none, and fold in nearby discoveries.
    async fn build_pool(&self, request: &mut RecommendationRequest) -> Result<Vec<Restaurant>> {
        let mut pool = self.store.list_all().await?;

        if request.preferences.cuisine_weights.is_empty() {
            let profile = profile::build_profile(&pool);
            for cuisine in profile::favorite_cuisines(&profile) {
                request.preferences.cuisine_weights.insert(cuisine, 1.0);
            }
        }

        // Discovery is additive; a failing places API degrades to stored
        // records only.
        match self.discover(request).await {
            Ok(discovered) => {
                let known: Vec<(String, String)> = pool
                    .iter()
                    .map(|r| (r.name.to_lowercase(), r.location.city.to_lowercase()))
                    .collect();
                for candidate in discovered {
                    let key = (
                        candidate.name.to_lowercase(),
                        candidate.location.city.to_lowercase(),
                    );
                    if !known.contains(&key) {
                        pool.push(candidate);
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "nearby discovery failed, using stored records only");
            }
        }
        Ok(pool)
    }

    async fn discover(&self, request: &RecommendationRequest) -> Result<Vec<Restaurant>> {
        let center = match request.target.coordinates() {
            Some(coords) => coords,
            None => self.maps.geocode(&request.target).await?,
        };
        let cuisine = request
            .preferences
            .cuisine_weights
            .keys()
            .min()
            .copied();
        self.maps
            .search_nearby(center, request.max_distance_km, cuisine)
            .await
    }
}

fn validate_rating(rating: f64) -> Result<()> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) || !rating.is_finite() {
        return Err(PickyError::Validation(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING}, got {rating}"
        )));
    }
    Ok(())
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    raw.trim().parse().map_err(|_| {
        PickyError::Validation(format!("date_visited must be YYYY-MM-DD, got {raw:?}"))
    })
}

fn split_ids(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        assert!(validate_rating(1.0).is_ok());
        assert!(validate_rating(5.0).is_ok());
        assert!(validate_rating(4.5).is_ok());
        assert_eq!(validate_rating(0.5).unwrap_err().kind(), "validation");
        assert_eq!(validate_rating(5.1).unwrap_err().kind(), "validation");
        assert_eq!(validate_rating(f64::NAN).unwrap_err().kind(), "validation");
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2026-06-14").unwrap(),
            NaiveDate::from_ymd_opt(2026, 6, 14).unwrap()
        );
        assert_eq!(parse_date("June 14").unwrap_err().kind(), "validation");
    }

    #[test]
    fn test_split_ids() {
        assert_eq!(
            split_ids(Some("a, b,,c")),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert!(split_ids(None).is_empty());
    }

    fn test_manager() -> RestaurantManager {
        RestaurantManager::new(Settings {
            notion_api_key: "secret_x".into(),
            notion_database_id: "db_x".into(),
            google_maps_api_key: "maps_x".into(),
            max_recommendations: 10,
            default_search_radius_km: 10.0,
            session_ttl_secs: 1800,
            sync_interval_secs: 0,
        })
        .unwrap()
    }

    #[test]
    fn test_recommendation_params_defaults() {
        let params: RecommendationParams =
            serde_json::from_value(json!({ "city": "Austin" })).unwrap();
        assert!(params.max_distance_km.is_none());
        assert_eq!(params.max_results, 10);
        assert!(!params.exclude_visited);
        assert!(params.occasion.is_none());
    }

    #[test]
    fn test_request_radius_falls_back_to_configured_default() {
        let manager = test_manager();
        let request = manager
            .build_request("Austin", None, None, None, None, None, None, 10, false)
            .unwrap();
        assert_eq!(request.max_distance_km, 10.0);

        let explicit = manager
            .build_request("Austin", None, None, None, None, None, Some(40.0), 10, false)
            .unwrap();
        assert_eq!(explicit.max_distance_km, 40.0);
    }

    #[test]
    fn test_add_visit_params_require_name() {
        let result: std::result::Result<AddVisitParams, _> =
            serde_json::from_value(json!({ "city": "Austin" }));
        assert!(result.is_err());
    }
}

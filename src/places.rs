//! Google Maps places adapter.
//!
//! Wraps the geocoding and places web services behind typed operations and
//! translates the API's status strings into the shared error taxonomy. The
//! rest of the crate never sees a raw place payload.

use crate::error::{PickyError, Result};
use crate::types::{Cuisine, Location, PlaceDetails, PriceTier, Restaurant};
use serde_json::Value;
use std::time::Duration;

const MAPS_BASE: &str = "https://maps.googleapis.com/maps/api";
const MAX_RETRIES: u32 = 3;
const SERVICE: &str = "google_maps";

pub struct MapsClient {
    client: reqwest::Client,
    api_key: String,
}

impl MapsClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| PickyError::Configuration(format!("http client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }

    /// Resolve a location to coordinates. `NotFound` when geocoding returns
    /// zero results.
    pub async fn geocode(&self, location: &Location) -> Result<(f64, f64)> {
        if let Some(coords) = location.coordinates() {
            return Ok(coords);
        }
        let address = match (&location.address, &location.state) {
            (Some(addr), _) => format!("{addr}, {}", location.display()),
            (None, _) => location.display(),
        };
        let body = self
            .request(&format!("{MAPS_BASE}/geocode/json"), &[("address", address.as_str())])
            .await?;
        let geometry = &body["results"][0]["geometry"]["location"];
        match (geometry["lat"].as_f64(), geometry["lng"].as_f64()) {
            (Some(lat), Some(lng)) => Ok((lat, lng)),
            _ => Err(PickyError::NotFound(format!(
                "could not geocode {address}"
            ))),
        }
    }

    /// Restaurants near a coordinate, optionally biased toward a cuisine.
    pub async fn search_nearby(
        &self,
        center: (f64, f64),
        radius_km: f64,
        cuisine: Option<Cuisine>,
    ) -> Result<Vec<Restaurant>> {
        let location = format!("{},{}", center.0, center.1);
        let radius = format!("{:.0}", (radius_km * 1000.0).min(50_000.0));
        let keyword = cuisine.map(|c| format!("{} restaurant", c.as_str()));

        let mut params = vec![
            ("location", location.as_str()),
            ("radius", radius.as_str()),
            ("type", "restaurant"),
        ];
        if let Some(kw) = &keyword {
            params.push(("keyword", kw.as_str()));
        }

        let body = self
            .request(&format!("{MAPS_BASE}/place/nearbysearch/json"), &params)
            .await?;
        Ok(parse_places(&body))
    }

    /// Find a specific venue by name near a city. `Ok(None)` when the text
    /// search comes back empty.
    pub async fn find_by_name(
        &self,
        name: &str,
        location: &Location,
    ) -> Result<Option<PlaceDetails>> {
        let query = format!("{name} {}", location.display());
        let body = self
            .request(
                &format!("{MAPS_BASE}/place/textsearch/json"),
                &[("query", query.as_str()), ("type", "restaurant")],
            )
            .await?;
        let Some(first) = body["results"].as_array().and_then(|r| r.first()) else {
            return Ok(None);
        };
        Ok(parse_place_details(first))
    }

    /// Full details for a known place id.
    pub async fn place_details(&self, place_id: &str) -> Result<PlaceDetails> {
        let body = self
            .request(
                &format!("{MAPS_BASE}/place/details/json"),
                &[
                    ("place_id", place_id),
                    (
                        "fields",
                        "place_id,name,rating,price_level,types,formatted_address,geometry",
                    ),
                ],
            )
            .await?;
        parse_place_details(&body["result"])
            .ok_or_else(|| PickyError::NotFound(format!("place {place_id}")))
    }

    /// Fill in a record's coordinates, place reference, and enrichment data.
    /// A venue the API cannot find leaves the record unchanged.
    pub async fn enrich(&self, mut restaurant: Restaurant) -> Result<Restaurant> {
        let details = match &restaurant.place_ref {
            Some(place_id) => Some(self.place_details(place_id).await?),
            None => self.find_by_name(&restaurant.name, &restaurant.location).await?,
        };
        if let Some(details) = details {
            restaurant.place_ref = Some(details.place_id.clone());
            if restaurant.location.latitude.is_none() {
                restaurant.location.latitude = details.latitude;
                restaurant.location.longitude = details.longitude;
            }
            if restaurant.price_tier.is_none() {
                restaurant.price_tier = details.price_level.map(PriceTier::from_price_level);
            }
            if restaurant.cuisines.is_empty() {
                restaurant.cuisines = cuisines_from_types(&details.types);
            }
            restaurant.place_details = Some(details);
            tracing::debug!(name = %restaurant.name, "restaurant enriched");
        } else {
            tracing::debug!(name = %restaurant.name, "no place match for restaurant");
        }
        Ok(restaurant)
    }

    /// Issue one API call with key appended, retrying transient failures.
    async fn request(&self, url: &str, params: &[(&str, &str)]) -> Result<Value> {
        let mut last_err = PickyError::transient(SERVICE, "no attempt made");
        for attempt in 1..=MAX_RETRIES {
            let result = self
                .client
                .get(url)
                .query(params)
                .query(&[("key", self.api_key.as_str())])
                .send()
                .await;
            match result {
                Ok(response) => match translate_response(response).await {
                    Ok(body) => return Ok(body),
                    Err(err) if err.is_retryable() && attempt < MAX_RETRIES => {
                        tracing::warn!(attempt, error = %err, "retrying maps request");
                        last_err = err;
                    }
                    Err(err) => return Err(err),
                },
                Err(err) => {
                    let err = PickyError::transient(SERVICE, err);
                    if attempt == MAX_RETRIES {
                        return Err(err);
                    }
                    tracing::warn!(attempt, error = %err, "retrying maps request");
                    last_err = err;
                }
            }
            tokio::time::sleep(Duration::from_millis(250 * attempt as u64)).await;
        }
        Err(last_err)
    }
}

/// The places API reports errors in-band through a `status` string even on
/// HTTP 200, so both layers have to be checked.
async fn translate_response(response: reqwest::Response) -> Result<Value> {
    let http_status = response.status();
    if !http_status.is_success() {
        let message = format!("{http_status}");
        return match http_status.as_u16() {
            401 | 403 => Err(PickyError::auth(SERVICE, message)),
            429 => Err(PickyError::transient(SERVICE, message)),
            s if s >= 500 => Err(PickyError::transient(SERVICE, message)),
            _ => Err(PickyError::Validation(message)),
        };
    }
    let body: Value = response
        .json()
        .await
        .map_err(|e| PickyError::transient(SERVICE, format!("malformed response: {e}")))?;
    match body["status"].as_str() {
        Some("OK") | Some("ZERO_RESULTS") | None => Ok(body),
        Some("OVER_QUERY_LIMIT") => Err(PickyError::QuotaExceeded(SERVICE.to_string())),
        Some("REQUEST_DENIED") => Err(PickyError::auth(
            SERVICE,
            body["error_message"].as_str().unwrap_or("request denied"),
        )),
        Some("INVALID_REQUEST") => Err(PickyError::Validation(
            body["error_message"]
                .as_str()
                .unwrap_or("invalid request")
                .to_string(),
        )),
        Some(other) => Err(PickyError::transient(SERVICE, other)),
    }
}

fn parse_places(body: &Value) -> Vec<Restaurant> {
    body["results"]
        .as_array()
        .map(|results| results.iter().filter_map(parse_place_as_restaurant).collect())
        .unwrap_or_default()
}

fn parse_place_as_restaurant(place: &Value) -> Option<Restaurant> {
    let details = parse_place_details(place)?;
    let (city, state) = split_address(details.formatted_address.as_deref());
    let location = Location {
        address: details.formatted_address.clone(),
        city,
        state,
        latitude: details.latitude,
        longitude: details.longitude,
    };
    let mut restaurant = Restaurant::new(details.name.clone(), location);
    restaurant.cuisines = cuisines_from_types(&details.types);
    restaurant.price_tier = details.price_level.map(PriceTier::from_price_level);
    restaurant.place_ref = Some(details.place_id.clone());
    restaurant.place_details = Some(details);
    Some(restaurant)
}

fn parse_place_details(place: &Value) -> Option<PlaceDetails> {
    let place_id = place["place_id"].as_str()?.to_string();
    let name = place["name"].as_str()?.to_string();
    let geometry = &place["geometry"]["location"];
    Some(PlaceDetails {
        place_id,
        name,
        rating: place["rating"].as_f64(),
        price_level: place["price_level"].as_u64().map(|l| l as u8),
        types: place["types"]
            .as_array()
            .map(|t| {
                t.iter()
                    .filter_map(|v| v.as_str())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
        formatted_address: place["formatted_address"]
            .as_str()
            .or_else(|| place["vicinity"].as_str())
            .map(String::from),
        latitude: geometry["lat"].as_f64(),
        longitude: geometry["lng"].as_f64(),
    })
}

/// Best-effort (city, state) from a formatted address like
/// "801 S Lamar Blvd, Austin, TX 78704, USA".
fn split_address(address: Option<&str>) -> (String, Option<String>) {
    let Some(address) = address else {
        return (String::new(), None);
    };
    let parts: Vec<&str> = address.split(',').map(str::trim).collect();
    match parts.len() {
        0 | 1 => (address.to_string(), None),
        2 => (parts[0].to_string(), None),
        n => {
            let city = parts[n - 3].to_string();
            let state = parts[n - 2]
                .split_whitespace()
                .next()
                .map(String::from);
            (city, state)
        }
    }
}

/// Map the API's venue types onto cuisine tags. A venue with no recognized
/// type gets `Other` so it still shows up in cuisine breakdowns.
pub fn cuisines_from_types(types: &[String]) -> Vec<Cuisine> {
    let mut cuisines: Vec<Cuisine> = Vec::new();
    let mapped = types
        .iter()
        .filter_map(|t| match t.as_str() {
            "italian_restaurant" => Some(Cuisine::Italian),
            "chinese_restaurant" => Some(Cuisine::Chinese),
            "japanese_restaurant" => Some(Cuisine::Japanese),
            "mexican_restaurant" => Some(Cuisine::Mexican),
            "indian_restaurant" => Some(Cuisine::Indian),
            "french_restaurant" => Some(Cuisine::French),
            "thai_restaurant" => Some(Cuisine::Thai),
            "mediterranean_restaurant" => Some(Cuisine::Mediterranean),
            "american_restaurant" => Some(Cuisine::American),
            "seafood_restaurant" => Some(Cuisine::Seafood),
            "steak_house" => Some(Cuisine::Steakhouse),
            "pizza_restaurant" => Some(Cuisine::Pizza),
            "sushi_restaurant" => Some(Cuisine::Sushi),
            "barbecue_restaurant" => Some(Cuisine::Barbecue),
            "vegetarian_restaurant" => Some(Cuisine::Vegetarian),
            "meal_takeaway" | "fast_food_restaurant" => Some(Cuisine::FastFood),
            "cafe" => Some(Cuisine::Cafe),
            "bakery" => Some(Cuisine::Bakery),
            _ => None,
        });
    // First occurrence wins; duplicates can arrive non-adjacent (e.g.
    // "meal_takeaway" and "fast_food_restaurant" split by another type).
    for cuisine in mapped {
        if !cuisines.contains(&cuisine) {
            cuisines.push(cuisine);
        }
    }
    if cuisines.is_empty() {
        cuisines.push(Cuisine::Other);
    }
    cuisines
}

//! Notion store adapter.
//!
//! Owns every detail of the Notion REST API: auth headers, the database
//! property schema, pagination cursors, and the translation of HTTP failures
//! into the shared error taxonomy. Callers see `Restaurant` values and
//! `PickyError`, nothing Notion-shaped.

use crate::error::{PickyError, Result};
use crate::types::{Cuisine, Location, PriceTier, Restaurant, Vibe};
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::time::Duration;

const NOTION_BASE: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";
const MAX_RETRIES: u32 = 3;
const SERVICE: &str = "notion";

pub struct NotionStore {
    client: reqwest::Client,
    api_key: String,
    database_id: String,
}

impl NotionStore {
    pub fn new(api_key: impl Into<String>, database_id: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PickyError::Configuration(format!("http client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            database_id: database_id.into(),
        })
    }

    /// Retrieve the database to prove credentials and id are valid. Returns
    /// the database title.
    pub async fn test_connection(&self) -> Result<String> {
        let url = format!("{NOTION_BASE}/databases/{}", self.database_id);
        let body = self.get(&url).await?;
        let title = body["title"][0]["plain_text"]
            .as_str()
            .unwrap_or("Unknown")
            .to_string();
        Ok(title)
    }

    /// Fetch every record, following pagination cursors.
    pub async fn list_all(&self) -> Result<Vec<Restaurant>> {
        let mut restaurants = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut request = json!({ "page_size": 100 });
            if let Some(c) = &cursor {
                request["start_cursor"] = json!(c);
            }
            let body = self.query(request).await?;
            collect_pages(&body, &mut restaurants);
            if body["has_more"].as_bool().unwrap_or(false) {
                cursor = body["next_cursor"].as_str().map(String::from);
                if cursor.is_none() {
                    break;
                }
            } else {
                break;
            }
        }
        tracing::debug!(count = restaurants.len(), "loaded restaurants from store");
        Ok(restaurants)
    }

    /// Exact-name lookup. `Ok(None)` when nothing matches.
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Restaurant>> {
        let body = self
            .query(json!({
                "filter": { "property": "Name", "title": { "equals": name } },
                "page_size": 1,
            }))
            .await?;
        let mut found = Vec::new();
        collect_pages(&body, &mut found);
        Ok(found.into_iter().next())
    }

    /// Create a page for the record and return it with the new page id.
    pub async fn create(&self, mut restaurant: Restaurant) -> Result<Restaurant> {
        let url = format!("{NOTION_BASE}/pages");
        let payload = json!({
            "parent": { "database_id": self.database_id },
            "properties": build_properties(&restaurant),
        });
        let body = self.post(&url, payload).await?;
        let id = body["id"]
            .as_str()
            .ok_or_else(|| PickyError::transient(SERVICE, "create response missing page id"))?;
        restaurant.id = Some(id.to_string());
        tracing::info!(name = %restaurant.name, "restaurant created");
        Ok(restaurant)
    }

    /// Overwrite the page's properties with the record's current state.
    pub async fn update(&self, restaurant: &Restaurant) -> Result<()> {
        let id = restaurant
            .id
            .as_deref()
            .ok_or_else(|| PickyError::Validation("cannot update a record with no id".into()))?;
        let url = format!("{NOTION_BASE}/pages/{id}");
        let payload = json!({ "properties": build_properties(restaurant) });
        self.patch(&url, payload).await?;
        tracing::info!(name = %restaurant.name, "restaurant updated");
        Ok(())
    }

    /// Most recent visits, newest first.
    pub async fn recent_visits(&self, limit: usize) -> Result<Vec<Restaurant>> {
        let body = self
            .query(json!({
                "filter": { "property": "Date Visited", "date": { "is_not_empty": true } },
                "sorts": [{ "property": "Date Visited", "direction": "descending" }],
                "page_size": limit.min(100),
            }))
            .await?;
        let mut found = Vec::new();
        collect_pages(&body, &mut found);
        Ok(found)
    }

    /// Records rated at or above `min_rating`, best first.
    pub async fn favorites(&self, min_rating: f64, limit: usize) -> Result<Vec<Restaurant>> {
        let body = self
            .query(json!({
                "filter": {
                    "property": "Rating",
                    "number": { "greater_than_or_equal_to": min_rating },
                },
                "sorts": [{ "property": "Rating", "direction": "descending" }],
                "page_size": limit.min(100),
            }))
            .await?;
        let mut found = Vec::new();
        collect_pages(&body, &mut found);
        Ok(found)
    }

    pub async fn wishlist(&self, limit: usize) -> Result<Vec<Restaurant>> {
        let body = self
            .query(json!({
                "filter": { "property": "Wishlist", "checkbox": { "equals": true } },
                "page_size": limit.min(100),
            }))
            .await?;
        let mut found = Vec::new();
        collect_pages(&body, &mut found);
        Ok(found)
    }

    async fn query(&self, request: Value) -> Result<Value> {
        let url = format!("{NOTION_BASE}/databases/{}/query", self.database_id);
        self.post(&url, request).await
    }

    async fn get(&self, url: &str) -> Result<Value> {
        self.send(|| self.client.get(url)).await
    }

    async fn post(&self, url: &str, payload: Value) -> Result<Value> {
        self.send(|| self.client.post(url).json(&payload)).await
    }

    async fn patch(&self, url: &str, payload: Value) -> Result<Value> {
        self.send(|| self.client.patch(url).json(&payload)).await
    }

    /// Issue a request with auth headers, retrying transient failures with
    /// linear backoff. Non-transient failures surface immediately.
    async fn send<F>(&self, build: F) -> Result<Value>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last_err = PickyError::transient(SERVICE, "no attempt made");
        for attempt in 1..=MAX_RETRIES {
            let result = build()
                .bearer_auth(&self.api_key)
                .header("Notion-Version", NOTION_VERSION)
                .send()
                .await;
            match result {
                Ok(response) => match translate_response(response).await {
                    Ok(body) => return Ok(body),
                    Err(err) if err.is_retryable() && attempt < MAX_RETRIES => {
                        tracing::warn!(attempt, error = %err, "retrying notion request");
                        last_err = err;
                    }
                    Err(err) => return Err(err),
                },
                Err(err) => {
                    let err = PickyError::transient(SERVICE, err);
                    if attempt == MAX_RETRIES {
                        return Err(err);
                    }
                    tracing::warn!(attempt, error = %err, "retrying notion request");
                    last_err = err;
                }
            }
            tokio::time::sleep(Duration::from_millis(250 * attempt as u64)).await;
        }
        Err(last_err)
    }
}

/// Map an HTTP response onto the error taxonomy: 401/403 are auth, 404 is
/// not-found, 429 and 5xx are transient, anything else 4xx is validation.
async fn translate_response(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| PickyError::transient(SERVICE, format!("malformed response: {e}")));
    }
    let detail = response.text().await.unwrap_or_default();
    let message = format!("{status}: {detail}");
    match status.as_u16() {
        401 | 403 => Err(PickyError::auth(SERVICE, message)),
        404 => Err(PickyError::NotFound(format!("notion resource: {message}"))),
        429 => Err(PickyError::transient(SERVICE, message)),
        s if s >= 500 => Err(PickyError::transient(SERVICE, message)),
        _ => Err(PickyError::Validation(message)),
    }
}

fn collect_pages(body: &Value, out: &mut Vec<Restaurant>) {
    if let Some(results) = body["results"].as_array() {
        for page in results {
            if let Some(restaurant) = parse_page(page) {
                out.push(restaurant);
            } else {
                tracing::warn!(page_id = %page["id"], "skipping unparseable page");
            }
        }
    }
}

/// Serialize a record into the database's property schema. Optional fields
/// are omitted rather than written as empty values.
fn build_properties(restaurant: &Restaurant) -> Value {
    let mut props = json!({
        "Name": { "title": [{ "text": { "content": restaurant.name } }] },
        "City": { "rich_text": [{ "text": { "content": restaurant.location.city } }] },
        "Wishlist": { "checkbox": restaurant.wishlist },
    });

    if let Some(state) = &restaurant.location.state {
        props["State"] = json!({ "rich_text": [{ "text": { "content": state } }] });
    }
    if let Some(address) = &restaurant.location.address {
        props["Location"] = json!({ "rich_text": [{ "text": { "content": address } }] });
    }
    if let Some(rating) = restaurant.rating {
        props["Rating"] = json!({ "number": rating });
    }
    if !restaurant.cuisines.is_empty() {
        let options: Vec<Value> = restaurant
            .cuisines
            .iter()
            .map(|c| json!({ "name": c.as_str() }))
            .collect();
        props["Cuisine"] = json!({ "multi_select": options });
    }
    if let Some(tier) = restaurant.price_tier {
        props["Price Range"] = json!({ "select": { "name": tier.symbol() } });
    }
    if !restaurant.vibes.is_empty() {
        let options: Vec<Value> = restaurant
            .vibes
            .iter()
            .map(|v| json!({ "name": v.as_str() }))
            .collect();
        props["Vibes"] = json!({ "multi_select": options });
    }
    if let Some(notes) = &restaurant.notes {
        props["Notes"] = json!({ "rich_text": [{ "text": { "content": notes } }] });
    }
    if let Some(date) = restaurant.date_visited {
        props["Date Visited"] = json!({ "date": { "start": date.to_string() } });
    }
    if let Some(revisit) = restaurant.revisit {
        props["Revisit"] = json!({ "checkbox": revisit });
    }
    if let Some(place_ref) = &restaurant.place_ref {
        props["Google Place ID"] = json!({ "rich_text": [{ "text": { "content": place_ref } }] });
    }
    props
}

/// Parse a page back into a record. Pages missing a name or city are
/// unusable and yield `None`; unknown tags inside multi-selects are skipped.
fn parse_page(page: &Value) -> Option<Restaurant> {
    let props = page.get("properties")?;

    let name = plain_text(&props["Name"]["title"])?;
    let city = plain_text(&props["City"]["rich_text"])?;

    let location = Location {
        address: plain_text(&props["Location"]["rich_text"]),
        city,
        state: plain_text(&props["State"]["rich_text"]),
        latitude: None,
        longitude: None,
    };

    let mut restaurant = Restaurant::new(name, location);
    restaurant.id = page["id"].as_str().map(String::from);
    restaurant.rating = props["Rating"]["number"].as_f64();

    if let Some(options) = props["Cuisine"]["multi_select"].as_array() {
        restaurant.cuisines = options
            .iter()
            .filter_map(|o| o["name"].as_str())
            .filter_map(Cuisine::parse)
            .collect();
    }
    if let Some(symbol) = props["Price Range"]["select"]["name"].as_str() {
        restaurant.price_tier = PriceTier::parse(symbol);
    }
    if let Some(options) = props["Vibes"]["multi_select"].as_array() {
        restaurant.vibes = options
            .iter()
            .filter_map(|o| o["name"].as_str())
            .filter_map(Vibe::parse)
            .collect();
    }
    restaurant.notes = plain_text(&props["Notes"]["rich_text"]);
    if let Some(start) = props["Date Visited"]["date"]["start"].as_str() {
        // Dates may carry a time component; the day is all we keep.
        restaurant.date_visited = start.get(0..10).and_then(|d| d.parse::<NaiveDate>().ok());
    }
    restaurant.revisit = props["Revisit"]["checkbox"].as_bool();
    restaurant.wishlist = props["Wishlist"]["checkbox"].as_bool().unwrap_or(false);
    restaurant.place_ref = plain_text(&props["Google Place ID"]["rich_text"]);

    Some(restaurant)
}

/// First plain-text run of a title/rich_text array, if non-empty.
fn plain_text(array: &Value) -> Option<String> {
    array[0]["plain_text"]
        .as_str()
        .or_else(|| array[0]["text"]["content"].as_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
}

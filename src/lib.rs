//! Picky - personalized restaurant recommendations over MCP
//!
//! An MCP server that turns a personal restaurant database (a Notion table
//! of visits, ratings, and wishlist entries) into a recommendation engine,
//! enriched with live place data from Google Maps.
//!
//! # How it works
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                AI Agent (Claude, etc.)               │
//! └─────────────────────┬───────────────────────────────┘
//!                       │ MCP over stdio
//!                       ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                 Picky MCP Server                     │
//! │  get_restaurant_recommendations() → scored ranking   │
//! │  add_restaurant_visit() → record + enrich            │
//! │  start_interactive_session() → feedback loop         │
//! └───────────┬─────────────────────────┬───────────────┘
//!             │                         │
//!             ▼                         ▼
//!       Notion database          Google Maps places
//! ```
//!
//! Recommendations are scored as a weighted sum of five normalized
//! components (cuisine match, price fit, distance, past rating, vibe match),
//! so every result comes with an explainable breakdown. Interactive sessions
//! pin a candidate pool and refine the ranking in memory from likes and
//! dislikes without further upstream calls.

pub mod config;
pub mod error;
pub mod manager;
pub mod mcp;
pub mod places;
pub mod profile;
pub mod recommend;
pub mod server;
pub mod session;
pub mod store;
pub mod sync;
pub mod types;

pub use config::Settings;
pub use error::{PickyError, Result};
pub use manager::RestaurantManager;
pub use profile::build_profile;
pub use recommend::{haversine_km, recommend, similarity};
pub use session::SessionRegistry;
pub use types::*;

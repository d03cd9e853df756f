//! Interactive recommendation sessions.
//!
//! A session pins a candidate pool and a request at start time; feedback
//! rounds mutate only the session's own preference weights and exclusion set,
//! then re-rank the pinned pool. No upstream I/O happens during feedback, so
//! a feedback round either fully applies or leaves the session untouched.

use crate::error::{PickyError, Result};
use crate::recommend;
use crate::types::{Recommendation, RecommendationRequest, Restaurant, SessionFeedback};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Largest absolute preference weight a session can accumulate per tag.
/// Keeps one enthusiastic round of feedback from drowning every other signal.
pub const WEIGHT_CAP: f64 = 3.0;

#[derive(Debug)]
pub struct Session {
    pub token: String,
    pub request: RecommendationRequest,
    /// Candidate pool snapshot taken at session start.
    pub pool: Vec<Restaurant>,
    pub disliked: HashSet<String>,
    pub rounds: u32,
    pub last_touched: Instant,
}

impl Session {
    /// Apply one round of feedback and re-rank. Validation happens before
    /// any field is mutated.
    fn apply_feedback(&mut self, feedback: &SessionFeedback) -> Vec<Recommendation> {
        if !feedback.is_empty() {
            for id in &feedback.disliked_ids {
                self.disliked.insert(id.clone());
            }
            for (cuisine, delta) in &feedback.cuisine_weights {
                let w = self
                    .request
                    .preferences
                    .cuisine_weights
                    .entry(*cuisine)
                    .or_insert(0.0);
                *w = (*w + delta).clamp(-WEIGHT_CAP, WEIGHT_CAP);
            }
            for (vibe, delta) in &feedback.vibe_weights {
                let w = self
                    .request
                    .preferences
                    .vibe_weights
                    .entry(*vibe)
                    .or_insert(0.0);
                *w = (*w + delta).clamp(-WEIGHT_CAP, WEIGHT_CAP);
            }
            // A like on a record's cuisines nudges them up half a point each.
            for id in &feedback.liked_ids {
                if let Some(liked) = self.pool.iter().find(|r| r.id.as_deref() == Some(id)) {
                    let cuisines = liked.cuisines.clone();
                    let vibes = liked.vibes.clone();
                    for cuisine in cuisines {
                        let w = self
                            .request
                            .preferences
                            .cuisine_weights
                            .entry(cuisine)
                            .or_insert(0.0);
                        *w = (*w + 0.5).clamp(-WEIGHT_CAP, WEIGHT_CAP);
                    }
                    for vibe in vibes {
                        let w = self
                            .request
                            .preferences
                            .vibe_weights
                            .entry(vibe)
                            .or_insert(0.0);
                        *w = (*w + 0.5).clamp(-WEIGHT_CAP, WEIGHT_CAP);
                    }
                }
            }
            self.rounds += 1;
        }
        self.last_touched = Instant::now();
        self.rank()
    }

    fn rank(&self) -> Vec<Recommendation> {
        let eligible: Vec<Restaurant> = self
            .pool
            .iter()
            .filter(|r| {
                r.id.as_deref()
                    .map_or(true, |id| !self.disliked.contains(id))
            })
            .cloned()
            .collect();
        recommend::recommend(&eligible, &self.request)
    }
}

/// Registry of live sessions, keyed by opaque token. The outer lock is held
/// only long enough to resolve or insert a token; feedback work runs under
/// the per-session lock so concurrent rounds against one session serialize.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<Mutex<Session>>>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    /// Start a session over a pinned pool and return (token, initial ranking).
    pub fn start(
        &self,
        request: RecommendationRequest,
        pool: Vec<Restaurant>,
    ) -> (String, Vec<Recommendation>) {
        let token = Uuid::new_v4().to_string();
        let session = Session {
            token: token.clone(),
            request,
            pool,
            disliked: HashSet::new(),
            rounds: 0,
            last_touched: Instant::now(),
        };
        let initial = session.rank();
        let mut sessions = self.lock_registry();
        Self::sweep_expired(&mut sessions, self.ttl);
        sessions.insert(token.clone(), Arc::new(Mutex::new(session)));
        tracing::info!(token = %token, "session started");
        (token, initial)
    }

    /// Apply feedback to a live session. An expired or unknown token is
    /// `NotFound`; the caller must start over.
    pub fn feedback(
        &self,
        token: &str,
        feedback: &SessionFeedback,
    ) -> Result<(u32, Vec<Recommendation>)> {
        let session = self.resolve(token)?;
        let mut session = session
            .lock()
            .map_err(|_| PickyError::transient("session", "session lock poisoned"))?;
        let ranked = session.apply_feedback(feedback);
        tracing::debug!(token = %token, rounds = session.rounds, "feedback applied");
        Ok((session.rounds, ranked))
    }

    /// Close a session. Closing an unknown token is not an error; the caller
    /// already has what it wanted.
    pub fn end(&self, token: &str) -> bool {
        let removed = self.lock_registry().remove(token).is_some();
        if removed {
            tracing::info!(token = %token, "session ended");
        }
        removed
    }

    pub fn active_count(&self) -> usize {
        let mut sessions = self.lock_registry();
        Self::sweep_expired(&mut sessions, self.ttl);
        sessions.len()
    }

    fn resolve(&self, token: &str) -> Result<Arc<Mutex<Session>>> {
        let mut sessions = self.lock_registry();
        Self::sweep_expired(&mut sessions, self.ttl);
        sessions
            .get(token)
            .cloned()
            .ok_or_else(|| PickyError::NotFound(format!("session {token} (expired or unknown)")))
    }

    fn lock_registry(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Mutex<Session>>>> {
        // A poisoned registry lock means a panic mid-insert/remove; the map
        // itself is still a valid HashMap, so keep serving.
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn sweep_expired(sessions: &mut HashMap<String, Arc<Mutex<Session>>>, ttl: Duration) {
        sessions.retain(|token, session| {
            let keep = session
                .lock()
                .map(|s| s.last_touched.elapsed() < ttl)
                .unwrap_or(false);
            if !keep {
                tracing::debug!(token = %token, "session expired");
            }
            keep
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Cuisine, Location, RecommendationRequest, Restaurant};

    fn pool() -> Vec<Restaurant> {
        let mut thai = Restaurant::new("Thai Place", Location::new("Austin"));
        thai.id = Some("r-thai".to_string());
        thai.cuisines = vec![Cuisine::Thai];
        let mut pizza = Restaurant::new("Pizza Place", Location::new("Austin"));
        pizza.id = Some("r-pizza".to_string());
        pizza.cuisines = vec![Cuisine::Pizza];
        vec![thai, pizza]
    }

    fn request() -> RecommendationRequest {
        RecommendationRequest::new(Location::new("Austin"))
    }

    #[test]
    fn test_start_returns_token_and_ranking() {
        let registry = SessionRegistry::new(1800);
        let (token, initial) = registry.start(request(), pool());
        assert!(!token.is_empty());
        assert_eq!(initial.len(), 2);
        assert_eq!(registry.active_count(), 1);
    }

    #[test]
    fn test_empty_feedback_is_noop() {
        let registry = SessionRegistry::new(1800);
        let (token, initial) = registry.start(request(), pool());

        let (rounds, ranked) = registry
            .feedback(&token, &SessionFeedback::default())
            .unwrap();
        assert_eq!(rounds, 0);
        let names =
            |recs: &[Recommendation]| -> Vec<String> {
                recs.iter().map(|r| r.restaurant.name.clone()).collect()
            };
        assert_eq!(names(&ranked), names(&initial));
    }

    #[test]
    fn test_disliked_never_returns() {
        let registry = SessionRegistry::new(1800);
        let (token, _) = registry.start(request(), pool());

        let feedback = SessionFeedback {
            disliked_ids: vec!["r-pizza".to_string()],
            ..Default::default()
        };
        let (rounds, ranked) = registry.feedback(&token, &feedback).unwrap();
        assert_eq!(rounds, 1);
        assert!(ranked.iter().all(|r| r.restaurant.name != "Pizza Place"));

        // Stays excluded in later rounds too.
        let (_, again) = registry
            .feedback(&token, &SessionFeedback::default())
            .unwrap();
        assert!(again.iter().all(|r| r.restaurant.name != "Pizza Place"));
    }

    #[test]
    fn test_weight_deltas_are_capped() {
        let registry = SessionRegistry::new(1800);
        let (token, _) = registry.start(request(), pool());

        let mut feedback = SessionFeedback::default();
        feedback.cuisine_weights.insert(Cuisine::Thai, 100.0);
        registry.feedback(&token, &feedback).unwrap();

        let session = registry.resolve(&token).unwrap();
        let session = session.lock().unwrap();
        assert_eq!(
            session.request.preferences.cuisine_weights[&Cuisine::Thai],
            WEIGHT_CAP
        );
    }

    #[test]
    fn test_like_boosts_that_records_cuisines() {
        let registry = SessionRegistry::new(1800);
        let (token, _) = registry.start(request(), pool());

        let feedback = SessionFeedback {
            liked_ids: vec!["r-thai".to_string()],
            ..Default::default()
        };
        let (_, ranked) = registry.feedback(&token, &feedback).unwrap();
        assert_eq!(ranked[0].restaurant.name, "Thai Place");
    }

    #[test]
    fn test_unknown_token_is_not_found() {
        let registry = SessionRegistry::new(1800);
        let err = registry
            .feedback("nope", &SessionFeedback::default())
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_expired_session_is_not_found() {
        let registry = SessionRegistry::new(0);
        let (token, _) = registry.start(request(), pool());
        std::thread::sleep(Duration::from_millis(5));
        let err = registry
            .feedback(&token, &SessionFeedback::default())
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_end_is_idempotent() {
        let registry = SessionRegistry::new(1800);
        let (token, _) = registry.start(request(), pool());
        assert!(registry.end(&token));
        assert!(!registry.end(&token));
        assert_eq!(registry.active_count(), 0);
    }
}

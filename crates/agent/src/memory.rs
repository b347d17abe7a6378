//! Session memory.
//!
//! A process-wide map from session id to per-session state. Operations
//! on a single session are serialised through that session's async
//! mutex; operations across sessions proceed in parallel. Idle sessions
//! are evicted opportunistically on each create/update sweep; a session
//! whose lock is held by an in-flight turn is skipped for that sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};

use kopibot_core::{
    BudgetRange, CapacityBand, Feature, Intent, Material, Outlet, Product, Turn,
};

use kopibot_config::constants::session as caps;

/// Structured user preferences accumulated across turns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Preferences {
    pub materials: std::collections::BTreeSet<Material>,
    pub features: std::collections::BTreeSet<Feature>,
    pub capacity: Option<CapacityBand>,
}

/// Snapshot captured on a topic switch, recalled on an explicit
/// "back to earlier" request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContextSnapshot {
    pub last_intent: Option<Intent>,
    pub last_shown_products: Vec<Product>,
    pub last_shown_outlets: Vec<Outlet>,
    pub preferred_location: Option<String>,
    pub budget_range: Option<BudgetRange>,
    pub preferences: Preferences,
}

/// Mutable per-session state. Only the engine mutates this, under the
/// session's lock.
#[derive(Debug, Default, Serialize)]
pub struct SessionState {
    pub history: Vec<Turn>,
    pub last_intent: Option<Intent>,
    pub last_shown_products: Vec<Product>,
    pub last_shown_outlets: Vec<Outlet>,
    pub preferred_location: Option<String>,
    pub current_context_location: Option<String>,
    pub budget_range: Option<BudgetRange>,
    pub preferences: Preferences,
    pub context_entities: Vec<String>,
    pub saved_context: Option<ContextSnapshot>,
}

impl SessionState {
    /// Append a turn, dropping the oldest beyond the cap.
    pub fn push_turn(&mut self, turn: Turn) {
        self.history.push(turn);
        if self.history.len() > caps::HISTORY_CAP {
            let excess = self.history.len() - caps::HISTORY_CAP;
            self.history.drain(..excess);
        }
    }

    /// Most-recent-wins bounded list of shown products.
    pub fn remember_products(&mut self, products: &[Product]) {
        if products.is_empty() {
            return;
        }
        self.last_shown_products = products.iter().take(caps::SHOWN_CAP).cloned().collect();
    }

    pub fn remember_outlets(&mut self, outlets: &[Outlet]) {
        if outlets.is_empty() {
            return;
        }
        self.last_shown_outlets = outlets.iter().take(caps::SHOWN_CAP).cloned().collect();
    }

    /// Append entities mentioned this turn, bounded, de-duplicated.
    pub fn remember_entities<I: IntoIterator<Item = String>>(&mut self, entities: I) {
        for entity in entities {
            if !self.context_entities.contains(&entity) {
                self.context_entities.push(entity);
            }
        }
        if self.context_entities.len() > caps::ENTITY_CAP {
            let excess = self.context_entities.len() - caps::ENTITY_CAP;
            self.context_entities.drain(..excess);
        }
    }

    /// Capture the current context before switching topic families.
    pub fn save_snapshot(&mut self) {
        self.saved_context = Some(ContextSnapshot {
            last_intent: self.last_intent,
            last_shown_products: self.last_shown_products.clone(),
            last_shown_outlets: self.last_shown_outlets.clone(),
            preferred_location: self.preferred_location.clone(),
            budget_range: self.budget_range,
            preferences: self.preferences.clone(),
        });
    }
}

/// One session: the id, the serialising lock, and the activity stamp
/// kept outside the lock so eviction can read it without contention.
pub struct SessionHandle {
    pub id: String,
    state: Mutex<SessionState>,
    updated_at: RwLock<DateTime<Utc>>,
}

impl SessionHandle {
    fn new(id: String) -> Self {
        Self {
            id,
            state: Mutex::new(SessionState::default()),
            updated_at: RwLock::new(Utc::now()),
        }
    }

    /// Serialise per-session work. Concurrent turns on the same session
    /// observe either the pre- or post-state of each other, never a
    /// partial write.
    pub async fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().await
    }

    pub fn touch(&self) {
        *self.updated_at.write() = Utc::now();
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        *self.updated_at.read()
    }

    fn is_expired(&self, timeout: Duration) -> bool {
        let idle = Utc::now().signed_duration_since(self.updated_at());
        idle.to_std().map_or(false, |idle| idle > timeout)
    }

    #[cfg(test)]
    pub fn backdate(&self, by: Duration) {
        *self.updated_at.write() =
            Utc::now() - chrono::Duration::from_std(by).expect("duration in range");
    }
}

/// The process-wide session store (C6).
pub struct SessionMemory {
    sessions: DashMap<String, Arc<SessionHandle>>,
    timeout: Duration,
}

impl SessionMemory {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            timeout,
        }
    }

    /// Look up or lazily create a session. Runs the eviction sweep
    /// first, so an expired id comes back as a fresh session.
    pub fn get_or_create(&self, session_id: Option<&str>) -> Arc<SessionHandle> {
        self.evict_expired();

        let id = match session_id {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };

        self.sessions
            .entry(id.clone())
            .or_insert_with(|| {
                tracing::debug!(session_id = %id, "session created");
                Arc::new(SessionHandle::new(id.clone()))
            })
            .clone()
    }

    /// Read-only lookup; never creates.
    pub fn get(&self, session_id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.get(session_id).map(|s| s.clone())
    }

    /// O(n) sweep over sessions; n is small in practice. Sessions with
    /// a held lock are in-flight and skipped this sweep.
    pub fn evict_expired(&self) {
        let timeout = self.timeout;
        self.sessions.retain(|id, handle| {
            if !handle.is_expired(timeout) {
                return true;
            }
            match handle.state.try_lock() {
                Ok(_guard) => {
                    tracing::info!(session_id = %id, "session evicted after idle timeout");
                    false
                }
                // A turn is mid-flight; let the next sweep catch it.
                Err(_) => true,
            }
        });
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kopibot_core::TurnRole;

    fn memory() -> SessionMemory {
        SessionMemory::new(Duration::from_secs(2 * 60 * 60))
    }

    #[tokio::test]
    async fn creates_lazily_and_reuses() {
        let memory = memory();
        let a = memory.get_or_create(Some("alpha"));
        let b = memory.get_or_create(Some("alpha"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(memory.len(), 1);
    }

    #[tokio::test]
    async fn generates_id_when_absent() {
        let memory = memory();
        let a = memory.get_or_create(None);
        let b = memory.get_or_create(None);
        assert_ne!(a.id, b.id);
        assert_eq!(memory.len(), 2);
    }

    #[tokio::test]
    async fn history_is_capped_oldest_dropped() {
        let memory = memory();
        let session = memory.get_or_create(Some("s"));
        let mut state = session.lock().await;
        for i in 0..15 {
            state.push_turn(Turn::user(format!("message {}", i)));
        }
        assert_eq!(state.history.len(), 10);
        assert_eq!(state.history[0].text, "message 5");
        assert_eq!(state.history[0].role, TurnRole::User);
    }

    #[tokio::test]
    async fn shown_lists_are_bounded_most_recent_wins() {
        let memory = memory();
        let session = memory.get_or_create(Some("s"));
        let mut state = session.lock().await;

        let product = |name: &str| Product {
            name: name.to_string(),
            price: "RM 10.00".to_string(),
            numeric_price: 10.0,
            regular_price: None,
            category: String::new(),
            description: None,
            capacity: None,
            material: Material::Other,
            colors: vec![],
            features: vec![],
            collection: None,
            promotion: None,
            on_sale: false,
        };

        let first: Vec<Product> = (0..8).map(|i| product(&format!("p{}", i))).collect();
        state.remember_products(&first);
        assert_eq!(state.last_shown_products.len(), 5);

        let second = vec![product("newest")];
        state.remember_products(&second);
        assert_eq!(state.last_shown_products.len(), 1);
        assert_eq!(state.last_shown_products[0].name, "newest");

        // An empty result never clobbers the remembered list.
        state.remember_products(&[]);
        assert_eq!(state.last_shown_products.len(), 1);
    }

    #[tokio::test]
    async fn entities_are_bounded() {
        let memory = memory();
        let session = memory.get_or_create(Some("s"));
        let mut state = session.lock().await;
        state.remember_entities((0..30).map(|i| format!("entity-{}", i)));
        assert_eq!(state.context_entities.len(), 20);
        assert_eq!(state.context_entities[0], "entity-10");
    }

    #[tokio::test]
    async fn expired_sessions_become_unreachable() {
        let memory = memory();
        let session = memory.get_or_create(Some("old"));
        session.backdate(Duration::from_secs(3 * 60 * 60));

        memory.evict_expired();
        assert!(memory.get("old").is_none());

        // Recreated fresh on next use.
        let fresh = memory.get_or_create(Some("old"));
        assert!(fresh.lock().await.history.is_empty());
    }

    #[tokio::test]
    async fn in_flight_sessions_survive_the_sweep() {
        let memory = memory();
        let session = memory.get_or_create(Some("busy"));
        session.backdate(Duration::from_secs(3 * 60 * 60));

        let guard = session.lock().await;
        memory.evict_expired();
        assert!(memory.get("busy").is_some());
        drop(guard);

        memory.evict_expired();
        assert!(memory.get("busy").is_none());
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let memory = memory();
        let a = memory.get_or_create(Some("a"));
        let b = memory.get_or_create(Some("b"));

        a.lock().await.push_turn(Turn::user("only in a"));
        assert!(b.lock().await.history.is_empty());
    }

    #[tokio::test]
    async fn snapshot_round_trip() {
        let memory = memory();
        let session = memory.get_or_create(Some("s"));
        let mut state = session.lock().await;
        state.last_intent = Some(Intent::OutletSearch);
        state.preferred_location = Some("petaling jaya".to_string());
        state.save_snapshot();

        let snapshot = state.saved_context.as_ref().unwrap();
        assert_eq!(snapshot.last_intent, Some(Intent::OutletSearch));
        assert_eq!(
            snapshot.preferred_location.as_deref(),
            Some("petaling jaya")
        );
    }
}

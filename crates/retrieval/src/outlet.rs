//! Outlet query engine.
//!
//! Filters are applied conjunctively in a fixed order: city, service,
//! landmark, keyword. An empty intersection is never widened silently;
//! the result carries the echoed filters so the composer can report
//! exactly what failed to match. Filter inputs are opaque text matched
//! by predicate composition; no query language is ever constructed from
//! user input.

use std::path::Path;
use std::sync::Arc;

use chrono::Weekday;
use parking_lot::RwLock;

use kopibot_config::Vocabulary;
use kopibot_core::{DayHours, Outlet, OutletRegistry, ServiceTag, Slots, TimeQuery};

use crate::RetrievalError;

/// In-memory outlet registry backed by an immutable snapshot.
pub struct InMemoryOutletRegistry {
    outlets: RwLock<Arc<Vec<Outlet>>>,
}

impl InMemoryOutletRegistry {
    pub fn new(outlets: Vec<Outlet>) -> Result<Self, RetrievalError> {
        for outlet in &outlets {
            if outlet.name.is_empty() || outlet.address.is_empty() {
                return Err(RetrievalError::Invalid(format!(
                    "outlet '{}' is missing a name or address",
                    outlet.name
                )));
            }
        }
        Ok(Self {
            outlets: RwLock::new(Arc::new(outlets)),
        })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RetrievalError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let outlets: Vec<Outlet> = serde_json::from_str(&text)?;
        tracing::info!(
            path = %path.as_ref().display(),
            count = outlets.len(),
            "outlet registry loaded"
        );
        Self::new(outlets)
    }

    /// Publish a new snapshot.
    pub fn reload(&self, outlets: Vec<Outlet>) -> Result<(), RetrievalError> {
        for outlet in &outlets {
            if outlet.name.is_empty() || outlet.address.is_empty() {
                return Err(RetrievalError::Invalid(
                    "outlet missing a name or address".to_string(),
                ));
            }
        }
        *self.outlets.write() = Arc::new(outlets);
        Ok(())
    }
}

impl OutletRegistry for InMemoryOutletRegistry {
    fn all(&self) -> Arc<Vec<Outlet>> {
        self.outlets.read().clone()
    }
}

/// The filters that were actually applied, echoed back for composing
/// "no outlets match" replies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppliedFilters {
    pub cities: Vec<String>,
    pub services: Vec<ServiceTag>,
    pub landmarks: Vec<String>,
    pub keywords: Vec<String>,
    pub time_query: Option<TimeQuery>,
}

impl AppliedFilters {
    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
            && self.services.is_empty()
            && self.landmarks.is_empty()
            && self.keywords.is_empty()
    }

    /// Human-readable echo, e.g. "city: petaling jaya, service: dine-in".
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.cities.is_empty() {
            parts.push(format!("city: {}", self.cities.join("/")));
        }
        if !self.services.is_empty() {
            let labels: Vec<&str> = self.services.iter().map(|s| s.label()).collect();
            parts.push(format!("service: {}", labels.join("/")));
        }
        if !self.landmarks.is_empty() {
            parts.push(format!("landmark: {}", self.landmarks.join("/")));
        }
        if !self.keywords.is_empty() {
            parts.push(format!("keyword: {}", self.keywords.join("/")));
        }
        parts.join(", ")
    }
}

/// Result of one outlet query. `total` is the exact size of the filtered
/// set; `outlets` may be truncated for display.
#[derive(Debug, Clone)]
pub struct OutletQueryResult {
    pub outlets: Vec<Outlet>,
    pub total: usize,
    pub filters: AppliedFilters,
}

/// The outlet query engine (C3).
pub struct OutletEngine {
    registry: Arc<dyn OutletRegistry>,
    vocabulary: Arc<Vocabulary>,
}

impl OutletEngine {
    pub fn new(registry: Arc<dyn OutletRegistry>, vocabulary: Arc<Vocabulary>) -> Self {
        Self { registry, vocabulary }
    }

    /// Conjunctive filtered search. The display list is capped at `k`
    /// but `total` always reports the exact match count.
    pub fn search(&self, _query: &str, slots: &Slots, k: usize) -> OutletQueryResult {
        let snapshot = self.registry.all();

        let filters = AppliedFilters {
            cities: slots.locations.iter().cloned().collect(),
            services: slots.services.iter().copied().collect(),
            landmarks: slots.landmarks.iter().cloned().collect(),
            keywords: slots.keywords.clone(),
            time_query: slots.time_query,
        };

        let mut matched: Vec<&Outlet> = snapshot.iter().collect();

        if !filters.cities.is_empty() {
            let markers: Vec<String> = filters
                .cities
                .iter()
                .flat_map(|city| self.vocabulary.address_markers(city))
                .map(|m| m.to_lowercase())
                .collect();
            matched.retain(|o| {
                let address = o.address.to_lowercase();
                markers.iter().any(|m| address.contains(m))
            });
        }

        if !filters.services.is_empty() {
            matched.retain(|o| filters.services.iter().all(|s| o.services.contains(s)));
        }

        if !filters.landmarks.is_empty() {
            let markers: Vec<String> = filters
                .landmarks
                .iter()
                .flat_map(|landmark| self.vocabulary.landmark_markers(landmark))
                .map(|m| m.to_lowercase())
                .collect();
            matched.retain(|o| {
                let address = o.address.to_lowercase();
                markers.iter().any(|m| address.contains(m))
            });
        }

        if !filters.keywords.is_empty() {
            matched.retain(|o| {
                let haystack = format!(
                    "{} {}",
                    o.name.to_lowercase(),
                    o.address.to_lowercase()
                );
                filters.keywords.iter().any(|kw| haystack.contains(kw))
            });
        }

        let total = matched.len();
        let outlets: Vec<Outlet> = matched.into_iter().take(k).cloned().collect();

        tracing::debug!(
            total,
            displayed = outlets.len(),
            filters = %filters.describe(),
            "outlet search"
        );

        OutletQueryResult { outlets, total, filters }
    }

    /// Exact number of outlets matching the filters, independent of the
    /// display cap.
    pub fn count(&self, query: &str, slots: &Slots) -> usize {
        self.search(query, slots, usize::MAX).total
    }
}

/// Resolve an outlet's hours string for a given day.
pub fn hours_for_day(outlet: &Outlet, day: Weekday) -> Option<String> {
    outlet
        .opening_hours
        .as_ref()
        .and_then(|h| h.for_day(day))
        .map(str::to_string)
}

/// Opening/closing answer for time queries: the parsed clock when the
/// hours string is well-formed, otherwise the raw text verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum HoursAnswer {
    Parsed(DayHours),
    Verbatim(String),
    Unavailable,
}

pub fn resolve_hours(outlet: &Outlet, day: Weekday) -> HoursAnswer {
    match hours_for_day(outlet, day) {
        None => match &outlet.opening_hours {
            // A weekly map without today's entry still has something to show.
            Some(hours) => HoursAnswer::Verbatim(hours.display()),
            None => HoursAnswer::Unavailable,
        },
        Some(text) => match DayHours::parse(&text) {
            Some(parsed) => HoursAnswer::Parsed(parsed),
            None => HoursAnswer::Verbatim(text),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kopibot_core::OpeningHours;
    use std::collections::BTreeMap;

    fn outlet(name: &str, address: &str, services: &[ServiceTag]) -> Outlet {
        Outlet {
            name: name.to_string(),
            address: address.to_string(),
            opening_hours: Some(OpeningHours::Raw("09:00 - 22:00".to_string())),
            services: services.to_vec(),
        }
    }

    fn registry() -> Arc<InMemoryOutletRegistry> {
        Arc::new(
            InMemoryOutletRegistry::new(vec![
                outlet(
                    "KopiGo SS2",
                    "12, Jalan SS2/61, SS2, 47300 Petaling Jaya, Selangor",
                    &[ServiceTag::DineIn, ServiceTag::Takeaway],
                ),
                outlet(
                    "KopiGo Damansara Uptown",
                    "38, Jalan SS21/39, Damansara Utama, 47400 Petaling Jaya, Selangor",
                    &[ServiceTag::Takeaway, ServiceTag::Delivery],
                ),
                outlet(
                    "KopiGo Suria KLCC",
                    "Lot 421, Level 4, Suria KLCC, 50088 Kuala Lumpur",
                    &[ServiceTag::DineIn, ServiceTag::Wifi],
                ),
                outlet(
                    "KopiGo Shah Alam Drive-Thru",
                    "Persiaran Jubli Perak, Seksyen 17, 40200 Shah Alam, Selangor",
                    &[ServiceTag::DriveThru, ServiceTag::Takeaway],
                ),
            ])
            .unwrap(),
        )
    }

    fn engine() -> OutletEngine {
        OutletEngine::new(registry(), Arc::new(Vocabulary::default()))
    }

    fn slots_with_city(city: &str) -> Slots {
        let mut slots = Slots::default();
        slots.locations.insert(city.to_string());
        slots
    }

    #[test]
    fn city_filter_uses_address_markers() {
        let result = engine().search("outlets in petaling jaya", &slots_with_city("petaling jaya"), 10);
        assert!(result.total >= 2);
        assert!(result
            .outlets
            .iter()
            .all(|o| o.address.to_lowercase().contains("selangor")
                || o.address.to_lowercase().contains("petaling jaya")));
    }

    #[test]
    fn kl_alias_does_not_match_selangor() {
        let result = engine().search("outlets in kl", &slots_with_city("kuala lumpur"), 10);
        assert_eq!(result.total, 1);
        assert_eq!(result.outlets[0].name, "KopiGo Suria KLCC");
    }

    #[test]
    fn service_filter_is_conjunctive() {
        let mut slots = slots_with_city("petaling jaya");
        slots.services.insert(ServiceTag::DineIn);
        let result = engine().search("pj dine-in", &slots, 10);
        assert_eq!(result.total, 1);
        assert_eq!(result.outlets[0].name, "KopiGo SS2");
    }

    #[test]
    fn empty_intersection_is_reported_not_widened() {
        let mut slots = slots_with_city("putrajaya");
        slots.services.insert(ServiceTag::DriveThru);
        let result = engine().search("drive-thru in putrajaya", &slots, 10);
        assert_eq!(result.total, 0);
        assert!(result.outlets.is_empty());
        assert!(!result.filters.is_empty());
        assert!(result.filters.describe().contains("putrajaya"));
    }

    #[test]
    fn count_ignores_display_cap() {
        let e = engine();
        let slots = slots_with_city("selangor");
        let result = e.search("selangor outlets", &slots, 1);
        assert_eq!(result.outlets.len(), 1);
        assert!(result.total > 1);
        assert_eq!(e.count("selangor outlets", &slots), result.total);
    }

    #[test]
    fn landmark_filter_matches_addresses() {
        let mut slots = Slots::default();
        slots.landmarks.insert("klcc".to_string());
        let result = engine().search("near klcc", &slots, 10);
        assert_eq!(result.total, 1);
        assert_eq!(result.outlets[0].name, "KopiGo Suria KLCC");
    }

    #[test]
    fn unknown_location_keywords_filter_addresses() {
        let mut slots = Slots::default();
        slots.keywords = vec!["uptown".to_string()];
        let result = engine().search("outlet in uptown", &slots, 10);
        assert_eq!(result.total, 1);
        assert_eq!(result.outlets[0].name, "KopiGo Damansara Uptown");
    }

    #[test]
    fn keywords_are_conjunctive_with_other_filters() {
        // city AND service AND keyword, applied in order.
        let mut slots = slots_with_city("petaling jaya");
        slots.services.insert(ServiceTag::Takeaway);
        slots.keywords = vec!["uptown".to_string()];
        let result = engine().search("takeaway in pj uptown", &slots, 10);
        assert_eq!(result.total, 1);
        assert_eq!(result.outlets[0].name, "KopiGo Damansara Uptown");

        // A keyword that matches nothing empties the set even when the
        // earlier filters matched; no silent widening.
        slots.keywords = vec!["riverside".to_string()];
        let result = engine().search("takeaway in pj riverside", &slots, 10);
        assert_eq!(result.total, 0);
        assert!(!result.filters.is_empty());
    }

    #[test]
    fn hours_resolution_prefers_parsed() {
        let o = outlet("X", "Y street", &[]);
        match resolve_hours(&o, Weekday::Mon) {
            HoursAnswer::Parsed(hours) => {
                assert_eq!(hours.open, 9 * 60);
                assert_eq!(hours.close, 22 * 60);
            }
            other => panic!("expected parsed hours, got {:?}", other),
        }
    }

    #[test]
    fn unparsed_hours_are_verbatim() {
        let mut o = outlet("X", "Y street", &[]);
        o.opening_hours = Some(OpeningHours::Raw("open till late".to_string()));
        assert_eq!(
            resolve_hours(&o, Weekday::Mon),
            HoursAnswer::Verbatim("open till late".to_string())
        );

        o.opening_hours = None;
        assert_eq!(resolve_hours(&o, Weekday::Mon), HoursAnswer::Unavailable);
    }

    #[test]
    fn weekly_map_resolves_specific_day() {
        let mut map = BTreeMap::new();
        map.insert("monday".to_string(), "08:00 - 20:00".to_string());
        map.insert("tuesday".to_string(), "10:00 - 22:00".to_string());
        let mut o = outlet("X", "Y street", &[]);
        o.opening_hours = Some(OpeningHours::Weekly(map));

        match resolve_hours(&o, Weekday::Tue) {
            HoursAnswer::Parsed(hours) => assert_eq!(hours.open, 10 * 60),
            other => panic!("expected parsed hours, got {:?}", other),
        }
    }
}

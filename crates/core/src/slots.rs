//! Structured slots extracted from one utterance.
//!
//! All fields are optional. Absence does not imply wildcard: the planner
//! decides per intent whether to broaden or to ask a follow-up.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::outlet::ServiceTag;
use crate::product::{Collection, Feature, Material};

/// A recognised price constraint; either bound may be open.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BudgetRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl BudgetRange {
    pub fn below(max: f64) -> Self {
        Self { min: None, max: Some(max) }
    }

    pub fn above(min: f64) -> Self {
        Self { min: Some(min), max: None }
    }

    pub fn between(a: f64, b: f64) -> Self {
        Self { min: Some(a.min(b)), max: Some(a.max(b)) }
    }

    pub fn contains(&self, price: f64) -> bool {
        self.min.map_or(true, |min| price >= min) && self.max.map_or(true, |max| price <= max)
    }

    /// A range with `max < min` matches nothing; that is a valid empty
    /// result, not an error.
    pub fn is_satisfiable(&self) -> bool {
        match (self.min, self.max) {
            (Some(min), Some(max)) => max >= min,
            _ => true,
        }
    }
}

/// Coarse capacity bands mapped from capacity free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityBand {
    Small,
    Medium,
    Large,
}

impl CapacityBand {
    /// Band boundaries in millilitres.
    pub fn matches_ml(&self, ml: u32) -> bool {
        match self {
            CapacityBand::Small => ml < 400,
            CapacityBand::Medium => (400..650).contains(&ml),
            CapacityBand::Large => ml >= 650,
        }
    }
}

/// What the user wants to know about an outlet's hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeQuery {
    Opening,
    Closing,
    FullHours,
}

/// Extreme-of-set price queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Superlative {
    Cheapest,
    MostExpensive,
}

/// The options recognised in one utterance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Slots {
    /// Canonical city/area names (alias-resolved).
    #[serde(default)]
    pub locations: BTreeSet<String>,
    #[serde(default)]
    pub services: BTreeSet<ServiceTag>,
    #[serde(default)]
    pub materials: BTreeSet<Material>,
    #[serde(default)]
    pub features: BTreeSet<Feature>,
    #[serde(default)]
    pub collections: BTreeSet<Collection>,
    /// Mall/landmark names matched against outlet addresses.
    #[serde(default)]
    pub landmarks: BTreeSet<String>,
    #[serde(default)]
    pub capacity: Option<CapacityBand>,
    #[serde(default)]
    pub budget: Option<BudgetRange>,
    #[serde(default)]
    pub time_query: Option<TimeQuery>,
    #[serde(default)]
    pub superlative: Option<Superlative>,
    /// "the cheapest" asks for exactly one item.
    #[serde(default)]
    pub singular: bool,
    /// Planner-level "show all" override; suppresses filters for one turn.
    #[serde(default)]
    pub show_all: bool,
    /// Residual keywords after slot and stop-word removal.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Slots {
    /// True when nothing beyond residual keywords was recognised.
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
            && self.services.is_empty()
            && self.materials.is_empty()
            && self.features.is_empty()
            && self.collections.is_empty()
            && self.landmarks.is_empty()
            && self.capacity.is_none()
            && self.budget.is_none()
            && self.time_query.is_none()
            && self.superlative.is_none()
            && !self.show_all
    }

    /// True when any product-side filter is present.
    pub fn has_product_filters(&self) -> bool {
        !self.materials.is_empty()
            || !self.features.is_empty()
            || !self.collections.is_empty()
            || self.capacity.is_some()
            || self.budget.is_some()
            || self.superlative.is_some()
    }

    /// True when any outlet-side filter is present.
    pub fn has_outlet_filters(&self) -> bool {
        !self.locations.is_empty()
            || !self.services.is_empty()
            || !self.landmarks.is_empty()
            || self.time_query.is_some()
    }
}

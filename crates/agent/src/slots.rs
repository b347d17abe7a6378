//! Slot extraction.
//!
//! Runs after classification and fills the structured [`Slots`] record:
//! one lookup table per slot family, consulted in a defined order
//! (locations, services, materials, features, collections, landmarks,
//! capacity, budget, time query, superlatives), then residual keywords.
//! Unknown locations fall through as keywords so the outlet engine can
//! still match them against addresses.

use std::collections::BTreeSet;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use kopibot_config::Vocabulary;
use kopibot_core::{BudgetRange, CapacityBand, Slots, Superlative, TimeQuery};

static UNDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:under|below|less\s+than|cheaper\s+than|lower\s+than|<)\s*(?:rm\s*)?(\d+(?:\.\d+)?)",
    )
    .unwrap()
});
static OVER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:above|over|more\s+than|higher\s+than|>)\s*(?:rm\s*)?(\d+(?:\.\d+)?)").unwrap()
});
static BETWEEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:between\s+(?:rm\s*)?(\d+(?:\.\d+)?)\s+and\s+(?:rm\s*)?(\d+(?:\.\d+)?)|rm\s*(\d+(?:\.\d+)?)\s*(?:to|-)\s*rm\s*(\d+(?:\.\d+)?))",
    )
    .unwrap()
});

static CAPACITY_ML: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*ml").unwrap());
static SMALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:small|mini|compact)\b").unwrap());
static MEDIUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:medium|regular)\b").unwrap());
static LARGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:large|big|tall|xl)\b").unwrap());

static CLOSING: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:close|closes|closing|shut)\b").unwrap());
static OPENING: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:open|opens|opening|start)\b").unwrap());
static FULL_HOURS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:hours?|schedule|timing)\b").unwrap());

static CHEAPEST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:cheapest|most\s+affordable|lowest\s+price[d]?|least\s+expensive)\b").unwrap()
});
static MOST_EXPENSIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:most\s+expensive|highest\s+price[d]?|priciest)\b").unwrap()
});
static PLURAL_NOUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:tumblers|mugs|cups|bottles|products|items|options|ones)\b").unwrap()
});

static SHOW_ALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:show\s+all|all\s+products|all\s+outlets|list\s+all|everything)\b").unwrap()
});
static PRICE_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:under|below|above|over|between|cheap|cheapest|expensive|price[ds]?|rm\s*\d)\b")
        .unwrap()
});

/// Words consumed by slot recognition; they never become keywords.
static NON_KEYWORDS: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    [
        "rm", "under", "below", "above", "over", "between", "less", "more", "than",
        "cheapest", "cheap", "cheaper", "expensive", "affordable", "premium", "most",
        "least", "lowest", "highest", "priciest", "price", "priced", "prices", "cost",
        "costs", "open", "opens", "opening", "close", "closes", "closing", "shut",
        "hour", "hours", "schedule", "timing", "start", "all", "list", "everything",
        "small", "mini", "compact", "medium", "regular", "large", "big", "tall",
    ]
    .into_iter()
    .collect()
});

/// Intent-marker nouns that match nothing in the data. "tumbler" is a
/// real filter term; "products" and "outlet" are only signals of what
/// the user is asking about.
static GENERIC_NOUNS: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    [
        "product", "products", "item", "items", "merchandise", "drinkware",
        "collection", "collections", "outlet", "outlets", "store", "stores",
        "branch", "branches", "location", "locations", "cafe", "shop", "shops",
    ]
    .into_iter()
    .collect()
});

pub struct SlotExtractor {
    vocabulary: Arc<Vocabulary>,
}

impl SlotExtractor {
    pub fn new(vocabulary: Arc<Vocabulary>) -> Self {
        Self { vocabulary }
    }

    pub fn extract(&self, utterance: &str) -> Slots {
        let text = utterance.trim().to_lowercase();
        let mut slots = Slots::default();

        slots.locations = self.vocabulary.find_cities(&text);
        slots.services = self.vocabulary.find_services(&text);
        slots.materials = self.vocabulary.find_materials(&text);
        slots.features = self.vocabulary.find_features(&text);
        slots.collections = self.vocabulary.find_collections(&text);
        slots.landmarks = self.vocabulary.find_landmarks(&text);

        slots.capacity = extract_capacity(&text);
        slots.budget = extract_budget(&text);
        slots.time_query = extract_time_query(&text);

        if CHEAPEST.is_match(&text) {
            slots.superlative = Some(Superlative::Cheapest);
        } else if MOST_EXPENSIVE.is_match(&text) {
            slots.superlative = Some(Superlative::MostExpensive);
        }
        // "the cheapest mug" asks for one; "cheapest tumblers" for a list.
        slots.singular = slots.superlative.is_some() && !PLURAL_NOUN.is_match(&text);

        slots.show_all = SHOW_ALL.is_match(&text) && !PRICE_WORDS.is_match(&text);

        slots.keywords = self.residual_keywords(&text, &slots);

        tracing::trace!(?slots, "slots extracted");
        slots
    }

    /// Tokens left after stop words, digits, and everything an alias
    /// table already consumed.
    fn residual_keywords(&self, text: &str, slots: &Slots) -> Vec<String> {
        let mut consumed: BTreeSet<String> = BTreeSet::new();

        let mut eat = |alias: &str| {
            for word in alias.unicode_words() {
                consumed.insert(word.to_lowercase());
            }
        };

        for (material, aliases) in &self.vocabulary.materials {
            if slots.materials.contains(material) {
                aliases.iter().for_each(|a| eat(a));
            }
        }
        for (feature, aliases) in &self.vocabulary.features {
            if slots.features.contains(feature) {
                aliases.iter().for_each(|a| eat(a));
            }
        }
        for (collection, aliases) in &self.vocabulary.collections {
            if slots.collections.contains(collection) {
                aliases.iter().for_each(|a| eat(a));
            }
        }
        for (service, aliases) in &self.vocabulary.services {
            if slots.services.contains(service) {
                aliases.iter().for_each(|a| eat(a));
            }
        }
        for (city, aliases) in &self.vocabulary.cities {
            if slots.locations.contains(city) {
                aliases.iter().for_each(|a| eat(a));
            }
        }
        for (landmark, aliases) in &self.vocabulary.landmarks {
            if slots.landmarks.contains(landmark) {
                aliases.iter().for_each(|a| eat(a));
            }
        }

        let mut keywords = Vec::new();
        for word in text.unicode_words() {
            let word = word.to_lowercase();
            if word.len() <= 2
                || word.chars().all(|c| c.is_ascii_digit())
                || self.vocabulary.is_stop_word(&word)
                || NON_KEYWORDS.contains(word.as_str())
                || GENERIC_NOUNS.contains(word.as_str())
                || consumed.contains(&word)
                || keywords.contains(&word)
            {
                continue;
            }
            keywords.push(word);
        }
        keywords
    }
}

fn extract_capacity(text: &str) -> Option<CapacityBand> {
    if let Some(caps) = CAPACITY_ML.captures(text) {
        let ml: f64 = caps.get(1)?.as_str().parse().ok()?;
        let ml = ml as u32;
        for band in [CapacityBand::Small, CapacityBand::Medium, CapacityBand::Large] {
            if band.matches_ml(ml) {
                return Some(band);
            }
        }
    }
    if SMALL.is_match(text) {
        Some(CapacityBand::Small)
    } else if LARGE.is_match(text) {
        Some(CapacityBand::Large)
    } else if MEDIUM.is_match(text) {
        Some(CapacityBand::Medium)
    } else {
        None
    }
}

fn extract_budget(text: &str) -> Option<BudgetRange> {
    if let Some(caps) = BETWEEN.captures(text) {
        let (a, b) = if let (Some(a), Some(b)) = (caps.get(1), caps.get(2)) {
            (a.as_str(), b.as_str())
        } else {
            (caps.get(3)?.as_str(), caps.get(4)?.as_str())
        };
        let a: f64 = a.parse().ok()?;
        let b: f64 = b.parse().ok()?;
        return Some(BudgetRange::between(a, b));
    }
    if let Some(caps) = UNDER.captures(text) {
        return Some(BudgetRange::below(caps.get(1)?.as_str().parse().ok()?));
    }
    if let Some(caps) = OVER.captures(text) {
        return Some(BudgetRange::above(caps.get(1)?.as_str().parse().ok()?));
    }
    None
}

fn extract_time_query(text: &str) -> Option<TimeQuery> {
    if CLOSING.is_match(text) {
        Some(TimeQuery::Closing)
    } else if OPENING.is_match(text) {
        Some(TimeQuery::Opening)
    } else if FULL_HOURS.is_match(text) {
        Some(TimeQuery::FullHours)
    } else {
        None
    }
}

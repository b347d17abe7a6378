//! Closed-vocabulary alias tables.
//!
//! One lookup table per slot family, consulted in a defined order by the
//! slot extractor and the outlet engine. Aliases map surface forms to the
//! canonical tokens of `kopibot-core`; cities additionally carry the
//! address markers used when filtering outlets ("pj" queries must match
//! addresses that only say "Selangor").
//!
//! Defaults are compiled in; a YAML file with the same shape may replace
//! any table wholesale.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use kopibot_core::{Collection, Feature, Material, ServiceTag};

use crate::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocabulary {
    /// Material aliases, e.g. "steel" and "metal" resolve to stainless-steel.
    pub materials: BTreeMap<Material, Vec<String>>,
    pub features: BTreeMap<Feature, Vec<String>>,
    pub collections: BTreeMap<Collection, Vec<String>>,
    pub services: BTreeMap<ServiceTag, Vec<String>>,
    /// Canonical city name -> spoken aliases ("kl" -> kuala lumpur).
    pub cities: BTreeMap<String, Vec<String>>,
    /// Canonical city name -> substrings that identify it in addresses.
    pub city_address_markers: BTreeMap<String, Vec<String>>,
    /// Mall/landmark name -> aliases, matched against addresses.
    pub landmarks: BTreeMap<String, Vec<String>>,
    /// Catalogue nouns that identify product talk.
    pub product_nouns: Vec<String>,
    /// Nouns that identify outlet talk.
    pub outlet_nouns: Vec<String>,
    /// Dropped before residual keywords are collected.
    pub stop_words: BTreeSet<String>,
    /// Topics the assistant declines to answer (out of domain).
    pub off_topic: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        fn strs(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }

        let mut materials = BTreeMap::new();
        materials.insert(
            Material::StainlessSteel,
            strs(&["stainless steel", "stainless", "steel", "metal"]),
        );
        materials.insert(Material::Ceramic, strs(&["ceramic", "porcelain"]));
        materials.insert(Material::Acrylic, strs(&["acrylic", "plastic"]));
        materials.insert(Material::Glass, strs(&["glass"]));

        let mut features = BTreeMap::new();
        features.insert(
            Feature::LeakProof,
            strs(&["leak-proof", "leak proof", "leakproof", "spill-resistant"]),
        );
        features.insert(
            Feature::DishwasherSafe,
            strs(&["dishwasher safe", "dishwasher-safe"]),
        );
        features.insert(
            Feature::MicrowaveSafe,
            strs(&["microwave safe", "microwave-safe", "microwavable"]),
        );
        features.insert(
            Feature::DoubleWallInsulation,
            strs(&["double wall", "double-wall", "insulated", "insulation", "thermal"]),
        );
        features.insert(Feature::ScrewOnLid, strs(&["screw-on lid", "screw on lid"]));
        features.insert(
            Feature::CarCupHolder,
            strs(&["car cup holder", "cup holder", "car-friendly"]),
        );

        let mut collections = BTreeMap::new();
        collections.insert(Collection::Sundaze, strs(&["sundaze", "sun daze"]));
        collections.insert(Collection::Aqua, strs(&["aqua"]));
        collections.insert(Collection::Mountain, strs(&["mountain"]));
        collections.insert(
            Collection::CorakMalaysia,
            strs(&["corak malaysia", "corak"]),
        );
        collections.insert(
            Collection::KopiPatahHati,
            strs(&["kopi patah hati", "patah hati"]),
        );
        collections.insert(Collection::Og, strs(&["og"]));
        collections.insert(Collection::Frozee, strs(&["frozee"]));
        collections.insert(Collection::AllCan, strs(&["all-can", "all can"]));

        let mut services = BTreeMap::new();
        services.insert(
            ServiceTag::DineIn,
            strs(&["dine-in", "dine in", "eat in", "dining"]),
        );
        services.insert(
            ServiceTag::Takeaway,
            strs(&["takeaway", "take away", "pickup", "take out"]),
        );
        services.insert(
            ServiceTag::Delivery,
            strs(&["delivery", "deliver", "food delivery"]),
        );
        services.insert(
            ServiceTag::DriveThru,
            strs(&["drive-thru", "drive thru", "drive through"]),
        );
        services.insert(
            ServiceTag::Wifi,
            strs(&["wifi", "wi-fi", "internet", "wireless"]),
        );
        services.insert(
            ServiceTag::TwentyFourHour,
            strs(&["24 hours", "24/7", "24-hour", "24 hour", "all night"]),
        );

        let mut cities = BTreeMap::new();
        cities.insert(
            "kuala lumpur".to_string(),
            strs(&[
                "kuala lumpur",
                "kl",
                "klcc",
                "kl sentral",
                "bangsar",
                "cheras",
                "sentul",
                "wangsa maju",
                "setapak",
                "mont kiara",
                "bukit bintang",
            ]),
        );
        cities.insert(
            "petaling jaya".to_string(),
            strs(&["petaling jaya", "pj", "ss2", "ss15", "damansara"]),
        );
        cities.insert(
            "selangor".to_string(),
            strs(&["selangor", "shah alam", "subang", "klang", "puchong", "sunway"]),
        );
        cities.insert("putrajaya".to_string(), strs(&["putrajaya"]));
        cities.insert("johor".to_string(), strs(&["johor", "johor bahru", "jb"]));

        let mut city_address_markers = BTreeMap::new();
        city_address_markers.insert(
            "kuala lumpur".to_string(),
            strs(&[
                "kuala lumpur",
                "wilayah persekutuan",
                " kl ",
                "klcc",
                "kl sentral",
                "kl eco city",
                "kl gateway",
            ]),
        );
        // PJ addresses frequently say only "Selangor"; keep both markers so
        // a "pj" query still finds them.
        city_address_markers.insert(
            "petaling jaya".to_string(),
            strs(&["petaling jaya", " pj", "ss2", "ss15", "damansara", "selangor"]),
        );
        city_address_markers.insert(
            "selangor".to_string(),
            strs(&["selangor", "shah alam", "petaling jaya", "subang", "klang", "puchong"]),
        );
        city_address_markers.insert("putrajaya".to_string(), strs(&["putrajaya"]));
        city_address_markers.insert("johor".to_string(), strs(&["johor"]));

        let mut landmarks = BTreeMap::new();
        landmarks.insert(
            "mid valley".to_string(),
            strs(&["mid valley", "midvalley", "megamall"]),
        );
        landmarks.insert("pavilion".to_string(), strs(&["pavilion"]));
        landmarks.insert("klcc".to_string(), strs(&["klcc", "suria klcc"]));
        landmarks.insert("aeon".to_string(), strs(&["aeon"]));
        landmarks.insert("avenue k".to_string(), strs(&["avenue k"]));
        landmarks.insert("sunway".to_string(), strs(&["sunway", "sunway pyramid"]));
        landmarks.insert("one utama".to_string(), strs(&["one utama", "1 utama"]));

        Self {
            materials,
            features,
            collections,
            services,
            cities,
            city_address_markers,
            landmarks,
            product_nouns: strs(&[
                "product",
                "products",
                "tumbler",
                "tumblers",
                "cup",
                "cups",
                "mug",
                "mugs",
                "bottle",
                "bottles",
                "flask",
                "drinkware",
                "cold cup",
                "merchandise",
                "item",
                "items",
                "collection",
            ]),
            outlet_nouns: strs(&[
                "outlet",
                "outlets",
                "store",
                "stores",
                "branch",
                "branches",
                "location",
                "locations",
                "cafe",
                "shop",
            ]),
            stop_words: [
                "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of",
                "with", "by", "is", "are", "does", "do", "what", "when", "where", "how",
                "any", "there", "you", "your", "have", "has", "me", "my", "i", "can",
                "show", "find", "please", "many", "much", "near", "nearest", "nearby",
                "they", "them", "those", "that", "this", "it", "which", "who", "will",
                "would", "could", "should", "want", "need", "get", "give", "looking",
                "sell", "sells", "buy", "available",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            off_topic: strs(&[
                "weather",
                "politics",
                "sports",
                "news",
                "movie",
                "music",
                "game",
                "recipe",
                "cooking",
                "brewing method",
                "how to make coffee",
                "travel",
                "homework",
                "dating",
                "fashion",
                "insurance",
                "medicine",
                "doctor",
                "hospital",
                "nutrition",
                "calories",
                "caffeine content",
                "customer service",
                "customer support",
                "helpline",
                "headquarters",
                "starbucks",
                "costa coffee",
            ]),
        }
    }
}

/// Whole-word containment check. Short aliases ("kl", "pj", "og") only
/// match between non-alphanumeric boundaries so "kl" never fires inside
/// "weekly"; longer aliases match as plain substrings, the way the
/// address data is actually written.
pub fn contains_term(text: &str, term: &str) -> bool {
    if term.len() > 3 {
        return text.contains(term);
    }
    let bytes = text.as_bytes();
    let mut start = 0;
    while let Some(pos) = text[start..].find(term) {
        let begin = start + pos;
        let end = begin + term.len();
        let left_ok = begin == 0 || !(bytes[begin - 1] as char).is_alphanumeric();
        let right_ok = end == bytes.len() || !(bytes[end] as char).is_alphanumeric();
        if left_ok && right_ok {
            return true;
        }
        start = begin + 1;
    }
    false
}

impl Vocabulary {
    /// Load a vocabulary override from YAML.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let vocab: Vocabulary = serde_yaml::from_str(&text)?;
        tracing::info!(path = %path.as_ref().display(), "vocabulary loaded from file");
        Ok(vocab)
    }

    pub fn find_materials(&self, text: &str) -> BTreeSet<Material> {
        find_tagged(&self.materials, text)
    }

    pub fn find_features(&self, text: &str) -> BTreeSet<Feature> {
        find_tagged(&self.features, text)
    }

    pub fn find_collections(&self, text: &str) -> BTreeSet<Collection> {
        find_tagged(&self.collections, text)
    }

    pub fn find_services(&self, text: &str) -> BTreeSet<ServiceTag> {
        find_tagged(&self.services, text)
    }

    /// Canonical city names mentioned in the text.
    pub fn find_cities(&self, text: &str) -> BTreeSet<String> {
        self.cities
            .iter()
            .filter(|(_, aliases)| aliases.iter().any(|a| contains_term(text, a)))
            .map(|(canonical, _)| canonical.clone())
            .collect()
    }

    /// Canonical landmark names mentioned in the text.
    pub fn find_landmarks(&self, text: &str) -> BTreeSet<String> {
        self.landmarks
            .iter()
            .filter(|(_, aliases)| aliases.iter().any(|a| contains_term(text, a)))
            .map(|(canonical, _)| canonical.clone())
            .collect()
    }

    /// Address substrings identifying a canonical city. Falls back to the
    /// city name itself for cities without a marker table.
    pub fn address_markers(&self, city: &str) -> Vec<String> {
        self.city_address_markers
            .get(city)
            .cloned()
            .unwrap_or_else(|| vec![city.to_string()])
    }

    /// Aliases identifying a landmark inside an address.
    pub fn landmark_markers(&self, landmark: &str) -> Vec<String> {
        self.landmarks
            .get(landmark)
            .cloned()
            .unwrap_or_else(|| vec![landmark.to_string()])
    }

    pub fn mentions_product_noun(&self, text: &str) -> bool {
        self.product_nouns.iter().any(|n| contains_term(text, n))
    }

    pub fn mentions_outlet_noun(&self, text: &str) -> bool {
        self.outlet_nouns.iter().any(|n| contains_term(text, n))
    }

    pub fn is_off_topic(&self, text: &str) -> bool {
        self.off_topic.iter().any(|t| contains_term(text, t))
    }

    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.contains(word)
    }
}

fn find_tagged<T: Copy + Ord>(table: &BTreeMap<T, Vec<String>>, text: &str) -> BTreeSet<T> {
    table
        .iter()
        .filter(|(_, aliases)| aliases.iter().any(|a| contains_term(text, a)))
        .map(|(tag, _)| *tag)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_aliases_need_word_boundaries() {
        assert!(contains_term("outlets in kl please", "kl"));
        assert!(!contains_term("weekly update", "kl"));
        assert!(contains_term("near pj?", "pj"));
        assert!(!contains_term("pjs are comfy", "pj"));
    }

    #[test]
    fn material_aliases_resolve() {
        let vocab = Vocabulary::default();
        let found = vocab.find_materials("any steel tumbler?");
        assert!(found.contains(&Material::StainlessSteel));
        let found = vocab.find_materials("porcelain mug");
        assert!(found.contains(&Material::Ceramic));
    }

    #[test]
    fn city_aliases_resolve_to_canonical() {
        let vocab = Vocabulary::default();
        assert!(vocab.find_cities("outlets in kl").contains("kuala lumpur"));
        assert!(vocab.find_cities("near ss2").contains("petaling jaya"));
        assert!(vocab.find_cities("anything in shah alam").contains("selangor"));
    }

    #[test]
    fn pj_markers_cover_selangor_addresses() {
        let vocab = Vocabulary::default();
        let markers = vocab.address_markers("petaling jaya");
        assert!(markers.iter().any(|m| m == "selangor"));
    }

    #[test]
    fn off_topic_detection() {
        let vocab = Vocabulary::default();
        assert!(vocab.is_off_topic("what's the weather today"));
        assert!(!vocab.is_off_topic("cheapest tumbler"));
    }

    #[test]
    fn yaml_round_trip() {
        let vocab = Vocabulary::default();
        let yaml = serde_yaml::to_string(&vocab).unwrap();
        let parsed: Vocabulary = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.find_cities("kl"), vocab.find_cities("kl"));
    }
}

//! Product catalogue types.
//!
//! Products are read-only snapshots loaded once at startup. Material,
//! feature, and collection tokens are closed vocabularies so that
//! slot-based filtering is total: an unrecognised token deserialises to
//! the `Other` variant instead of failing the whole catalogue load.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Closed material vocabulary. Unknown tokens in catalogue data fold
/// into `Other` instead of failing the whole load.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case", from = "String")]
pub enum Material {
    StainlessSteel,
    Ceramic,
    Acrylic,
    Glass,
    Other,
}

impl From<String> for Material {
    fn from(token: String) -> Self {
        match token.to_lowercase().as_str() {
            "stainless-steel" | "stainless steel" => Material::StainlessSteel,
            "ceramic" => Material::Ceramic,
            "acrylic" => Material::Acrylic,
            "glass" => Material::Glass,
            _ => Material::Other,
        }
    }
}

impl Material {
    /// Human-readable label for composed replies.
    pub fn label(&self) -> &'static str {
        match self {
            Material::StainlessSteel => "Stainless Steel",
            Material::Ceramic => "Ceramic",
            Material::Acrylic => "Acrylic",
            Material::Glass => "Glass",
            Material::Other => "Other",
        }
    }
}

/// Closed feature vocabulary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case", from = "String")]
pub enum Feature {
    LeakProof,
    DishwasherSafe,
    MicrowaveSafe,
    DoubleWallInsulation,
    ScrewOnLid,
    CarCupHolder,
    Other,
}

impl From<String> for Feature {
    fn from(token: String) -> Self {
        match token.to_lowercase().as_str() {
            "leak-proof" | "leak proof" | "leakproof" => Feature::LeakProof,
            "dishwasher-safe" | "dishwasher safe" => Feature::DishwasherSafe,
            "microwave-safe" | "microwave safe" => Feature::MicrowaveSafe,
            "double-wall-insulation" | "double wall insulation" | "double-wall" => {
                Feature::DoubleWallInsulation
            }
            "screw-on-lid" | "screw-on lid" => Feature::ScrewOnLid,
            "car-cup-holder" | "car cup holder" => Feature::CarCupHolder,
            _ => Feature::Other,
        }
    }
}

impl Feature {
    pub fn label(&self) -> &'static str {
        match self {
            Feature::LeakProof => "Leak-proof",
            Feature::DishwasherSafe => "Dishwasher-safe",
            Feature::MicrowaveSafe => "Microwave-safe",
            Feature::DoubleWallInsulation => "Double-wall insulation",
            Feature::ScrewOnLid => "Screw-on lid",
            Feature::CarCupHolder => "Car cup-holder friendly",
            Feature::Other => "Other",
        }
    }
}

/// Closed collection vocabulary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case", from = "String")]
pub enum Collection {
    Sundaze,
    Aqua,
    Mountain,
    CorakMalaysia,
    KopiPatahHati,
    Og,
    Frozee,
    AllCan,
    Other,
}

impl From<String> for Collection {
    fn from(token: String) -> Self {
        match token.to_lowercase().as_str() {
            "sundaze" => Collection::Sundaze,
            "aqua" => Collection::Aqua,
            "mountain" => Collection::Mountain,
            "corak-malaysia" | "corak malaysia" => Collection::CorakMalaysia,
            "kopi-patah-hati" | "kopi patah hati" => Collection::KopiPatahHati,
            "og" => Collection::Og,
            "frozee" => Collection::Frozee,
            "all-can" | "all can" => Collection::AllCan,
            _ => Collection::Other,
        }
    }
}

impl Collection {
    pub fn label(&self) -> &'static str {
        match self {
            Collection::Sundaze => "Sundaze",
            Collection::Aqua => "Aqua",
            Collection::Mountain => "Mountain",
            Collection::CorakMalaysia => "Corak Malaysia",
            Collection::KopiPatahHati => "Kopi Patah Hati",
            Collection::Og => "OG",
            Collection::Frozee => "Frozee",
            Collection::AllCan => "All-Can",
            Collection::Other => "Other",
        }
    }
}

/// A single catalogue entry.
///
/// `name` is the unique key; `price` is the display string (e.g.
/// "RM 55.00") while `numeric_price` is the canonical filterable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    /// Display price string, e.g. "RM 55.00".
    pub price: String,
    /// Numeric price in local currency.
    pub numeric_price: f64,
    /// Pre-discount price, if the product is discounted.
    #[serde(default)]
    pub regular_price: Option<f64>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Free-text capacity such as "500ml".
    #[serde(default)]
    pub capacity: Option<String>,
    #[serde(default = "default_material")]
    pub material: Material,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub collection: Option<Collection>,
    #[serde(default)]
    pub promotion: Option<String>,
    #[serde(default)]
    pub on_sale: bool,
}

fn default_material() -> Material {
    Material::Other
}

static CAPACITY_ML: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*ml").unwrap());

impl Product {
    /// Enforce the catalogue invariants.
    ///
    /// `numeric_price >= 0`, and when a regular price is present the
    /// current price must not exceed it.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.name.is_empty() {
            return Err(EngineError::Internal("product with empty name".into()));
        }
        if self.numeric_price < 0.0 || !self.numeric_price.is_finite() {
            return Err(EngineError::Internal(format!(
                "product '{}' has invalid price {}",
                self.name, self.numeric_price
            )));
        }
        if let Some(regular) = self.regular_price {
            if self.numeric_price > regular {
                return Err(EngineError::Internal(format!(
                    "product '{}' priced above its regular price",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// Parse the capacity free text into millilitres, when possible.
    pub fn capacity_ml(&self) -> Option<u32> {
        let text = self.capacity.as_deref()?;
        let caps = CAPACITY_ML.captures(text)?;
        caps.get(1)?.as_str().parse::<f64>().ok().map(|v| v as u32)
    }
}

/// Parse a display price string such as "RM 55.00" or "RM1,050" into a
/// numeric value. Returns `None` when no parseable amount is present.
pub fn parse_price_string(price: &str) -> Option<f64> {
    static AMOUNT: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(\d+(?:,\d{3})*(?:\.\d+)?)").unwrap());
    let caps = AMOUNT.captures(price)?;
    caps.get(1)?.as_str().replace(',', "").parse::<f64>().ok()
}

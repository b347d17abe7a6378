//! Product retriever.
//!
//! Retrieval is a cascade: structured filters over the closed-vocabulary
//! slots, an optional semantic rank from an injected index, lexical
//! matching over name/description/attributes, and a fuzzy token-sort
//! fallback for typos. Results are de-duplicated by product name,
//! preserving first occurrence, and general category queries keep
//! catalogue order.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use kopibot_config::constants::retrieval as consts;
use kopibot_core::{parse_price_string, Product, ProductIndex, SemanticIndex, Slots, Superlative};

use crate::fuzzy::token_sort_ratio;
use crate::RetrievalError;

/// In-memory product index backed by an immutable snapshot.
///
/// `reload` publishes a new snapshot atomically; readers keep whatever
/// `Arc` they already cloned for the duration of their turn.
pub struct InMemoryProductIndex {
    products: RwLock<Arc<Vec<Product>>>,
}

impl InMemoryProductIndex {
    pub fn new(products: Vec<Product>) -> Result<Self, RetrievalError> {
        for product in &products {
            product
                .validate()
                .map_err(|e| RetrievalError::Invalid(e.to_string()))?;
        }
        Ok(Self {
            products: RwLock::new(Arc::new(products)),
        })
    }

    /// Load a catalogue from a JSON array. Entries missing
    /// `numeric_price` derive it from the display price string.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RetrievalError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let mut raw: Vec<serde_json::Value> = serde_json::from_str(&text)?;
        for entry in &mut raw {
            if entry.get("numeric_price").is_none() {
                let derived = entry
                    .get("price")
                    .and_then(|p| p.as_str())
                    .and_then(parse_price_string);
                if let (Some(value), Some(obj)) = (derived, entry.as_object_mut()) {
                    obj.insert("numeric_price".to_string(), serde_json::json!(value));
                }
            }
        }
        let products: Vec<Product> = serde_json::from_value(serde_json::Value::Array(raw))?;
        tracing::info!(
            path = %path.as_ref().display(),
            count = products.len(),
            "product catalogue loaded"
        );
        Self::new(products)
    }

    /// Publish a new snapshot.
    pub fn reload(&self, products: Vec<Product>) -> Result<(), RetrievalError> {
        for product in &products {
            product
                .validate()
                .map_err(|e| RetrievalError::Invalid(e.to_string()))?;
        }
        *self.products.write() = Arc::new(products);
        Ok(())
    }
}

impl ProductIndex for InMemoryProductIndex {
    fn all(&self) -> Arc<Vec<Product>> {
        self.products.read().clone()
    }
}

/// The product retriever (C2).
pub struct ProductRetriever {
    index: Arc<dyn ProductIndex>,
    semantic: Option<Arc<dyn SemanticIndex>>,
    fuzzy_threshold: f64,
}

impl ProductRetriever {
    pub fn new(index: Arc<dyn ProductIndex>) -> Self {
        Self {
            index,
            semantic: None,
            fuzzy_threshold: consts::FUZZY_THRESHOLD,
        }
    }

    /// Inject a semantic ranker. The retriever is fully functional
    /// without one.
    pub fn with_semantic(mut self, semantic: Arc<dyn SemanticIndex>) -> Self {
        self.semantic = Some(semantic);
        self
    }

    pub fn with_fuzzy_threshold(mut self, threshold: f64) -> Self {
        self.fuzzy_threshold = threshold;
        self
    }

    /// Ranked search. `k` bounds the returned list except for singular
    /// superlative queries, which return exactly one item.
    pub fn search(&self, query: &str, slots: &Slots, k: usize) -> Vec<Product> {
        let snapshot = self.index.all();

        // An inverted budget matches nothing; that is a valid outcome.
        if let Some(budget) = &slots.budget {
            if !budget.is_satisfiable() {
                return Vec::new();
            }
        }

        let filtered: Vec<Product> = snapshot
            .iter()
            .filter(|p| Self::passes_filters(p, slots))
            .cloned()
            .collect();

        let mut candidates = if slots.show_all {
            filtered
        } else {
            self.rank(query, slots, filtered)
        };

        candidates = dedup_by_name(candidates);

        match slots.superlative {
            Some(Superlative::Cheapest) => {
                candidates.sort_by(|a, b| {
                    a.numeric_price
                        .partial_cmp(&b.numeric_price)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                candidates.truncate(if slots.singular { 1 } else { consts::SUPERLATIVE_TOP_K });
            }
            Some(Superlative::MostExpensive) => {
                candidates.sort_by(|a, b| {
                    b.numeric_price
                        .partial_cmp(&a.numeric_price)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                candidates.truncate(if slots.singular { 1 } else { consts::SUPERLATIVE_TOP_K });
            }
            None => {
                candidates.truncate(k);
            }
        }

        candidates
    }

    /// One-line summary of a result set, used as the reply header.
    pub fn summarise(&self, query: &str, results: &[Product]) -> String {
        if results.is_empty() {
            format!("No products matched \"{}\".", query.trim())
        } else if results.len() == 1 {
            format!("Found 1 product for \"{}\".", query.trim())
        } else {
            format!("Found {} products for \"{}\".", results.len(), query.trim())
        }
    }

    /// Size of the full catalogue snapshot.
    pub fn catalogue_size(&self) -> usize {
        self.index.all().len()
    }

    /// Products currently promoted or on sale, for promotion inquiries.
    pub fn promotions(&self) -> Vec<Product> {
        self.index
            .all()
            .iter()
            .filter(|p| p.on_sale || p.promotion.is_some())
            .cloned()
            .collect()
    }

    fn passes_filters(product: &Product, slots: &Slots) -> bool {
        if !slots.materials.is_empty() && !slots.materials.contains(&product.material) {
            return false;
        }
        if !slots
            .features
            .iter()
            .all(|f| product.features.contains(f))
        {
            return false;
        }
        if !slots.collections.is_empty() {
            match product.collection {
                Some(c) if slots.collections.contains(&c) => {}
                _ => return false,
            }
        }
        if let Some(band) = slots.capacity {
            match product.capacity_ml() {
                Some(ml) if band.matches_ml(ml) => {}
                _ => return false,
            }
        }
        if let Some(budget) = &slots.budget {
            if !budget.contains(product.numeric_price) {
                return false;
            }
        }
        true
    }

    /// Semantic rank (when available) followed by lexical match, with a
    /// fuzzy fallback when neither finds anything. When structured
    /// filters are present and the keywords miss, the filtered set
    /// stands on its own.
    fn rank(&self, query: &str, slots: &Slots, filtered: Vec<Product>) -> Vec<Product> {
        let keywords: Vec<&str> = slots
            .keywords
            .iter()
            .map(String::as_str)
            .collect();

        if keywords.is_empty() {
            return filtered;
        }

        let mut ranked: Vec<Product> = Vec::new();

        if let Some(semantic) = &self.semantic {
            let allowed: HashSet<&str> = filtered.iter().map(|p| p.name.as_str()).collect();
            for product in semantic.semantic(query, filtered.len().max(1)) {
                if allowed.contains(product.name.as_str()) {
                    ranked.push(product);
                }
            }
        }

        let lexical: Vec<Product> = filtered
            .iter()
            .filter(|p| {
                let haystack = self.haystack(p);
                keywords.iter().all(|kw| keyword_matches(&haystack, kw))
            })
            .cloned()
            .collect();
        ranked.extend(lexical);

        if !ranked.is_empty() {
            return ranked;
        }

        // Typos: fall back to fuzzy token-sort matching.
        let mut scored: Vec<(f64, Product)> = filtered
            .iter()
            .filter_map(|p| {
                let score = token_sort_ratio(query, &self.haystack(p));
                let name_score = token_sort_ratio(query, &p.name);
                let best = score.max(name_score);
                (best >= self.fuzzy_threshold).then(|| (best, p.clone()))
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        if !scored.is_empty() {
            return scored.into_iter().map(|(_, p)| p).collect();
        }

        // Keywords missed entirely. With structured filters in play the
        // filtered set is still the honest answer; otherwise nothing
        // matched.
        if slots.has_product_filters() {
            filtered
        } else {
            Vec::new()
        }
    }

    fn haystack(&self, product: &Product) -> String {
        let mut parts: Vec<String> = vec![
            product.name.to_lowercase(),
            product.category.to_lowercase(),
            product.material.label().to_lowercase(),
        ];
        if let Some(description) = &product.description {
            parts.push(description.to_lowercase());
        }
        if let Some(collection) = product.collection {
            parts.push(collection.label().to_lowercase());
        }
        parts.extend(product.colors.iter().map(|c| c.to_lowercase()));
        parts.extend(
            product
                .features
                .iter()
                .map(|f| f.label().to_lowercase()),
        );
        parts.join(" ")
    }
}

/// Case-insensitive containment with naive plural folding, so
/// "tumblers" still finds products named "Tumbler".
fn keyword_matches(haystack: &str, keyword: &str) -> bool {
    let keyword = keyword.to_lowercase();
    if haystack.contains(&keyword) {
        return true;
    }
    if keyword.len() > 3 {
        if let Some(stem) = keyword.strip_suffix('s') {
            return haystack.contains(stem);
        }
    }
    false
}

fn dedup_by_name(products: Vec<Product>) -> Vec<Product> {
    let mut seen = HashSet::new();
    products
        .into_iter()
        .filter(|p| seen.insert(p.name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kopibot_core::{BudgetRange, CapacityBand, Collection, Feature, Material};

    fn product(name: &str, price: f64, material: Material) -> Product {
        Product {
            name: name.to_string(),
            price: format!("RM {:.2}", price),
            numeric_price: price,
            regular_price: None,
            category: "drinkware".to_string(),
            description: None,
            capacity: Some("500ml".to_string()),
            material,
            colors: vec!["black".to_string()],
            features: vec![Feature::LeakProof],
            collection: Some(Collection::Og),
            promotion: None,
            on_sale: false,
        }
    }

    fn catalogue() -> Vec<Product> {
        vec![
            product("OG Tumbler", 79.0, Material::StainlessSteel),
            product("OG Ceramic Mug", 39.0, Material::Ceramic),
            product("Frozee Cold Cup", 55.0, Material::Acrylic),
            product("Premium Ceramic Mug", 89.0, Material::Ceramic),
            product("All-Can Tumbler", 105.0, Material::StainlessSteel),
        ]
    }

    fn retriever() -> ProductRetriever {
        let index = Arc::new(InMemoryProductIndex::new(catalogue()).unwrap());
        ProductRetriever::new(index)
    }

    fn slots() -> Slots {
        Slots::default()
    }

    #[test]
    fn cheapest_singular_returns_exactly_one() {
        let mut s = slots();
        s.materials.insert(Material::Ceramic);
        s.superlative = Some(Superlative::Cheapest);
        s.singular = true;
        s.keywords = vec!["mug".to_string()];

        let results = retriever().search("the cheapest ceramic mug", &s, 15);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "OG Ceramic Mug");
    }

    #[test]
    fn most_expensive_plural_returns_top_three() {
        let mut s = slots();
        s.superlative = Some(Superlative::MostExpensive);
        s.keywords = vec!["tumbler".to_string()];

        let results = retriever().search("most expensive tumblers", &s, 15);
        assert!(results.len() <= 3);
        assert_eq!(results[0].name, "All-Can Tumbler");
    }

    #[test]
    fn price_range_filters_inclusively() {
        let mut s = slots();
        s.budget = Some(BudgetRange::below(60.0));

        let results = retriever().search("products under RM60", &s, 15);
        assert!(results.iter().all(|p| p.numeric_price <= 60.0));
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn inverted_range_returns_empty_not_error() {
        let mut s = slots();
        s.budget = Some(BudgetRange {
            min: Some(100.0),
            max: Some(10.0),
        });
        assert!(retriever().search("odd range", &s, 15).is_empty());
    }

    #[test]
    fn adding_a_filter_never_enlarges_results() {
        let r = retriever();
        let base = r.search("drinkware", &slots(), 100);

        let mut narrowed = slots();
        narrowed.materials.insert(Material::Ceramic);
        let with_material = r.search("drinkware", &narrowed, 100);
        assert!(with_material.len() <= base.len());

        narrowed.budget = Some(BudgetRange::below(50.0));
        let with_budget = r.search("drinkware", &narrowed, 100);
        assert!(with_budget.len() <= with_material.len());
    }

    #[test]
    fn search_is_idempotent() {
        let r = retriever();
        let mut s = slots();
        s.keywords = vec!["tumbler".to_string()];
        let a = r.search("tumbler", &s, 15);
        let b = r.search("tumbler", &s, 15);
        assert_eq!(a, b);
    }

    #[test]
    fn fuzzy_fallback_catches_typos() {
        let mut s = slots();
        s.keywords = vec!["tumblr".to_string()];
        let results = retriever().search("og tumblr", &s, 15);
        assert!(results.iter().any(|p| p.name.contains("Tumbler")));
    }

    #[test]
    fn show_all_returns_entire_catalogue() {
        let mut s = slots();
        s.show_all = true;
        let results = retriever().search("show all products", &s, usize::MAX);
        assert_eq!(results.len(), catalogue().len());
    }

    #[test]
    fn capacity_band_filtering() {
        let mut s = slots();
        s.capacity = Some(CapacityBand::Medium);
        let results = retriever().search("medium", &s, 15);
        assert_eq!(results.len(), catalogue().len()); // all fixtures are 500ml

        s.capacity = Some(CapacityBand::Large);
        assert!(retriever().search("large", &s, 15).is_empty());
    }

    #[test]
    fn unknown_keywords_without_filters_return_empty() {
        let mut s = slots();
        s.keywords = vec!["spaceship".to_string()];
        assert!(retriever().search("spaceship", &s, 15).is_empty());
    }

    #[test]
    fn semantic_results_rank_first_when_injected() {
        struct Fixed;
        impl SemanticIndex for Fixed {
            fn semantic(&self, _query: &str, _k: usize) -> Vec<Product> {
                vec![product("Frozee Cold Cup", 55.0, Material::Acrylic)]
            }
        }

        let index = Arc::new(InMemoryProductIndex::new(catalogue()).unwrap());
        let r = ProductRetriever::new(index).with_semantic(Arc::new(Fixed));

        let mut s = slots();
        s.keywords = vec!["cup".to_string()];
        let results = r.search("cold cup", &s, 15);
        assert_eq!(results[0].name, "Frozee Cold Cup");
        // De-duplicated even though lexical also matches it.
        assert_eq!(
            results.iter().filter(|p| p.name == "Frozee Cold Cup").count(),
            1
        );
    }

    #[test]
    fn loader_derives_numeric_price_from_display_string() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::with_suffix(".json").unwrap();
        write!(
            file,
            r#"[{{"name": "Derived", "price": "RM 45.50", "material": "glass"}}]"#
        )
        .unwrap();
        let index = InMemoryProductIndex::from_json_file(file.path()).unwrap();
        let products = index.all();
        assert_eq!(products.len(), 1);
        assert!((products[0].numeric_price - 45.5).abs() < 1e-9);
    }
}

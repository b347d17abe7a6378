//! Application state wiring.

use std::sync::Arc;

use kopibot_agent::Engine;
use kopibot_config::{Settings, Vocabulary};
use kopibot_retrieval::{InMemoryOutletRegistry, InMemoryProductIndex};

use crate::ServerError;

/// Shared state handed to every handler. The engine owns all session
/// state; the index handles are kept so the reload endpoint can publish
/// fresh snapshots.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub settings: Arc<Settings>,
    pub products: Arc<InMemoryProductIndex>,
    pub outlets: Arc<InMemoryOutletRegistry>,
}

impl AppState {
    /// Build the full application from settings: vocabulary, catalogue
    /// snapshots, and the engine. A missing catalogue file is a warning
    /// and an empty snapshot, not a startup failure.
    pub fn from_settings(settings: Settings) -> Result<Self, ServerError> {
        let vocabulary = match &settings.data.vocabulary_path {
            Some(path) => Arc::new(Vocabulary::load_from(path)?),
            None => Arc::new(Vocabulary::default()),
        };

        let products = match InMemoryProductIndex::from_json_file(&settings.data.products_path) {
            Ok(index) => Arc::new(index),
            Err(error) => {
                tracing::warn!(
                    path = %settings.data.products_path,
                    error = %error,
                    "product catalogue unavailable; starting empty"
                );
                Arc::new(InMemoryProductIndex::new(Vec::new())?)
            }
        };

        let outlets = match InMemoryOutletRegistry::from_json_file(&settings.data.outlets_path) {
            Ok(registry) => Arc::new(registry),
            Err(error) => {
                tracing::warn!(
                    path = %settings.data.outlets_path,
                    error = %error,
                    "outlet registry unavailable; starting empty"
                );
                Arc::new(InMemoryOutletRegistry::new(Vec::new())?)
            }
        };

        let engine = Arc::new(Engine::new(
            &settings,
            vocabulary,
            products.clone(),
            outlets.clone(),
            None,
        ));

        Ok(Self {
            engine,
            settings: Arc::new(settings),
            products,
            outlets,
        })
    }

    /// Re-read the catalogue files and publish new snapshots. In-flight
    /// turns keep the snapshot they started with.
    pub fn reload_catalogues(&self) -> Result<(usize, usize), ServerError> {
        let fresh_products =
            InMemoryProductIndex::from_json_file(&self.settings.data.products_path)?;
        let fresh_outlets =
            InMemoryOutletRegistry::from_json_file(&self.settings.data.outlets_path)?;

        use kopibot_core::{OutletRegistry, ProductIndex};
        let product_count = fresh_products.all().len();
        let outlet_count = fresh_outlets.all().len();

        self.products
            .reload(fresh_products.all().as_ref().clone())?;
        self.outlets.reload(fresh_outlets.all().as_ref().clone())?;

        tracing::info!(product_count, outlet_count, "catalogues reloaded");
        Ok((product_count, outlet_count))
    }
}

//! JSON loaders for the product catalog and the ingredient knowledge base.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::{ApothecaryError, Result};
use crate::types::{IngredientKnowledge, Product};

/// Load and validate a product catalog from a JSON array file.
pub fn load_catalog(path: &Path) -> Result<Vec<Product>> {
    let content = std::fs::read_to_string(path)?;
    let products = parse_catalog(&content)?;
    info!(path = %path.display(), products = products.len(), "Catalog loaded");
    Ok(products)
}

/// Parse a catalog from JSON text, rejecting duplicate product ids.
pub fn parse_catalog(json: &str) -> Result<Vec<Product>> {
    let products: Vec<Product> = serde_json::from_str(json)?;
    ensure_unique_ids(&products).map_err(ApothecaryError::Config)?;
    Ok(products)
}

/// Check that no two products share an id.
///
/// Returns the offending id in the error message. Callers choose the error
/// class: a bad catalog is a configuration problem, a bad persisted metadata
/// file is a retrieval problem.
pub fn ensure_unique_ids(products: &[Product]) -> std::result::Result<(), String> {
    let mut seen = HashSet::with_capacity(products.len());
    for product in products {
        if !seen.insert(product.id) {
            return Err(format!("duplicate product id {}", product.id));
        }
    }
    Ok(())
}

/// Knowledge-base record without its name, as found in the keyed file form.
#[derive(Deserialize)]
struct KeyedKnowledge {
    properties: String,
    #[serde(default)]
    common_effects: Vec<String>,
}

/// Either accepted knowledge-base file layout.
#[derive(Deserialize)]
#[serde(untagged)]
enum KnowledgeFile {
    List(Vec<IngredientKnowledge>),
    Keyed(BTreeMap<String, KeyedKnowledge>),
}

/// Load the ingredient knowledge base from a JSON file.
pub fn load_knowledge(path: &Path) -> Result<Vec<IngredientKnowledge>> {
    let content = std::fs::read_to_string(path)?;
    let entries = parse_knowledge(&content)?;
    info!(path = %path.display(), entries = entries.len(), "Knowledge base loaded");
    Ok(entries)
}

/// Parse a knowledge base given either as a list of records or as an object
/// keyed by ingredient name.
pub fn parse_knowledge(json: &str) -> Result<Vec<IngredientKnowledge>> {
    let file: KnowledgeFile = serde_json::from_str(json)?;
    Ok(match file {
        KnowledgeFile::List(entries) => entries,
        KnowledgeFile::Keyed(map) => map
            .into_iter()
            .map(|(name, k)| IngredientKnowledge {
                name,
                properties: k.properties,
                common_effects: k.common_effects,
            })
            .collect(),
    })
}

//! Ingredient knowledge lookup.

use std::collections::HashMap;

use tracing::debug;

use apothecary_core::types::{EnrichedIngredient, EnrichedProduct, IngredientKnowledge, Product};

/// Attaches knowledge-base facts to ingredient names.
///
/// Lookups are case-insensitive and ignore surrounding whitespace. Every
/// input ingredient yields exactly one output entry; ingredients missing
/// from the knowledge base get the "Unknown" placeholder.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeEnricher {
    entries: HashMap<String, IngredientKnowledge>,
}

impl KnowledgeEnricher {
    /// Build an enricher from knowledge records.
    ///
    /// When two records normalize to the same key, the first one wins.
    pub fn new(knowledge: Vec<IngredientKnowledge>) -> Self {
        let mut entries = HashMap::with_capacity(knowledge.len());
        for record in knowledge {
            entries.entry(normalize(&record.name)).or_insert(record);
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the knowledge base has an entry for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&normalize(name))
    }

    pub fn enrich(&self, ingredients: &[String]) -> Vec<EnrichedIngredient> {
        let mut known = 0usize;
        let enriched: Vec<EnrichedIngredient> = ingredients
            .iter()
            .map(|name| match self.entries.get(&normalize(name)) {
                Some(record) => {
                    known += 1;
                    EnrichedIngredient {
                        name: name.clone(),
                        properties: record.properties.clone(),
                        common_effects: record.common_effects.clone(),
                    }
                }
                None => EnrichedIngredient::unknown(name),
            })
            .collect();

        debug!(ingredients = enriched.len(), known, "Enriched ingredients");
        enriched
    }

    pub fn enrich_product(&self, product: &Product) -> EnrichedProduct {
        EnrichedProduct {
            enriched_ingredients: self.enrich(&product.ingredients),
            product: product.clone(),
        }
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

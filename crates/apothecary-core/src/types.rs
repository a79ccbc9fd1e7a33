use serde::{Deserialize, Serialize};

// =============================================================================
// Catalog records
// =============================================================================

/// A product in the recommendation catalog.
///
/// Loaded once per catalog version and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Unique product identifier.
    pub id: i64,
    pub name: String,
    pub description: String,
    /// Product category, e.g. "beverage" or "supplement".
    #[serde(rename = "type")]
    pub product_type: String,
    /// Effects the product is marketed for.
    #[serde(default)]
    pub effects: Vec<String>,
    /// Ingredients in label order.
    #[serde(default)]
    pub ingredients: Vec<String>,
    pub price: f64,
}

/// Knowledge-base entry describing a single ingredient.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IngredientKnowledge {
    /// Ingredient name. Lookups are case-insensitive.
    pub name: String,
    pub properties: String,
    #[serde(default)]
    pub common_effects: Vec<String>,
}

// =============================================================================
// Derived records
// =============================================================================

/// Placeholder properties for an ingredient missing from the knowledge base.
pub const UNKNOWN_PROPERTIES: &str = "Unknown";

/// An ingredient resolved against the knowledge base.
///
/// Ingredients without a knowledge-base entry carry
/// [`UNKNOWN_PROPERTIES`] and no effects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnrichedIngredient {
    pub name: String,
    pub properties: String,
    pub common_effects: Vec<String>,
}

impl EnrichedIngredient {
    /// Build the placeholder entry for an unmatched ingredient.
    pub fn unknown(name: &str) -> Self {
        Self {
            name: name.to_string(),
            properties: UNKNOWN_PROPERTIES.to_string(),
            common_effects: Vec::new(),
        }
    }
}

/// A product together with knowledge about each of its ingredients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnrichedProduct {
    #[serde(flatten)]
    pub product: Product,
    pub enriched_ingredients: Vec<EnrichedIngredient>,
}

/// A retrieved product and its squared L2 distance to the query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub product: Product,
    pub distance: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_product() -> Product {
        Product {
            id: 1,
            name: "Relaxation Tea".to_string(),
            description: "A soothing herbal tea blend.".to_string(),
            product_type: "beverage".to_string(),
            effects: vec!["relaxation".to_string(), "stress relief".to_string()],
            ingredients: vec!["Chamomile".to_string(), "Lavender".to_string()],
            price: 12.99,
        }
    }

    #[test]
    fn test_product_type_field_is_named_type() {
        let json = serde_json::to_value(sample_product()).unwrap();
        assert_eq!(json["type"], "beverage");
        assert!(json.get("product_type").is_none());
    }

    #[test]
    fn test_product_deserializes_catalog_record() {
        let json = r#"{
            "id": 1,
            "name": "Relaxation Tea",
            "type": "beverage",
            "description": "A soothing herbal tea blend.",
            "effects": ["relaxation", "stress relief"],
            "ingredients": ["Chamomile", "Lavender"],
            "price": 12.99
        }"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product, sample_product());
    }

    #[test]
    fn test_product_missing_lists_default_empty() {
        let json = r#"{"id": 7, "name": "Plain", "type": "x", "description": "", "price": 1.0}"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert!(product.effects.is_empty());
        assert!(product.ingredients.is_empty());
    }

    #[test]
    fn test_unknown_ingredient_placeholder() {
        let unknown = EnrichedIngredient::unknown("Mystery Root");
        assert_eq!(unknown.name, "Mystery Root");
        assert_eq!(unknown.properties, "Unknown");
        assert!(unknown.common_effects.is_empty());
    }

    #[test]
    fn test_enriched_product_flattens_product_fields() {
        let enriched = EnrichedProduct {
            product: sample_product(),
            enriched_ingredients: vec![EnrichedIngredient::unknown("Chamomile")],
        };
        let json = serde_json::to_value(&enriched).unwrap();
        assert_eq!(json["name"], "Relaxation Tea");
        assert_eq!(json["enriched_ingredients"][0]["properties"], "Unknown");
    }
}

//! Prompt construction and generated-text cleanup.

use std::fmt::Write as _;

use apothecary_core::types::EnrichedProduct;

use crate::error::AugmentError;

/// Section marker that introduces a product's ingredient list in prompts.
///
/// Generated text is cut at its first occurrence, since a model that starts
/// reproducing product listings has stopped writing the recommendation.
pub const INGREDIENTS_MARKER: &str = "Ingredients:";

const PREAMBLE: &str = "You are an AI assistant providing personalized product recommendations.";
const INSTRUCTION: &str = "Based on the user's query and the knowledge of ingredients, \
                           generate a friendly and persuasive recommendation.";

/// Deterministic prompt templates.
pub struct PromptBuilder;

impl PromptBuilder {
    /// Recommendation prompt for a query and its retrieved products.
    pub fn build_prompt(query: &str, products: &[EnrichedProduct]) -> String {
        let mut prompt = String::new();
        let _ = writeln!(prompt, "{}", PREAMBLE);
        let _ = writeln!(prompt);
        let _ = writeln!(prompt, "User Query: \"{}\"", query.trim());
        let _ = writeln!(prompt);
        let _ = writeln!(prompt, "Recommended Products:");

        for (i, enriched) in products.iter().enumerate() {
            let p = &enriched.product;
            let _ = writeln!(
                prompt,
                "{}. {} ({}, ${:.2})",
                i + 1,
                p.name,
                p.product_type,
                p.price
            );
            let _ = writeln!(prompt, "   Description: {}", p.description);
            let _ = writeln!(prompt, "   Effects: {}", p.effects.join(", "));
            let _ = writeln!(prompt, "   {}", INGREDIENTS_MARKER);
            for ingredient in &enriched.enriched_ingredients {
                if ingredient.common_effects.is_empty() {
                    let _ = writeln!(prompt, "   - {}: {}", ingredient.name, ingredient.properties);
                } else {
                    let _ = writeln!(
                        prompt,
                        "   - {}: {} (common effects: {})",
                        ingredient.name,
                        ingredient.properties,
                        ingredient.common_effects.join(", ")
                    );
                }
            }
        }

        let _ = writeln!(prompt);
        prompt.push_str(INSTRUCTION);
        prompt
    }

    /// Short marketing description prompt for a single product.
    pub fn build_description_prompt(product: &EnrichedProduct) -> String {
        let p = &product.product;
        let details: Vec<String> = product
            .enriched_ingredients
            .iter()
            .map(|i| format!("- {}: {}", i.name, i.properties))
            .collect();

        format!(
            "Write a short, engaging product description for {}, a {} made with {}. \
             It helps with {}.\nThe ingredients include:\n{}",
            p.name,
            p.product_type,
            p.ingredients.join(", "),
            p.effects.join(", "),
            details.join("\n")
        )
    }
}

/// Cleans raw model output into user-facing text.
pub struct ResponseSanitizer;

impl ResponseSanitizer {
    /// Apply the cleanup steps in order:
    ///
    /// 1. trim surrounding whitespace;
    /// 2. remove an echoed copy of the prompt (verbatim or trimmed);
    /// 3. cut at the first [`INGREDIENTS_MARKER`], dropping it and the rest;
    /// 4. trim again.
    ///
    /// Returns [`AugmentError::EmptyOutput`] when nothing is left.
    pub fn sanitize(raw: &str, prompt: &str) -> Result<String, AugmentError> {
        let mut text = raw.trim().to_string();

        let trimmed_prompt = prompt.trim();
        if !prompt.is_empty() && text.contains(prompt) {
            text = text.replacen(prompt, "", 1);
        } else if !trimmed_prompt.is_empty() && text.contains(trimmed_prompt) {
            text = text.replacen(trimmed_prompt, "", 1);
        }

        if let Some(cut) = text.find(INGREDIENTS_MARKER) {
            text.truncate(cut);
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(AugmentError::EmptyOutput);
        }
        Ok(text.to_string())
    }
}

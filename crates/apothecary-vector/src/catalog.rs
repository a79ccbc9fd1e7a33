//! Vector index paired with its position-aligned product metadata.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use apothecary_core::catalog::ensure_unique_ids;
use apothecary_core::error::{ApothecaryError, Result};
use apothecary_core::types::Product;

use crate::index::VectorIndex;

/// A product match returned by [`IndexedCatalog::search`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankedMatch {
    pub product_id: i64,
    /// Position of the product in the index and the metadata sequence.
    pub position: usize,
    /// Squared Euclidean distance to the query vector.
    pub distance: f32,
}

/// An immutable index version: vectors plus the products they embed.
///
/// Position `i` of the index always holds the embedding of `products[i]`.
/// Construction rejects any pairing that breaks this alignment.
#[derive(Debug, Clone)]
pub struct IndexedCatalog {
    index: VectorIndex,
    products: Vec<Product>,
    positions_by_id: HashMap<i64, usize>,
}

impl IndexedCatalog {
    /// Pair an index with its metadata, validating alignment.
    ///
    /// A count mismatch or duplicate product id is reported as a retrieval
    /// error, since it means the persisted pair cannot be trusted.
    pub fn new(index: VectorIndex, products: Vec<Product>) -> Result<Self> {
        if index.len() != products.len() {
            return Err(ApothecaryError::Retrieval(format!(
                "index holds {} vectors but metadata holds {} products",
                index.len(),
                products.len()
            )));
        }
        ensure_unique_ids(&products).map_err(ApothecaryError::Retrieval)?;

        let positions_by_id = products
            .iter()
            .enumerate()
            .map(|(position, p)| (p.id, position))
            .collect();

        Ok(Self {
            index,
            products,
            positions_by_id,
        })
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Products in index order.
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn product_at(&self, position: usize) -> Option<&Product> {
        self.products.get(position)
    }

    pub fn product_by_id(&self, id: i64) -> Option<&Product> {
        self.positions_by_id
            .get(&id)
            .and_then(|&position| self.products.get(position))
    }

    /// Exact k-nearest-neighbor search, resolved to product ids.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<RankedMatch>> {
        let neighbors = self.index.search(query, k)?;
        neighbors
            .into_iter()
            .map(|n| {
                let product = self.product_at(n.position).ok_or_else(|| {
                    ApothecaryError::Retrieval(format!(
                        "index position {} has no metadata",
                        n.position
                    ))
                })?;
                Ok(RankedMatch {
                    product_id: product.id,
                    position: n.position,
                    distance: n.distance,
                })
            })
            .collect()
    }
}

//! Client-side shopping cart.
//!
//! The cart lives entirely in the shopper's browser: a single storage key
//! holds a JSON array of [`CartLineItem`]. [`CartStore`] wraps that key with
//! read-modify-write operations over an injected [`CartStorage`], so the same
//! logic runs against `localStorage` in the browser and [`MemoryStorage`] in
//! tests.
//!
//! There is no locking. Two tabs writing at once is last-write-wins.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage key the storefront pages read and write.
pub const DEFAULT_CART_KEY: &str = "cart";

/// A product line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    /// Product identifier (e.g. `boho-hoop-earrings`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Unit price in major units. Stored as a JSON number for the pages' scripts.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Selected variant; empty when the product has none.
    #[serde(default)]
    pub size: String,
    /// Always at least 1.
    pub quantity: u32,
    /// Absolute URL or root-relative path (`/images/hoops.jpg`).
    pub image: String,
}

impl CartLineItem {
    /// `price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Errors from cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Attempted to store a line with quantity 0.
    #[error("quantity must be at least 1")]
    InvalidQuantity,
    /// The storage backend refused the write (e.g. quota exceeded).
    #[error("cart storage error: {0}")]
    Storage(String),
    /// The cart could not be serialized.
    #[error("cart serialization error: {0}")]
    Serialize(String),
}

/// Key-value storage the cart is persisted in.
///
/// Mirrors the browser `localStorage` surface: string keys, string values.
pub trait CartStorage {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Replace the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the backend rejects the write.
    fn set(&mut self, key: &str, value: String) -> Result<(), CartError>;

    /// Delete `key`. Missing keys are not an error.
    fn remove(&mut self, key: &str);
}

/// In-process [`CartStorage`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl MemoryStorage {
    /// Create an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CartStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), CartError> {
        self.entries.insert(key.to_owned(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

/// Cart operations over a storage capability.
#[derive(Debug, Clone)]
pub struct CartStore<S> {
    storage: S,
    key: String,
}

impl<S: CartStorage> CartStore<S> {
    /// Create a store using the default `cart` key.
    pub fn new(storage: S) -> Self {
        Self::with_key(storage, DEFAULT_CART_KEY)
    }

    /// Create a store using a custom key.
    pub fn with_key(storage: S, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// Borrow the underlying storage.
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Load the cart.
    ///
    /// A missing key or unparsable value yields an empty cart. Stored lines
    /// with a zero quantity are dropped.
    pub fn load(&self) -> Vec<CartLineItem> {
        let Some(raw) = self.storage.get(&self.key) else {
            return Vec::new();
        };

        let mut items: Vec<CartLineItem> = serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(key = %self.key, error = %e, "Discarding unparsable cart");
            Vec::new()
        });

        let stored = items.len();
        items.retain(|item| item.quantity > 0);
        if items.len() < stored {
            tracing::warn!(
                key = %self.key,
                dropped = stored - items.len(),
                "Dropping cart lines with zero quantity"
            );
        }
        items
    }

    /// Add an item, merging into an existing line with the same `id`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for a zero quantity, or a storage
    /// error if the write fails.
    pub fn add(&mut self, item: CartLineItem) -> Result<Vec<CartLineItem>, CartError> {
        if item.quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        let mut items = self.load();
        match items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(item.quantity);
            }
            None => items.push(item),
        }

        self.save(&items)?;
        Ok(items)
    }

    /// Remove the line at `index`. Out-of-range indexes leave the cart unchanged.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails.
    pub fn remove(&mut self, index: usize) -> Result<Vec<CartLineItem>, CartError> {
        let mut items = self.load();
        if index >= items.len() {
            return Ok(items);
        }

        items.remove(index);
        self.save(&items)?;
        Ok(items)
    }

    /// Set the quantity of the line at `index`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for zero, or a storage error.
    pub fn set_quantity(
        &mut self,
        index: usize,
        quantity: u32,
    ) -> Result<Vec<CartLineItem>, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        let mut items = self.load();
        let Some(line) = items.get_mut(index) else {
            return Ok(items);
        };
        line.quantity = quantity;

        self.save(&items)?;
        Ok(items)
    }

    /// Empty the cart.
    pub fn clear(&mut self) {
        self.storage.remove(&self.key);
    }

    /// Sum of `price × quantity` over all lines.
    pub fn subtotal(&self) -> Decimal {
        self.load().iter().map(CartLineItem::line_total).sum()
    }

    /// Total number of units (shown in the header badge).
    pub fn item_count(&self) -> u32 {
        self.load()
            .iter()
            .fold(0u32, |acc, line| acc.saturating_add(line.quantity))
    }

    fn save(&mut self, items: &[CartLineItem]) -> Result<(), CartError> {
        let raw = serde_json::to_string(items).map_err(|e| CartError::Serialize(e.to_string()))?;
        self.storage.set(&self.key, raw)
    }
}

//! Boho Core - Shared types library.
//!
//! This crate provides the types shared by the storefront server, the CLI
//! and the browser-side cart:
//! - `storefront` - Checkout, payment intent and webhook endpoints
//! - `cli` - Database migrations
//!
//! # Architecture
//!
//! The core crate contains only types, traits and pure logic - no network,
//! no database access. The cart store talks to an injected [`CartStorage`]
//! so the same code runs against browser local storage or an in-memory map.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, emails, and statuses
//! - [`cart`] - Client-side cart store

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use cart::{CartError, CartLineItem, CartStorage, CartStore, MemoryStorage};
pub use types::*;

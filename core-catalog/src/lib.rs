//! # Catalog Data Model & Read Clients
//!
//! Typed model for the Catalog/Entitlement API (tracks, albums, artists, user
//! profiles with purchase history) plus thin read clients. This crate sits at
//! the interface boundary: it fetches and decodes, nothing more. List
//! rendering, search and other presentation concerns live in the hosts.
//!
//! The [`checkout`] module carries the Checkout Intent API client, the only
//! write endpoint the core talks to.

pub mod checkout;
pub mod client;
pub mod error;
pub mod types;

pub use checkout::{CheckoutIntentApi, CheckoutIntentRequest, HttpCheckoutIntentClient};
pub use client::CatalogClient;
pub use error::{CatalogError, Result};
pub use types::{
    AccessType, Album, Artist, CheckoutIntent, ItemType, Price, PurchaseRecord, Track,
    UserProfile, UserRole,
};

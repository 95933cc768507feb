//! Recommendation scoring and caching engine for a storefront.
//!
//! Produces ranked, paginated product recommendations for the home feed,
//! product detail pages and the cart, blending recent behaviour, category
//! affinity, popularity and a time-boxed external relevance service.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

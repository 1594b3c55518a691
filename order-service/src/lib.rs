//! Storefront order service: checkout persistence, order assembly, and
//! confirmation dispatch through pluggable mail providers.

pub mod api;
pub mod assembler;
pub mod checkout;
pub mod error;
pub mod models;
pub mod notify;
pub mod providers;
pub mod schema;
pub mod store;

#[cfg(test)]
pub mod test_utils;

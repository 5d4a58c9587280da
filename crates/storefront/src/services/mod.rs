//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Customer registration, login and password changes (argon2)
//! - `payments` - Payment modules (Redsys, Stripe, PayPal, bank transfer, cash)
//! - `merchant_feed` - Google Merchant Center RSS feed

pub mod auth;
pub mod merchant_feed;
pub mod payments;

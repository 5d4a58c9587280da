//! Desguace Murcia Core - Shared domain library.
//!
//! This crate provides the types and business rules used across all
//! Desguace Murcia components:
//! - `storefront` - Public catalog, cart, checkout and payment API
//! - `admin` - Back-office API for staff
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows the rules to
//! be tested without any infrastructure.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, and statuses
//! - [`models`] - Records exchanged with clients and stored in `PostgreSQL`
//! - [`cart`] - Cart line rules and derived totals
//! - [`shipping`] - Zone-based and legacy shipping quotes
//! - [`payment`] - Payment provider configuration and failure messages

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod models;
pub mod payment;
pub mod shipping;
pub mod types;

pub use models::{
    ApiConfig, ContactMessage, FooterBlock, HomepageBlock, ImportHistory, ImportSchedule, Order,
    OrderItem, OrderPayment, Page, Part, PaymentConfig, Popup, PopupStat, Province, ShippingMethod,
    ShippingZone, SiteConfig, SiteSetting, User, Vehicle, ZoneRate,
};
pub use types::*;

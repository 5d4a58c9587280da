//! Records shared by the storefront, the back-office and the CLI.
//!
//! These map one-to-one onto database rows (`FromRow` behind the `postgres`
//! feature) and serialize in camelCase, which is what API clients expect.

pub mod catalog;
pub mod cms;
pub mod contact;
pub mod import;
pub mod order;
pub mod payment;
pub mod popup;
pub mod shipping;
pub mod user;

pub use catalog::{Part, Vehicle};
pub use cms::{FooterBlock, HomepageBlock, Page, SiteConfig, SiteSetting};
pub use contact::ContactMessage;
pub use import::{ApiConfig, ImportHistory, ImportSchedule};
pub use order::{Order, OrderItem, OrderPayment};
pub use payment::PaymentConfig;
pub use popup::{Popup, PopupStat};
pub use shipping::{Province, ShippingMethod, ShippingZone, ZoneRate};
pub use user::User;

//! Business logic services for admin.
//!
//! # Services
//!
//! - `auth` - Staff login and account management
//! - `backup` - SQL dumps of the database and restores through `psql`
//! - `email` - Customer notifications via SMTP
//! - `import` - Background Metasync imports
//! - `metasync` - Metasync inventory API client
//! - `normalize` - Metasync items to catalog rows
//! - `order_stats` - Dashboard order aggregates
//! - `scheduler` - Recurring imports

pub mod auth;
pub mod backup;
pub mod email;
pub mod import;
pub mod metasync;
pub mod normalize;
pub mod order_stats;
pub mod scheduler;

pub use auth::{AuthError, AuthService, NewAccount};
pub use backup::{BackupError, BackupInfo, BackupService};
pub use email::{EmailError, EmailService};
pub use import::{ImportError, ImportService};
pub use metasync::{MetasyncClient, MetasyncError};
pub use scheduler::Scheduler;

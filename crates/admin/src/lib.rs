//! Desguace Murcia back-office library.
//!
//! This crate provides the admin API as a library, allowing it to be
//! tested and reused by the CLI.
//!
//! # Security
//!
//! This crate holds the high-privilege operations: editing payment
//! credentials, managing staff accounts, restoring database backups and
//! writing the catalog from Metasync imports.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

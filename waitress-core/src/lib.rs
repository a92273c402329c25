#![doc = "waitress-core: core logic library for waitress."]

//! This crate holds the data model, local catalog parsing and the synchronise pipeline
//! for publishing Remote Actions to the CRM library. The network client lives in the
//! `waitress` binary crate and plugs in through [`contract::RecordStore`].
//!
//! # Usage
//! - [`descriptor::parse_folder`] and [`categories::load_categories`] read the local sources.
//! - [`catalog::join_all`] builds the catalog, [`catalog::diff`] reports mismatches.
//! - [`synchronise::reconcile`] publishes it; [`synchronise::delete_all`] empties the library.

pub mod catalog;
pub mod categories;
pub mod config;
pub mod contract;
pub mod descriptor;
pub mod export;
pub mod synchronise;

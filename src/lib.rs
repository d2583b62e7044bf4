//! HerbTrace client library
//!
//! Looks up herbal package provenance records from the HerbTrace backend
//! and projects them into display-ready fields.

pub mod domain;
pub mod infra;
pub mod io;
pub mod services;

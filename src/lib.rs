//! Record service for clinical-trial tracking.
//!
//! Trials, staff assignments, and their reference data are exposed over an
//! HTTP API backed by libSQL or PostgreSQL.

pub mod config;
pub mod db;
pub mod error;
pub mod records;
pub mod web;

#[cfg(test)]
pub(crate) mod testing;

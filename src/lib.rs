//! Rosterwatch library
//!
//! Self-healing disk cache in front of the student/contest GraphQL backend,
//! with a background monitor that audits and repairs cached rosters.

pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod fetch;
pub mod monitor;
pub mod service;
pub mod upstream;

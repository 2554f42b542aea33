//! TrackItAll Price Tracker Library
//!
//! This library provides the core components for the TrackItAll multi-store
//! price tracking system.

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod persistence;

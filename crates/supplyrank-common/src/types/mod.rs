//! Core types for SupplyRank

pub mod action;
pub mod metrics;
pub mod state;
pub mod supplier;

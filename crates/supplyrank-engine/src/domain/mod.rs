//! SupplyRank domain logic
//!
//! State discretization, the supplier environment, and the learning agent.

pub mod agent;
pub mod environment;
pub mod ranking;
pub mod state_mapper;
pub mod training;

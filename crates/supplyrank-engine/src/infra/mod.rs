//! Infrastructure: QTable storage, snapshots, and collaborator interfaces

pub mod collaborators;
pub mod fixture;
pub mod qtable;
pub mod snapshot;

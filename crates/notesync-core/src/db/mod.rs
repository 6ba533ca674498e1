//! Database layer for the local replica store

mod connection;
mod migrations;
mod repository;

pub use connection::Database;
pub use repository::{LibSqlReplicaRepository, ReplicaRepository};

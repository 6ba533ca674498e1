//! Thread-safe services shared by the sync engine and its callers

mod replica_store;

pub use replica_store::ReplicaStore;

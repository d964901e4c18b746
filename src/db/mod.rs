//! Storage adapters (Firestore, Cloud Storage, in-memory).

pub mod firestore;
pub mod gcs;
pub mod memory;

pub use firestore::FirestoreDb;
pub use gcs::GcsStore;
pub use memory::MemoryStore;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Daily sleep records (keyed by `"{user_id}.{date}"`)
    pub const SLEEP: &str = "sleep";
}

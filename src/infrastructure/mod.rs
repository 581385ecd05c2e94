pub mod in_memory;
pub mod locks;
pub mod pending_index;
#[cfg(feature = "storage-redis")]
pub mod redis;

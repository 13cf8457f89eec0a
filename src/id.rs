//! Unique identifier generation
use std::sync::Arc;
use uuid::Uuid;

/// Source of globally unique, opaque identifiers
pub trait IdGenerator {
    fn new_unique_id(&self) -> String;
}

pub type SharedIdGenerator = Arc<dyn IdGenerator + Send + Sync + 'static>;

/// Random (v4) UUIDs, 122 bits of randomness each
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl UuidGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn new_shared() -> SharedIdGenerator {
        Arc::new(Self::new())
    }
}

impl IdGenerator for UuidGenerator {
    fn new_unique_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

use std::collections::HashMap;

use uuid::Uuid;

/// Mapping from source-side principal ids to their destination-side
/// counterparts. Populated once by the principal import, read-only afterward.
#[derive(Debug, Default)]
pub struct IdentityMap {
    entries: HashMap<Uuid, Uuid>,
}

impl IdentityMap {
    pub fn new() -> Self {
        return Self::default();
    }

    /// Records a mapping. The first recorded destination id for a given
    /// source id wins; later records for the same source id are ignored.
    pub fn record(&mut self, source_id: Uuid, dest_id: Uuid) -> bool {
        if self.entries.contains_key(&source_id) {
            return false;
        }
        self.entries.insert(source_id, dest_id);
        return true;
    }

    pub fn resolve(&self, source_id: &Uuid) -> Option<Uuid> {
        return self.entries.get(source_id).copied();
    }

    pub fn len(&self) -> usize {
        return self.entries.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.entries.is_empty();
    }
}

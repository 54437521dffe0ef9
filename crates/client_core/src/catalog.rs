use std::collections::HashMap;

use shared::{
    domain::{CatalogKind, EntityId},
    protocol::CatalogRecord,
};

#[derive(Debug, Default)]
pub struct Catalog {
    hypotheses: HashMap<EntityId, CatalogRecord>,
    samples: HashMap<EntityId, CatalogRecord>,
    hypothesis_sample_matches: HashMap<EntityId, CatalogRecord>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, kind: CatalogKind) -> &HashMap<EntityId, CatalogRecord> {
        match kind {
            CatalogKind::Hypotheses => &self.hypotheses,
            CatalogKind::Samples => &self.samples,
            CatalogKind::HypothesisSampleMatches => &self.hypothesis_sample_matches,
        }
    }

    fn collection_mut(&mut self, kind: CatalogKind) -> &mut HashMap<EntityId, CatalogRecord> {
        match kind {
            CatalogKind::Hypotheses => &mut self.hypotheses,
            CatalogKind::Samples => &mut self.samples,
            CatalogKind::HypothesisSampleMatches => &mut self.hypothesis_sample_matches,
        }
    }

    pub fn upsert(&mut self, kind: CatalogKind, record: CatalogRecord) -> bool {
        self.collection_mut(kind)
            .insert(record.id.clone(), record)
            .is_none()
    }

    pub fn merge_snapshot(&mut self, kind: CatalogKind, records: Vec<CatalogRecord>) {
        let collection = self.collection_mut(kind);
        for record in records {
            collection.insert(record.id.clone(), record);
        }
    }

    pub fn get(&self, kind: CatalogKind, id: &EntityId) -> Option<&CatalogRecord> {
        self.collection(kind).get(id)
    }

    pub fn len(&self, kind: CatalogKind) -> usize {
        self.collection(kind).len()
    }

    pub fn is_empty(&self, kind: CatalogKind) -> bool {
        self.collection(kind).is_empty()
    }

    pub fn sorted_by_name(&self, kind: CatalogKind) -> Vec<CatalogRecord> {
        let mut records: Vec<CatalogRecord> = self.collection(kind).values().cloned().collect();
        records.sort_by(|a, b| a.name().cmp(&b.name()).then_with(|| a.id.cmp(&b.id)));
        records
    }
}

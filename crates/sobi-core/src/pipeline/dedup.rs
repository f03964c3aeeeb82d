//! Description-level deduplication and batch planning
//!
//! Undecided items sharing the exact same description are sent to the model
//! once. The representative of a group is its first member in input order;
//! the model's answer for it is copied to every member afterwards.

use std::collections::{HashMap, HashSet};

use crate::category::Category;
use crate::models::Expenditure;

/// Items sharing one description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptionGroup {
    /// Id sent to the model on behalf of the whole group
    pub representative: i64,
    pub description: String,
    /// Positions in the original input, ascending
    pub members: Vec<usize>,
}

/// Groups plus the batches they are dispatched in
#[derive(Debug, Clone, Default)]
pub struct DedupPlan {
    pub groups: Vec<DescriptionGroup>,
    /// Each batch lists group indices; no batch repeats a representative id
    pub batches: Vec<Vec<usize>>,
}

impl DedupPlan {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// What the model sees for one batch
    pub fn batch_items(&self, batch: usize) -> Vec<Expenditure> {
        self.batches[batch]
            .iter()
            .map(|&g| Expenditure::new(self.groups[g].representative, &self.groups[g].description))
            .collect()
    }

    pub fn batch_ids(&self, batch: usize) -> Vec<i64> {
        self.batches[batch]
            .iter()
            .map(|&g| self.groups[g].representative)
            .collect()
    }

    /// Copy each batch's per-representative answer to every group member
    ///
    /// `answers[b]` is the validated map for batch `b`. Yields one
    /// assignment for every member of every group; a representative missing
    /// from its answer gets the sentinel.
    pub fn fan_out(&self, answers: &[HashMap<i64, Category>]) -> Vec<Assignment> {
        let mut out = Vec::with_capacity(self.groups.iter().map(|g| g.members.len()).sum());
        for (batch, groups) in self.batches.iter().enumerate() {
            let answer = answers.get(batch);
            for &g in groups {
                let group = &self.groups[g];
                let category = answer
                    .and_then(|a| a.get(&group.representative))
                    .copied()
                    .unwrap_or(Category::SENTINEL);
                out.extend(group.members.iter().map(|&position| Assignment {
                    position,
                    batch,
                    category,
                }));
            }
        }
        out
    }
}

/// One input position and the category it inherits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub position: usize,
    pub batch: usize,
    pub category: Category,
}

/// Collapses identical descriptions and chunks the representatives
#[derive(Debug, Clone, Copy)]
pub struct BatchDeduplicator {
    batch_size: usize,
}

impl BatchDeduplicator {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Group the items at `positions` by exact description, first-seen order
    pub fn group(items: &[Expenditure], positions: &[usize]) -> Vec<DescriptionGroup> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<DescriptionGroup> = Vec::new();

        for &pos in positions {
            let item = &items[pos];
            match index.get(item.description.as_str()) {
                Some(&g) => groups[g].members.push(pos),
                None => {
                    index.insert(item.description.as_str(), groups.len());
                    groups.push(DescriptionGroup {
                        representative: item.id,
                        description: item.description.clone(),
                        members: vec![pos],
                    });
                }
            }
        }
        groups
    }

    /// Chunk groups into batches of at most `batch_size`
    ///
    /// Callers may reuse ids across different descriptions; a group whose
    /// representative id is already in a batch moves on to the next batch
    /// with room, so the model never sees the same id twice in one request.
    pub fn chunk(&self, groups: &[DescriptionGroup]) -> Vec<Vec<usize>> {
        let mut batches: Vec<Vec<usize>> = Vec::new();
        let mut ids: Vec<HashSet<i64>> = Vec::new();
        // Batches before this index are full
        let mut first_open = 0;

        for (g, group) in groups.iter().enumerate() {
            let slot = (first_open..batches.len())
                .find(|&b| batches[b].len() < self.batch_size && !ids[b].contains(&group.representative));
            let b = match slot {
                Some(b) => b,
                None => {
                    batches.push(Vec::with_capacity(self.batch_size));
                    ids.push(HashSet::new());
                    batches.len() - 1
                }
            };
            batches[b].push(g);
            ids[b].insert(group.representative);

            while first_open < batches.len() && batches[first_open].len() >= self.batch_size {
                first_open += 1;
            }
        }
        batches
    }

    pub fn plan(&self, items: &[Expenditure], positions: &[usize]) -> DedupPlan {
        let groups = Self::group(items, positions);
        let batches = self.chunk(&groups);
        DedupPlan { groups, batches }
    }
}

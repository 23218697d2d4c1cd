#![forbid(unsafe_code)]

use crate::ids::{Marriage, PersonId};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectedPairReason {
    SelfPair,
    UnknownPerson(PersonId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RejectedPair {
    pub first: PersonId,
    pub second: PersonId,
    pub reason: RejectedPairReason,
}

/// Canonical marriages built from raw spouse claims.
///
/// Claims are validated and collected first; spouse lists are derived
/// afterwards from the canonical set alone, so a one-sided claim
/// (`A` lists `B`, `B` lists nobody) still yields `B -> A`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MarriageSet {
    marriages: BTreeSet<Marriage>,
    rejected: Vec<RejectedPair>,
}

impl MarriageSet {
    pub fn build(
        claims: impl IntoIterator<Item = (PersonId, PersonId)>,
        known: &BTreeSet<PersonId>,
    ) -> Self {
        let mut set = Self::default();
        for (first, second) in claims {
            let unknown = [first, second].into_iter().find(|id| !known.contains(id));
            if let Some(id) = unknown {
                set.rejected.push(RejectedPair {
                    first,
                    second,
                    reason: RejectedPairReason::UnknownPerson(id),
                });
                continue;
            }
            match Marriage::new(first, second) {
                Ok(marriage) => {
                    set.marriages.insert(marriage);
                }
                Err(_) => set.rejected.push(RejectedPair {
                    first,
                    second,
                    reason: RejectedPairReason::SelfPair,
                }),
            }
        }
        set
    }

    pub fn marriages(&self) -> impl Iterator<Item = &Marriage> {
        self.marriages.iter()
    }

    pub fn rejected(&self) -> &[RejectedPair] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.marriages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marriages.is_empty()
    }

    pub fn spouses(&self) -> BTreeMap<PersonId, Vec<PersonId>> {
        spouse_index(self.marriages.iter())
    }

    pub fn into_marriages(self) -> Vec<Marriage> {
        self.marriages.into_iter().collect()
    }
}

/// Person id to ascending spouse ids.
pub fn spouse_index<'a>(
    marriages: impl IntoIterator<Item = &'a Marriage>,
) -> BTreeMap<PersonId, Vec<PersonId>> {
    let mut out: BTreeMap<PersonId, Vec<PersonId>> = BTreeMap::new();
    for marriage in marriages {
        out.entry(marriage.a()).or_default().push(marriage.b());
        out.entry(marriage.b()).or_default().push(marriage.a());
    }
    for spouses in out.values_mut() {
        spouses.sort();
        spouses.dedup();
    }
    out
}

// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
};

/// KeyType -> { CellType } data structure.
/// Keys and cells are kept ordered, so iteration is deterministic.
#[derive(Clone, Debug)]
pub struct SetMap<KeyType, CellType>
where
    KeyType: Ord,
{
    map: BTreeMap<KeyType, BTreeSet<CellType>>,
}

impl<KeyType, CellType> Display for SetMap<KeyType, CellType>
where
    KeyType: Ord,
    KeyType: Display,
    CellType: Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (k, set) in self.map.iter() {
            writeln!(f, "{}", k)?;
            for v in set.iter() {
                writeln!(f, "\t->{}", v)?;
            }
        }
        Ok(())
    }
}

impl<KeyType, CellType> Default for SetMap<KeyType, CellType>
where
    KeyType: Ord,
    CellType: Ord,
{
    fn default() -> Self {
        SetMap::new()
    }
}

impl<KeyType, CellType> SetMap<KeyType, CellType>
where
    KeyType: Ord,
    CellType: Ord,
{
    pub fn new() -> SetMap<KeyType, CellType> {
        SetMap {
            map: BTreeMap::new(),
        }
    }

    pub fn get<'a>(&'a self, id: &KeyType) -> Option<&'a BTreeSet<CellType>> {
        self.map.get(id)
    }

    pub fn contains_key(&self, id: &KeyType) -> bool {
        self.map.contains_key(id)
    }

    /// Adds [val] to the set of [id]. Returns false if it was present already.
    pub fn insert(&mut self, id: KeyType, val: CellType) -> bool {
        self.map.entry(id).or_default().insert(val)
    }

    pub fn extend<I>(&mut self, id: KeyType, vals: I)
    where
        I: IntoIterator<Item = CellType>,
    {
        self.map.entry(id).or_default().extend(vals);
    }

    /// Number of cells stored for [id].
    pub fn len_of(&self, id: &KeyType) -> usize {
        self.map.get(id).map_or(0, |set| set.len())
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over the cells of [id]. Unknown keys yield nothing.
    pub fn set_iter<'a>(&'a self, id: &KeyType) -> impl Iterator<Item = &'a CellType> + 'a {
        self.map.get(id).into_iter().flat_map(|set| set.iter())
    }

    pub fn iter(&self) -> std::collections::btree_map::Iter<'_, KeyType, BTreeSet<CellType>> {
        self.map.iter()
    }

    pub fn keys(&self) -> std::collections::btree_map::Keys<'_, KeyType, BTreeSet<CellType>> {
        self.map.keys()
    }
}

impl<KeyType, CellType> PartialEq for SetMap<KeyType, CellType>
where
    KeyType: Ord,
    CellType: Ord,
{
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

//! Uniform spatial hash grid
//!
//! Rebuilt from scratch every tick; only tokens in the same or an adjacent
//! cell are ever tested against each other.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tokenflow_core::{TokenId, Vec3};

/// Integer cell coordinate
pub type CellCoord = (i32, i32, i32);

#[derive(Debug, Default)]
pub struct SpatialGrid {
    cell_size: f32,
    cells: FxHashMap<CellCoord, SmallVec<[TokenId; 4]>>,
    /// Cell of every indexed token, in insertion order
    entries: Vec<(TokenId, CellCoord)>,
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(0.01),
            cells: FxHashMap::default(),
            entries: Vec::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn cell_of(&self, position: Vec3) -> CellCoord {
        let c = (position / self.cell_size).floor();
        (c.x as i32, c.y as i32, c.z as i32)
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.entries.clear();
    }

    /// Replace the index with the given tokens
    pub fn rebuild(&mut self, tokens: impl IntoIterator<Item = (TokenId, Vec3)>) {
        self.clear();
        for (id, position) in tokens {
            let cell = self.cell_of(position);
            self.cells.entry(cell).or_default().push(id);
            self.entries.push((id, cell));
        }
    }

    /// Number of occupied cells
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tokens in the cell containing `position` and the 26 cells around it
    #[cfg(test)]
    fn neighbors(&self, position: Vec3) -> impl Iterator<Item = TokenId> + '_ {
        let (cx, cy, cz) = self.cell_of(position);
        neighborhood((cx, cy, cz))
            .filter_map(move |cell| self.cells.get(&cell))
            .flat_map(|ids| ids.iter().copied())
    }

    /// Every unordered pair of tokens that share or border a cell, keyed
    /// `(min, max)` with each pair listed once. Order follows insertion.
    pub fn candidate_pairs(&self) -> Vec<(TokenId, TokenId)> {
        let mut seen: FxHashSet<(TokenId, TokenId)> = FxHashSet::default();
        let mut pairs = Vec::new();
        for &(id, cell) in &self.entries {
            for neighbor_cell in neighborhood(cell) {
                let Some(ids) = self.cells.get(&neighbor_cell) else {
                    continue;
                };
                for &other in ids {
                    if other == id {
                        continue;
                    }
                    let key = if id < other { (id, other) } else { (other, id) };
                    if seen.insert(key) {
                        pairs.push(key);
                    }
                }
            }
        }
        pairs
    }
}

fn neighborhood((cx, cy, cz): CellCoord) -> impl Iterator<Item = CellCoord> {
    (-1..=1).flat_map(move |dx| {
        (-1..=1).flat_map(move |dy| (-1..=1).map(move |dz| (cx + dx, cy + dy, cz + dz)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> TokenId {
        TokenId::new(n)
    }

    #[test]
    fn test_cell_of_negative_coordinates() {
        let grid = SpatialGrid::new(2.0);
        assert_eq!(grid.cell_of(Vec3::new(0.5, 1.9, 2.0)), (0, 0, 1));
        assert_eq!(grid.cell_of(Vec3::new(-0.5, -2.0, -2.1)), (-1, -1, -2));
    }

    #[test]
    fn test_pairs_are_canonical_and_unique() {
        let mut grid = SpatialGrid::new(2.0);
        grid.rebuild([
            (id(3), Vec3::new(0.1, 0.0, 0.0)),
            (id(1), Vec3::new(0.2, 0.0, 0.0)),
            (id(2), Vec3::new(2.5, 0.0, 0.0)),
        ]);
        let pairs = grid.candidate_pairs();
        assert_eq!(pairs.len(), 3);
        for (a, b) in &pairs {
            assert!(a < b);
        }
        assert!(pairs.contains(&(id(1), id(3))));
        assert!(pairs.contains(&(id(1), id(2))));
    }

    #[test]
    fn test_distant_tokens_are_not_paired() {
        let mut grid = SpatialGrid::new(2.0);
        grid.rebuild([(id(0), Vec3::ZERO), (id(1), Vec3::new(10.0, 0.0, 0.0))]);
        assert!(grid.candidate_pairs().is_empty());
        assert_eq!(grid.occupied_cells(), 2);
        assert_eq!(grid.neighbors(Vec3::new(9.0, 0.0, 0.0)).collect::<Vec<_>>(), vec![id(1)]);
    }
}

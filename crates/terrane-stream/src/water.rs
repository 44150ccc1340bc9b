use terrane_world::ChunkCoord;

/// Decides which rendered chunks carry a water surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaterPolicy {
    /// Extend water onto chunks next to one that dips below the plane.
    pub continuity: bool,
}

impl WaterPolicy {
    /// `own_water` answers for rendered chunks only: `Some(true)` when the
    /// chunk's surface dips below the water plane, `None` when not rendered.
    pub fn carries_water(
        &self,
        coord: ChunkCoord,
        own_water: impl Fn(ChunkCoord) -> Option<bool>,
    ) -> bool {
        match own_water(coord) {
            None => false,
            Some(true) => true,
            Some(false) => {
                self.continuity
                    && coord
                        .neighbors8()
                        .into_iter()
                        .any(|n| own_water(n) == Some(true))
            }
        }
    }

    /// The chunk itself followed by its neighbors: every coordinate whose
    /// water may change when `coord` appears or disappears.
    pub fn affected(&self, coord: ChunkCoord) -> Vec<ChunkCoord> {
        let mut out = Vec::with_capacity(9);
        out.push(coord);
        if self.continuity {
            out.extend(coord.neighbors8());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(wet: &[(i32, i32)], dry: &[(i32, i32)]) -> impl Fn(ChunkCoord) -> Option<bool> {
        let wet: Vec<ChunkCoord> = wet.iter().map(|&c| c.into()).collect();
        let dry: Vec<ChunkCoord> = dry.iter().map(|&c| c.into()).collect();
        move |c| {
            if wet.contains(&c) {
                Some(true)
            } else if dry.contains(&c) {
                Some(false)
            } else {
                None
            }
        }
    }

    #[test]
    fn neighbor_water_spreads_one_ring_when_enabled() {
        let own = lookup(&[(0, 0)], &[(1, 1), (2, 0)]);
        let on = WaterPolicy { continuity: true };
        assert!(on.carries_water(ChunkCoord::new(0, 0), &own));
        assert!(on.carries_water(ChunkCoord::new(1, 1), &own));
        assert!(!on.carries_water(ChunkCoord::new(2, 0), &own));
        assert!(!on.carries_water(ChunkCoord::new(5, 5), &own));

        let off = WaterPolicy { continuity: false };
        assert!(!off.carries_water(ChunkCoord::new(1, 1), &own));
        assert_eq!(off.affected(ChunkCoord::new(0, 0)).len(), 1);
        assert_eq!(on.affected(ChunkCoord::new(0, 0)).len(), 9);
    }
}

use crate::world::error::MapError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Unwrapped offset; callers run the result through [`Geometry::wrap`].
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }

    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        self.offset(dx, dy, 0)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectorIndex {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl fmt::Display for SectorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.x, self.y, self.z)
    }
}

impl SectorIndex {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Direction::North),
            1 => Some(Direction::East),
            2 => Some(Direction::South),
            3 => Some(Direction::West),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        }
    }
}

/// Largest sector edge whose tiles still fit one sector-data frame.
pub const MAX_SECTOR_SIZE: i32 = 64;

/// World dimensions. Horizontal axes wrap; depth does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub size: i32,
    pub depth: i32,
    pub sector_size: i32,
}

impl Geometry {
    pub fn new(size: i32, depth: i32, sector_size: i32) -> Result<Self, MapError> {
        if size <= 0 || depth <= 0 || sector_size <= 0 {
            return Err(MapError::Dimensions {
                size,
                depth,
                sector_size,
            });
        }
        if sector_size > MAX_SECTOR_SIZE {
            return Err(MapError::SectorTooLarge {
                sector_size,
                max: MAX_SECTOR_SIZE,
            });
        }
        if size % sector_size != 0 {
            return Err(MapError::SectorSize { size, sector_size });
        }
        Ok(Self {
            size,
            depth,
            sector_size,
        })
    }

    pub fn area(&self) -> i32 {
        self.size * self.size
    }

    pub fn volume(&self) -> i32 {
        self.area() * self.depth
    }

    pub fn sectors_across(&self) -> i32 {
        self.size / self.sector_size
    }

    pub fn wrap(&self, value: i32) -> i32 {
        value.rem_euclid(self.size)
    }

    pub fn wrap_coord(&self, coord: Coord) -> Coord {
        Coord {
            x: self.wrap(coord.x),
            y: self.wrap(coord.y),
            z: coord.z,
        }
    }

    pub fn in_bounds(&self, coord: Coord) -> bool {
        coord.x >= 0
            && coord.x < self.size
            && coord.y >= 0
            && coord.y < self.size
            && coord.z >= 0
            && coord.z < self.depth
    }

    pub fn sector_index_of(&self, coord: Coord) -> SectorIndex {
        SectorIndex {
            x: self.wrap(coord.x) / self.sector_size,
            y: self.wrap(coord.y) / self.sector_size,
            z: coord.z,
        }
    }

    pub fn sector_in_bounds(&self, index: SectorIndex) -> bool {
        let across = self.sectors_across();
        index.x >= 0
            && index.x < across
            && index.y >= 0
            && index.y < across
            && index.z >= 0
            && index.z < self.depth
    }

    /// Position of a coordinate inside its sector, `(x, y)`.
    pub fn local_of(&self, coord: Coord) -> (i32, i32) {
        (
            self.wrap(coord.x) % self.sector_size,
            self.wrap(coord.y) % self.sector_size,
        )
    }

    pub fn sector_origin(&self, index: SectorIndex) -> Coord {
        Coord {
            x: index.x * self.sector_size,
            y: index.y * self.sector_size,
            z: index.z,
        }
    }

    pub fn index_from_coord(&self, coord: Coord) -> u32 {
        let wrapped = self.wrap_coord(coord);
        (wrapped.z * self.area() + wrapped.y * self.size + wrapped.x) as u32
    }

    pub fn coord_from_index(&self, index: u32) -> Coord {
        let index = index as i32;
        Coord {
            x: index % self.size,
            y: (index / self.size) % self.size,
            z: index / self.area(),
        }
    }

    /// Candidate tiles for placing something near `origin`, ring by ring.
    ///
    /// Each ring of radius `r` yields its top row, then its bottom row, then
    /// the left and right columns pairwise. Positions are wrapped.
    pub fn ring_positions(&self, origin: Coord, range: i32, include_origin: bool) -> Vec<Coord> {
        let mut positions = Vec::new();
        let start = if include_origin { 0 } else { 1 };
        for radius in start..=range {
            if radius == 0 {
                positions.push(self.wrap_coord(origin));
                continue;
            }
            for row in [origin.y - radius, origin.y + radius] {
                for x in (origin.x - radius)..=(origin.x + radius) {
                    positions.push(self.wrap_coord(Coord::new(x, row, origin.z)));
                }
            }
            for y in (origin.y - radius + 1)..(origin.y + radius) {
                positions.push(self.wrap_coord(Coord::new(origin.x - radius, y, origin.z)));
                positions.push(self.wrap_coord(Coord::new(origin.x + radius, y, origin.z)));
            }
        }
        positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn geometry() -> Geometry {
        Geometry::new(100, 2, 20).expect("geometry")
    }

    #[test]
    fn rejects_sector_size_that_does_not_divide_size() {
        let err = Geometry::new(100, 1, 30).expect_err("should reject");
        assert!(matches!(
            err,
            MapError::SectorSize {
                size: 100,
                sector_size: 30
            }
        ));
    }

    #[test]
    fn rejects_sectors_too_large_to_send() {
        let err = Geometry::new(256, 1, 128).expect_err("should reject");
        assert!(matches!(
            err,
            MapError::SectorTooLarge {
                sector_size: 128,
                max: MAX_SECTOR_SIZE
            }
        ));
        assert!(Geometry::new(256, 1, MAX_SECTOR_SIZE).is_ok());
    }

    #[test]
    fn wraps_negative_and_overflowing_values() {
        let geometry = geometry();
        assert_eq!(geometry.wrap(-1), 99);
        assert_eq!(geometry.wrap(100), 0);
        assert_eq!(geometry.wrap(-201), 99);
        assert_eq!(
            geometry.wrap_coord(Coord::new(-5, 105, 1)),
            Coord::new(95, 5, 1)
        );
    }

    #[test]
    fn sector_index_uses_wrapped_coords() {
        let geometry = geometry();
        assert_eq!(
            geometry.sector_index_of(Coord::new(-1, 19, 0)),
            SectorIndex::new(4, 0, 0)
        );
        assert_eq!(
            geometry.sector_index_of(Coord::new(40, 99, 1)),
            SectorIndex::new(2, 4, 1)
        );
    }

    #[test]
    fn ring_zero_with_origin_is_only_origin() {
        let geometry = geometry();
        let origin = Coord::new(10, 10, 0);
        assert_eq!(geometry.ring_positions(origin, 0, true), vec![origin]);
        assert!(geometry.ring_positions(origin, 0, false).is_empty());
    }

    #[test]
    fn ring_one_scans_top_bottom_then_columns() {
        let geometry = geometry();
        let ring = geometry.ring_positions(Coord::new(10, 10, 0), 1, false);
        let expected = vec![
            Coord::new(9, 9, 0),
            Coord::new(10, 9, 0),
            Coord::new(11, 9, 0),
            Coord::new(9, 11, 0),
            Coord::new(10, 11, 0),
            Coord::new(11, 11, 0),
            Coord::new(9, 10, 0),
            Coord::new(11, 10, 0),
        ];
        assert_eq!(ring, expected);
    }

    #[test]
    fn ring_positions_wrap_at_the_edge() {
        let geometry = geometry();
        let ring = geometry.ring_positions(Coord::new(0, 0, 0), 1, false);
        assert_eq!(ring[0], Coord::new(99, 99, 0));
        assert!(ring.iter().all(|c| geometry.in_bounds(*c)));
    }

    #[test]
    fn direction_codes_round_trip() {
        for direction in Direction::ALL {
            assert_eq!(Direction::from_code(direction.code()), Some(direction));
        }
        assert_eq!(Direction::from_code(9), None);
    }

    proptest! {
        #[test]
        fn wrap_is_idempotent_and_in_range(x in -10_000i32..10_000, y in -10_000i32..10_000) {
            let geometry = geometry();
            let once = geometry.wrap_coord(Coord::new(x, y, 0));
            let twice = geometry.wrap_coord(once);
            prop_assert_eq!(once, twice);
            prop_assert!((0..geometry.size).contains(&once.x));
            prop_assert!((0..geometry.size).contains(&once.y));
        }

        #[test]
        fn index_is_a_bijection_over_the_volume(x in 0i32..100, y in 0i32..100, z in 0i32..2) {
            let geometry = geometry();
            let coord = Coord::new(x, y, z);
            let index = geometry.index_from_coord(coord);
            prop_assert!((index as i32) < geometry.volume());
            prop_assert_eq!(geometry.coord_from_index(index), coord);
        }
    }
}

use bevy::math::Vec2;
use serde::{Deserialize, Serialize};

/// Terrain state of a single cell. Exactly one applies at a time.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Ground {
    #[default]
    Dirt = 0,
    Rock = 1,
    Mountain = 2,
    Lava = 3,
}

impl Ground {
    pub const ALL: [Ground; 4] = [Ground::Dirt, Ground::Rock, Ground::Mountain, Ground::Lava];

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Self {
        match value & 0b11 {
            0 => Ground::Dirt,
            1 => Ground::Rock,
            2 => Ground::Mountain,
            _ => Ground::Lava,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Ground::Dirt => "dirt",
            Ground::Rock => "rock",
            Ground::Mountain => "mountain",
            Ground::Lava => "lava",
        }
    }
}

/// Succession stage of the plant cover on a cell.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Vegetation {
    #[default]
    None = 0,
    Grass = 1,
    Shrub = 2,
    Tree = 3,
}

impl Vegetation {
    pub const ALL: [Vegetation; 4] = [
        Vegetation::None,
        Vegetation::Grass,
        Vegetation::Shrub,
        Vegetation::Tree,
    ];

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Self {
        match value & 0b11 {
            0 => Vegetation::None,
            1 => Vegetation::Grass,
            2 => Vegetation::Shrub,
            _ => Vegetation::Tree,
        }
    }

    pub fn is_vegetated(self) -> bool {
        self != Vegetation::None
    }

    /// The stage a cell may advance to in one tick, if any.
    pub fn next_stage(self) -> Option<Vegetation> {
        match self {
            Vegetation::None => Some(Vegetation::Grass),
            Vegetation::Grass => Some(Vegetation::Shrub),
            Vegetation::Shrub => Some(Vegetation::Tree),
            Vegetation::Tree => None,
        }
    }
}

/// One of the eight compass headings, ordered counter-clockwise starting east.
/// `y` grows downward, so north is `(0, -1)`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    E = 0,
    NE = 1,
    N = 2,
    NW = 3,
    W = 4,
    SW = 5,
    S = 6,
    SE = 7,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::E,
        Direction::NE,
        Direction::N,
        Direction::NW,
        Direction::W,
        Direction::SW,
        Direction::S,
        Direction::SE,
    ];

    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::E => (1, 0),
            Direction::NE => (1, -1),
            Direction::N => (0, -1),
            Direction::NW => (-1, -1),
            Direction::W => (-1, 0),
            Direction::SW => (-1, 1),
            Direction::S => (0, 1),
            Direction::SE => (1, 1),
        }
    }

    pub fn from_index(index: u8) -> Direction {
        Direction::ALL[(index % 8) as usize]
    }

    /// Rotate by `steps` eighth-turns; positive is counter-clockwise.
    pub fn rotate(self, steps: i32) -> Direction {
        let idx = (self as i32 + steps).rem_euclid(8);
        Direction::ALL[idx as usize]
    }

    pub fn unit(self) -> Vec2 {
        let (dx, dy) = self.offset();
        Vec2::new(dx as f32, dy as f32).normalize()
    }

    /// Cosine of the angle between two headings.
    pub fn dot(self, other: Direction) -> f32 {
        self.unit().dot(other.unit())
    }

    pub fn from_offset(dx: i32, dy: i32) -> Option<Direction> {
        let key = (dx.signum(), dy.signum());
        Direction::ALL
            .into_iter()
            .find(|dir| dir.offset() == key)
    }

    /// Closest heading for an arbitrary vector, `None` for the zero vector.
    pub fn from_vector(v: Vec2) -> Option<Direction> {
        if v.length_squared() <= f32::EPSILON {
            return None;
        }
        let angle = (-v.y).atan2(v.x);
        let octant = (angle / std::f32::consts::FRAC_PI_4).round() as i32;
        Some(Direction::ALL[octant.rem_euclid(8) as usize])
    }
}

/// The logical triple that display encodings pack per cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CellState {
    pub ground: Ground,
    pub vegetation: Vegetation,
    pub burning: bool,
}

impl CellState {
    const BURNING_BIT: u8 = 1 << 4;

    /// Ground in bits 0-1, vegetation in bits 2-3, burning in bit 4.
    pub fn pack(self) -> u8 {
        let mut packed = self.ground.as_u8() | (self.vegetation.as_u8() << 2);
        if self.burning {
            packed |= Self::BURNING_BIT;
        }
        packed
    }

    pub fn unpack(packed: u8) -> Self {
        Self {
            ground: Ground::from_u8(packed),
            vegetation: Vegetation::from_u8(packed >> 2),
            burning: packed & Self::BURNING_BIT != 0,
        }
    }
}

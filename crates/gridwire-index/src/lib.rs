//! Cell coordinates, layers, and the per-layer slot index backing gridwire puzzles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use thiserror::Error;

/// Distance from a cell centre to an edge slot (thin, inside the cell).
pub const EDGE_OFFSET: f32 = 0.4;
/// Distance from a cell centre to a shared-edge slot (on the border).
pub const SHARED_EDGE_OFFSET: f32 = 0.5;

/// Errors emitted by the slot index.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    /// Indicates configuration values that cannot be used (e.g., odd grid size).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// The cell's coordinate system does not match the layer it targets.
    #[error("cell {cell} does not use the {expected:?} coordinate system of layer {layer:?}")]
    SystemMismatch {
        layer: Layer,
        cell: Cell,
        expected: CoordinateSystem,
    },
    /// The cell lies outside the square extent of the grid.
    #[error("cell {cell} is outside the grid")]
    OutOfBounds { cell: Cell },
    /// The slot already holds a different occupant.
    #[error("slot {cell} on layer {layer:?} is already occupied")]
    Occupied { layer: Layer, cell: Cell },
}

/// Coordinate system a cell is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CoordinateSystem {
    #[default]
    Invalid,
    Grid,
    Edge,
    SharedEdge,
}

impl CoordinateSystem {
    /// Number of slots reserved per grid cell.
    #[must_use]
    pub const fn stride(self) -> usize {
        match self {
            Self::Invalid => 0,
            Self::Grid => 1,
            Self::SharedEdge => 2,
            Self::Edge => 4,
        }
    }
}

/// Orientation of a cell relative to its owning grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Edge {
    #[default]
    None,
    North,
    East,
    South,
    West,
}

impl Edge {
    pub const ALL: [Edge; 4] = [Edge::North, Edge::East, Edge::South, Edge::West];

    /// Stable byte code used by the document format.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::North => 1,
            Self::East => 2,
            Self::South => 3,
            Self::West => 4,
        }
    }

    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::North),
            2 => Some(Self::East),
            3 => Some(Self::South),
            4 => Some(Self::West),
            _ => None,
        }
    }

    /// Unit offset pointing from the cell centre toward this edge.
    #[must_use]
    pub const fn direction(self) -> (i32, i32) {
        match self {
            Self::None => (0, 0),
            Self::North => (0, 1),
            Self::East => (1, 0),
            Self::South => (0, -1),
            Self::West => (-1, 0),
        }
    }

    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::None => Self::None,
            Self::North => Self::South,
            Self::East => Self::West,
            Self::South => Self::North,
            Self::West => Self::East,
        }
    }

    fn slot(self, system: CoordinateSystem) -> Option<usize> {
        match (system, self) {
            (CoordinateSystem::Grid, Self::None) => Some(0),
            (CoordinateSystem::Edge | CoordinateSystem::SharedEdge, Self::North) => Some(0),
            (CoordinateSystem::Edge | CoordinateSystem::SharedEdge, Self::East) => Some(1),
            (CoordinateSystem::Edge, Self::South) => Some(2),
            (CoordinateSystem::Edge, Self::West) => Some(3),
            _ => None,
        }
    }
}

/// Integer coordinate tagged with its coordinate system and edge orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
    pub system: CoordinateSystem,
    pub edge: Edge,
}

impl Cell {
    /// Sentinel meaning "no cell".
    pub const INVALID: Cell = Cell {
        x: i32::MIN,
        y: i32::MIN,
        system: CoordinateSystem::Invalid,
        edge: Edge::None,
    };

    #[must_use]
    pub const fn grid(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            system: CoordinateSystem::Grid,
            edge: Edge::None,
        }
    }

    /// Thin edge cell inside grid cell `(x, y)`. Returns [`Cell::INVALID`] for `Edge::None`.
    #[must_use]
    pub const fn edge(x: i32, y: i32, edge: Edge) -> Self {
        if matches!(edge, Edge::None) {
            return Self::INVALID;
        }
        Self {
            x,
            y,
            system: CoordinateSystem::Edge,
            edge,
        }
    }

    /// Border shared between two grid cells, normalised to its North/East owner.
    /// Returns [`Cell::INVALID`] when the owner lies outside the `i32` range.
    #[must_use]
    pub const fn shared_edge(x: i32, y: i32, edge: Edge) -> Self {
        let (x, y, edge) = match edge {
            Edge::None => return Self::INVALID,
            Edge::South => match y.checked_sub(1) {
                Some(y) => (x, y, Edge::North),
                None => return Self::INVALID,
            },
            Edge::West => match x.checked_sub(1) {
                Some(x) => (x, y, Edge::East),
                None => return Self::INVALID,
            },
            other => (x, y, other),
        };
        Self {
            x,
            y,
            system: CoordinateSystem::SharedEdge,
            edge,
        }
    }

    /// Builds a cell in `system`, enforcing the edge/system invariant.
    #[must_use]
    pub const fn in_system(x: i32, y: i32, system: CoordinateSystem, edge: Edge) -> Self {
        match system {
            CoordinateSystem::Grid if matches!(edge, Edge::None) => Self::grid(x, y),
            CoordinateSystem::Edge => Self::edge(x, y, edge),
            CoordinateSystem::SharedEdge => Self::shared_edge(x, y, edge),
            _ => Self::INVALID,
        }
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        !matches!(self.system, CoordinateSystem::Invalid)
    }

    /// Grid cell that owns this cell.
    #[must_use]
    pub const fn to_grid(self) -> Self {
        if !self.is_valid() {
            return Self::INVALID;
        }
        Self::grid(self.x, self.y)
    }

    /// Component-wise minimum of the coordinates; keeps `self`'s tag.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        Self {
            x: self.x.min(other.x),
            y: self.y.min(other.y),
            ..self
        }
    }

    /// Component-wise maximum of the coordinates; keeps `self`'s tag.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        Self {
            x: self.x.max(other.x),
            y: self.y.max(other.y),
            ..self
        }
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::INVALID
    }
}

impl Add for Cell {
    type Output = Cell;

    fn add(self, rhs: Cell) -> Cell {
        Cell {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            ..self
        }
    }
}

impl Sub for Cell {
    type Output = Cell;

    fn sub(self, rhs: Cell) -> Cell {
        Cell {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            ..self
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.system {
            CoordinateSystem::Invalid => write!(f, "(invalid)"),
            CoordinateSystem::Grid => write!(f, "({}, {})", self.x, self.y),
            system => write!(f, "({}, {}, {:?} {:?})", self.x, self.y, system, self.edge),
        }
    }
}

/// Continuous world-space position; one grid cell spans one world unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldPoint {
    pub x: f32,
    pub y: f32,
}

impl WorldPoint {
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Planes a tile can occupy, in ascending stacking order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Layer {
    Floor,
    InvisibleFloor,
    Wall,
    InvisibleWall,
    Static,
    InvisibleStatic,
    Dynamic,
    Logic,
}

impl Layer {
    pub const COUNT: usize = 8;

    /// Every layer in ascending order.
    pub const ALL: [Layer; Layer::COUNT] = [
        Layer::Floor,
        Layer::InvisibleFloor,
        Layer::Wall,
        Layer::InvisibleWall,
        Layer::Static,
        Layer::InvisibleStatic,
        Layer::Dynamic,
        Layer::Logic,
    ];

    #[must_use]
    pub const fn system(self) -> CoordinateSystem {
        match self {
            Self::Wall => CoordinateSystem::SharedEdge,
            Self::InvisibleWall => CoordinateSystem::Edge,
            _ => CoordinateSystem::Grid,
        }
    }

    #[must_use]
    pub const fn stride(self) -> usize {
        self.system().stride()
    }

    /// Invisible layers hold logic-only tiles that are never rendered.
    #[must_use]
    pub const fn is_visible(self) -> bool {
        !matches!(
            self,
            Self::InvisibleFloor | Self::InvisibleWall | Self::InvisibleStatic
        )
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Layers in top-down scanning order.
    pub fn top_down() -> impl Iterator<Item = Layer> {
        Self::ALL.into_iter().rev()
    }
}

/// Dense per-layer slot storage keyed by `(layer, cell)`.
#[derive(Debug, Clone)]
pub struct SpatialGrid<T> {
    size: i32,
    layers: Vec<Vec<Option<T>>>,
}

impl<T: Copy + PartialEq + fmt::Debug> SpatialGrid<T> {
    /// Create an empty grid spanning `size × size` cells centred on the origin.
    pub fn new(size: u32) -> Result<Self, GridError> {
        if size < 2 || size > 4096 {
            return Err(GridError::InvalidConfig("grid size must be in 2..=4096"));
        }
        if size % 2 != 0 {
            return Err(GridError::InvalidConfig("grid size must be even"));
        }
        let cells = (size as usize) * (size as usize);
        let layers = Layer::ALL
            .iter()
            .map(|layer| vec![None; cells * layer.stride()])
            .collect();
        Ok(Self {
            size: size as i32,
            layers,
        })
    }

    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size as u32
    }

    /// Inclusive coordinate range covered along either axis.
    #[must_use]
    pub const fn bounds(&self) -> (i32, i32) {
        let min = -(self.size / 2);
        (min, self.size - self.size / 2 - 1)
    }

    /// Returns true when the coordinates of `cell` fall inside the grid.
    #[must_use]
    pub fn contains(&self, cell: Cell) -> bool {
        let (min, max) = self.bounds();
        cell.is_valid() && (min..=max).contains(&cell.x) && (min..=max).contains(&cell.y)
    }

    /// Flat slot index for `cell` on `layer`.
    pub fn index(&self, layer: Layer, cell: Cell) -> Result<usize, GridError> {
        let expected = layer.system();
        if cell.system != expected {
            return Err(GridError::SystemMismatch {
                layer,
                cell,
                expected,
            });
        }
        let slot = cell
            .edge
            .slot(expected)
            .ok_or(GridError::SystemMismatch {
                layer,
                cell,
                expected,
            })?;
        if !self.contains(cell) {
            return Err(GridError::OutOfBounds { cell });
        }
        let size = i64::from(self.size);
        let center = (size / 2) * (size + 1);
        let stride = expected.stride() as i64;
        let index = stride * (center + i64::from(cell.x) + i64::from(cell.y) * size) + slot as i64;
        let len = self.layers[layer.index()].len() as i64;
        if index < 0 || index >= len {
            return Err(GridError::OutOfBounds { cell });
        }
        Ok(index as usize)
    }

    /// Occupant of `(layer, cell)`, if any.
    #[must_use]
    pub fn get(&self, layer: Layer, cell: Cell) -> Option<T> {
        let index = self.index(layer, cell).ok()?;
        self.layers[layer.index()][index]
    }

    /// Place `handle` into `(layer, cell)`.
    ///
    /// Returns `Ok(false)` when the slot already holds `handle`; a different
    /// occupant is never overwritten.
    pub fn link(&mut self, layer: Layer, cell: Cell, handle: T) -> Result<bool, GridError> {
        let index = self.index(layer, cell)?;
        let slot = &mut self.layers[layer.index()][index];
        match *slot {
            Some(current) if current == handle => Ok(false),
            Some(_) => Err(GridError::Occupied { layer, cell }),
            None => {
                *slot = Some(handle);
                Ok(true)
            }
        }
    }

    /// Clear `(layer, cell)` only if it currently holds `handle`.
    pub fn unlink(&mut self, layer: Layer, cell: Cell, handle: T) -> bool {
        let Ok(index) = self.index(layer, cell) else {
            return false;
        };
        let slot = &mut self.layers[layer.index()][index];
        if *slot == Some(handle) {
            *slot = None;
            true
        } else {
            false
        }
    }

    /// Occupants at `cell`, scanning layers top-down.
    pub fn occupants(&self, cell: Cell) -> impl Iterator<Item = (Layer, T)> + '_ {
        Layer::top_down()
            .filter(move |layer| layer.system() == cell.system)
            .filter_map(move |layer| self.get(layer, cell).map(|handle| (layer, handle)))
    }

    /// Topmost occupant at `cell`.
    #[must_use]
    pub fn topmost(&self, cell: Cell) -> Option<(Layer, T)> {
        self.occupants(cell).next()
    }

    /// Iterate all occupants of `layer` in slot order.
    pub fn iter_layer(&self, layer: Layer) -> impl Iterator<Item = T> + '_ {
        self.layers[layer.index()].iter().filter_map(|slot| *slot)
    }

    /// Remove every occupant from every layer.
    pub fn clear(&mut self) {
        for layer in &mut self.layers {
            layer.fill(None);
        }
    }
}

/// World-space centre of `cell`.
#[must_use]
pub fn cell_to_world(cell: Cell) -> WorldPoint {
    let (dx, dy) = cell.edge.direction();
    let offset = match cell.system {
        CoordinateSystem::Edge => EDGE_OFFSET,
        CoordinateSystem::SharedEdge => SHARED_EDGE_OFFSET,
        _ => 0.0,
    };
    WorldPoint::new(
        cell.x as f32 + dx as f32 * offset,
        cell.y as f32 + dy as f32 * offset,
    )
}

/// Snap `point` to the nearest cell in `system`.
#[must_use]
pub fn world_to_cell(point: WorldPoint, system: CoordinateSystem) -> Cell {
    if !point.x.is_finite() || !point.y.is_finite() {
        return Cell::INVALID;
    }
    let gx = point.x.round();
    let gy = point.y.round();
    let (x, y) = (gx as i32, gy as i32);
    let dx = point.x - gx;
    let dy = point.y - gy;
    let edge = if dx.abs() > dy.abs() {
        if dx >= 0.0 { Edge::East } else { Edge::West }
    } else if dy >= 0.0 {
        Edge::North
    } else {
        Edge::South
    };
    match system {
        CoordinateSystem::Grid => Cell::grid(x, y),
        CoordinateSystem::Edge => Cell::edge(x, y, edge),
        CoordinateSystem::SharedEdge => Cell::shared_edge(x, y, edge),
        CoordinateSystem::Invalid => Cell::INVALID,
    }
}

/// World-space snapping tolerance for `system`.
#[must_use]
pub fn snap_tolerance(system: CoordinateSystem) -> f32 {
    match system {
        CoordinateSystem::Grid => std::f32::consts::FRAC_1_SQRT_2,
        CoordinateSystem::Edge | CoordinateSystem::SharedEdge => 1.0,
        CoordinateSystem::Invalid => 0.0,
    }
}

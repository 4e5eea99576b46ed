//! Core types shared across the gridwire workspace.
//!
//! A [`Puzzle`] owns the spatial grid, the live tiles, and the port/wire
//! graph connecting them. Tiles are instantiated from [`TileTemplate`]s held
//! in a validated [`TileSet`]; each template's components publish static
//! [`PropertyDescriptor`] tables that double as the editable/serializable
//! property list and the port declarations.

pub mod builtin;
pub mod component;
pub mod event;
pub mod port;
pub mod property;
pub mod puzzle;
pub mod shared;
pub mod tileset;

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use gridwire_index::{
    Cell, CoordinateSystem, Edge, GridError, Layer, SpatialGrid, WorldPoint, cell_to_world,
    world_to_cell,
};

pub use component::{Effect, TileComponent, TileContext};
pub use event::{Event, EventKind, Routing};
pub use port::{
    Connection, ConnectionOptions, MAX_CONNECTION_OPTIONS, Port, PortGraph, Wire, WireError,
    WireSide,
};
pub use property::{
    ComponentKind, ComponentRef, Decal, PortFlow, PortMetadata, PortType, PropertyDescriptor,
    PropertyError, PropertyKind, PropertyValue, SignalKind, TileProperty,
};
pub use puzzle::{PropagationError, Puzzle, Tile};
pub use shared::SharedData;
pub use tileset::{ComponentFactory, TileSet, TileSetError, TileTemplate};

new_key_type! {
    /// Stable handle for placed tiles.
    pub struct TileId;
    /// Handle for a port owned by a tile.
    pub struct PortId;
    /// Handle for a wire joining an output port to an input port.
    pub struct WireId;
}

/// 128-bit identifier used for templates and asset references.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Guid(pub [u8; 16]);

impl Guid {
    pub const NIL: Guid = Guid([0; 16]);

    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self(value.to_be_bytes())
    }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    #[must_use]
    pub fn is_nil(&self) -> bool {
        *self == Self::NIL
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                f.write_str("-")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({self})")
    }
}

/// Error returned when parsing a [`Guid`] from text.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid guid: {0}")]
pub struct GuidParseError(String);

impl FromStr for Guid {
    type Err = GuidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: Vec<u8> = s.bytes().filter(|b| *b != b'-').collect();
        if digits.len() != 32 {
            return Err(GuidParseError(s.to_string()));
        }
        let mut bytes = [0u8; 16];
        for (slot, pair) in bytes.iter_mut().zip(digits.chunks(2)) {
            let text = std::str::from_utf8(pair).map_err(|_| GuidParseError(s.to_string()))?;
            *slot = u8::from_str_radix(text, 16).map_err(|_| GuidParseError(s.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

/// Simulation tick counter.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick(pub u64);

impl Tick {
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Errors that can occur when constructing or editing a puzzle.
#[derive(Debug, Error)]
pub enum PuzzleError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("unknown template {0}")]
    UnknownTemplate(Guid),
    #[error("unknown tile")]
    UnknownTile,
    #[error("cell {cell} cannot host a {layer:?} tile")]
    CellMismatch { cell: Cell, layer: Layer },
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Static configuration for a puzzle instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PuzzleConfig {
    /// Square extent of the grid in cells; must be even.
    pub grid_size: u32,
    /// Maximum nesting of re-entrant deliveries before a chain is aborted.
    pub max_propagation_depth: usize,
    /// Wall-clock interval between ticks, used by schedulers driving the puzzle.
    pub tick_interval_ms: u64,
}

impl Default for PuzzleConfig {
    fn default() -> Self {
        Self {
            grid_size: 64,
            max_propagation_depth: 256,
            tick_interval_ms: 100,
        }
    }
}

impl PuzzleConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), PuzzleError> {
        if self.grid_size < 2 || self.grid_size > 4096 {
            return Err(PuzzleError::InvalidConfig(
                "grid_size must be in 2..=4096",
            ));
        }
        if self.grid_size % 2 != 0 {
            return Err(PuzzleError::InvalidConfig("grid_size must be even"));
        }
        if self.max_propagation_depth == 0 {
            return Err(PuzzleError::InvalidConfig(
                "max_propagation_depth must be non-zero",
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(PuzzleError::InvalidConfig(
                "tick_interval_ms must be non-zero",
            ));
        }
        Ok(())
    }
}

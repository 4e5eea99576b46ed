//! The puzzle document: grid, tiles, wire graph, and the propagation driver.

use crate::component::{Effect, TileComponent, TileContext};
use crate::event::{Event, EventKind, Routing};
use crate::port::{PortGraph, Wire, WireError};
use crate::property::{
    ComponentKind, PortFlow, PortType, PropertyError, PropertyValue, TileProperty,
};
use crate::shared::SharedData;
use crate::tileset::TileSet;
use crate::{Guid, PortId, PuzzleConfig, PuzzleError, Tick, TileId, WireId};
use gridwire_index::{Cell, Layer, SpatialGrid};
use slotmap::SlotMap;
use std::cmp::Reverse;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Failure raised while pushing changes through the wire graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PropagationError {
    #[error("propagation exceeded the depth limit of {limit}")]
    DepthExceeded { limit: usize },
}

/// A placed tile instance.
#[derive(Debug)]
pub struct Tile {
    template: Guid,
    custom_name: Option<String>,
    cell: Cell,
    layer: Layer,
    linked: bool,
    components: Vec<Box<dyn TileComponent>>,
    /// Component indices in dispatch order (priority descending, stable).
    dispatch: Vec<usize>,
    properties: Arc<[TileProperty]>,
    /// One entry per property; `Some` for port properties.
    ports: Vec<Option<PortId>>,
}

impl Tile {
    #[must_use]
    pub fn template(&self) -> Guid {
        self.template
    }

    #[must_use]
    pub fn custom_name(&self) -> Option<&str> {
        self.custom_name.as_deref()
    }

    #[must_use]
    pub fn cell(&self) -> Cell {
        self.cell
    }

    #[must_use]
    pub fn layer(&self) -> Layer {
        self.layer
    }

    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.linked
    }

    #[must_use]
    pub fn properties(&self) -> &[TileProperty] {
        &self.properties
    }

    /// Port bound to the property at `index`.
    #[must_use]
    pub fn port_at(&self, index: usize) -> Option<PortId> {
        self.ports.get(index).copied().flatten()
    }

    #[must_use]
    pub fn port(&self, name: &str) -> Option<PortId> {
        self.property_index(name).and_then(|index| self.port_at(index))
    }

    #[must_use]
    pub fn property_index(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name == name)
    }

    #[must_use]
    pub fn components(&self) -> &[Box<dyn TileComponent>] {
        &self.components
    }

    /// Index of the first attached component of `kind`.
    #[must_use]
    pub fn component_index(&self, kind: ComponentKind) -> Option<usize> {
        self.components.iter().position(|c| c.kind() == kind)
    }
}

/// Owns everything that makes up one puzzle instance.
#[derive(Debug)]
pub struct Puzzle {
    config: PuzzleConfig,
    tileset: Arc<TileSet>,
    grid: SpatialGrid<TileId>,
    tiles: SlotMap<TileId, Tile>,
    order: Vec<TileId>,
    graph: PortGraph,
    shared: SharedData,
    tick: Tick,
    tick_subscribers: Vec<TileId>,
    depth: usize,
}

impl Puzzle {
    /// Create an empty puzzle after validating `config`.
    pub fn new(config: PuzzleConfig, tileset: Arc<TileSet>) -> Result<Self, PuzzleError> {
        config.validate()?;
        let grid = SpatialGrid::new(config.grid_size)?;
        Ok(Self {
            config,
            tileset,
            grid,
            tiles: SlotMap::with_key(),
            order: Vec::new(),
            graph: PortGraph::new(),
            shared: SharedData::new(),
            tick: Tick::zero(),
            tick_subscribers: Vec::new(),
            depth: 0,
        })
    }

    #[must_use]
    pub fn config(&self) -> &PuzzleConfig {
        &self.config
    }

    #[must_use]
    pub fn tileset(&self) -> &Arc<TileSet> {
        &self.tileset
    }

    #[must_use]
    pub fn grid(&self) -> &SpatialGrid<TileId> {
        &self.grid
    }

    #[must_use]
    pub fn graph(&self) -> &PortGraph {
        &self.graph
    }

    /// Direct graph access for loaders restoring persisted wires.
    pub fn graph_mut(&mut self) -> &mut PortGraph {
        &mut self.graph
    }

    #[must_use]
    pub fn shared(&self) -> &SharedData {
        &self.shared
    }

    #[must_use]
    pub fn tick(&self) -> Tick {
        self.tick
    }

    #[must_use]
    pub fn tile(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(id)
    }

    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Tiles in spawn order.
    pub fn tiles(&self) -> impl Iterator<Item = (TileId, &Tile)> {
        self.order
            .iter()
            .filter_map(|id| self.tiles.get(*id).map(|tile| (*id, tile)))
    }

    /// Instantiate `template` and link it at `cell`.
    pub fn spawn_tile(&mut self, template: Guid, cell: Cell) -> Result<TileId, PuzzleError> {
        let Some(found) = self.tileset.template(template) else {
            warn!(%template, "spawn refused: unknown template");
            return Err(PuzzleError::UnknownTemplate(template));
        };
        let layer = found.layer();
        if cell.system != layer.system() {
            warn!(%cell, ?layer, "spawn refused: coordinate system mismatch");
            return Err(PuzzleError::CellMismatch { cell, layer });
        }
        let components = found.instantiate();
        let properties = Arc::clone(found.properties());
        let mut dispatch: Vec<usize> = (0..components.len()).collect();
        dispatch.sort_by_key(|index| Reverse(components[*index].priority()));
        let ticks = components.iter().any(|c| c.wants_ticks());

        let id = self.tiles.insert(Tile {
            template,
            custom_name: None,
            cell,
            layer,
            linked: false,
            components,
            dispatch,
            properties: Arc::clone(&properties),
            ports: Vec::new(),
        });
        if let Err(err) = self.grid.link(layer, cell, id) {
            warn!(%cell, ?layer, %err, "spawn refused: cannot link tile");
            self.tiles.remove(id);
            return Err(err.into());
        }
        let ports = properties
            .iter()
            .map(|property| {
                property
                    .port
                    .map(|metadata| self.graph.add_port(id, property.name, metadata))
            })
            .collect();
        if let Some(tile) = self.tiles.get_mut(id) {
            tile.ports = ports;
            tile.linked = true;
        }
        self.order.push(id);
        if ticks {
            self.tick_subscribers.push(id);
        }
        debug!(?id, %template, %cell, "tile spawned");
        Ok(id)
    }

    /// Unlink `id`, release its ports and wires, and drop it.
    pub fn destroy_tile(&mut self, id: TileId) -> Result<(), PuzzleError> {
        let tile = self.tiles.remove(id).ok_or(PuzzleError::UnknownTile)?;
        if tile.linked {
            self.grid.unlink(tile.layer, tile.cell, id);
        }
        let released: usize = tile
            .ports
            .iter()
            .flatten()
            .map(|port| self.graph.remove_port(*port).len())
            .sum();
        self.order.retain(|other| *other != id);
        self.tick_subscribers.retain(|other| *other != id);
        debug!(?id, released, "tile destroyed");
        Ok(())
    }

    /// Link an unlinked tile into its slot. Returns false when refused.
    pub fn link_tile(&mut self, id: TileId) -> bool {
        let Some(tile) = self.tiles.get_mut(id) else {
            return false;
        };
        match self.grid.link(tile.layer, tile.cell, id) {
            Ok(true) => {
                tile.linked = true;
                true
            }
            Ok(false) => {
                warn!(?id, cell = %tile.cell, "tile already linked at its cell");
                true
            }
            Err(err) => {
                warn!(?id, cell = %tile.cell, layer = ?tile.layer, %err, "link refused");
                false
            }
        }
    }

    /// Clear the tile's slot if it still holds this tile.
    pub fn unlink_tile(&mut self, id: TileId) -> bool {
        let Some(tile) = self.tiles.get_mut(id) else {
            return false;
        };
        let cleared = self.grid.unlink(tile.layer, tile.cell, id);
        tile.linked = false;
        cleared
    }

    /// Re-link the tile at `cell`; on failure the tile stays where it was.
    pub fn move_tile(&mut self, id: TileId, cell: Cell) -> Result<(), PuzzleError> {
        let tile = self.tiles.get_mut(id).ok_or(PuzzleError::UnknownTile)?;
        let (layer, from) = (tile.layer, tile.cell);
        if cell.system != layer.system() {
            return Err(PuzzleError::CellMismatch { cell, layer });
        }
        if from == cell {
            return Ok(());
        }
        if tile.linked {
            self.grid.unlink(layer, from, id);
        }
        match self.grid.link(layer, cell, id) {
            Ok(_) => {
                tile.cell = cell;
                tile.linked = true;
                Ok(())
            }
            Err(err) => {
                warn!(?id, %from, to = %cell, %err, "move refused");
                if tile.linked && self.grid.link(layer, from, id).is_err() {
                    tile.linked = false;
                }
                Err(err.into())
            }
        }
    }

    pub fn rename_tile(&mut self, id: TileId, name: Option<String>) -> Result<(), PuzzleError> {
        let tile = self.tiles.get_mut(id).ok_or(PuzzleError::UnknownTile)?;
        tile.custom_name = name.filter(|n| !n.is_empty());
        Ok(())
    }

    /// Tile occupying `(layer, cell)`.
    #[must_use]
    pub fn cell_to_tile(&self, cell: Cell, layer: Layer) -> Option<TileId> {
        self.grid.get(layer, cell)
    }

    /// Topmost tile at `cell` across layers sharing its coordinate system.
    #[must_use]
    pub fn topmost_tile(&self, cell: Cell) -> Option<TileId> {
        self.grid.topmost(cell).map(|(_, id)| id)
    }

    /// Current value of the property `name` on `tile`.
    pub fn value(&self, tile: TileId, name: &str) -> Result<PropertyValue, PropertyError> {
        let tile = self.tiles.get(tile).ok_or(PropertyError::UnknownTile)?;
        let index = tile
            .property_index(name)
            .ok_or_else(|| PropertyError::UnknownProperty(name.to_string()))?;
        let property = &tile.properties[index];
        if property.is_port() {
            return tile
                .port_at(index)
                .map(PropertyValue::Port)
                .ok_or_else(|| PropertyError::UnknownProperty(name.to_string()));
        }
        tile.components[property.component]
            .get(name)
            .ok_or_else(|| PropertyError::UnknownProperty(name.to_string()))
    }

    pub fn set_value(
        &mut self,
        tile: TileId,
        name: &str,
        value: PropertyValue,
    ) -> Result<(), PropertyError> {
        let tile = self.tiles.get_mut(tile).ok_or(PropertyError::UnknownTile)?;
        let index = tile
            .property_index(name)
            .ok_or_else(|| PropertyError::UnknownProperty(name.to_string()))?;
        let property = &tile.properties[index];
        if property.is_port() {
            return Err(PropertyError::ReadOnly(name.to_string()));
        }
        if value.kind() != property.kind {
            return Err(PropertyError::mismatch(name, property.kind, &value));
        }
        let component = property.component;
        tile.components[component].set(name, value)
    }

    #[must_use]
    pub fn port(&self, tile: TileId, name: &str) -> Option<PortId> {
        self.tiles.get(tile)?.port(name)
    }

    /// Wire `from_tile.from` (an output) to `to_tile.to` (an input).
    pub fn connect(
        &mut self,
        from_tile: TileId,
        from: &str,
        to_tile: TileId,
        to: &str,
    ) -> Result<WireId, PuzzleError> {
        let source = self.port(from_tile, from).ok_or(WireError::UnknownPort)?;
        let target = self.port(to_tile, to).ok_or(WireError::UnknownPort)?;
        let wire = self.graph.connect(source, target)?;
        debug!(?wire, from, to, "wire connected");
        Ok(wire)
    }

    pub fn disconnect(&mut self, wire: WireId) -> Option<Wire> {
        self.graph.disconnect(wire)
    }

    /// Set every wire on the named power output.
    pub fn set_powered(
        &mut self,
        tile: TileId,
        name: &str,
        enabled: bool,
    ) -> Result<(), PropagationError> {
        match self.output(tile, name) {
            Some(port) => self.power_port(port, None, enabled),
            None => Ok(()),
        }
    }

    /// Set one wire, by position, on the named power output.
    pub fn set_wire_powered(
        &mut self,
        tile: TileId,
        name: &str,
        wire_index: usize,
        enabled: bool,
    ) -> Result<(), PropagationError> {
        match self.output(tile, name) {
            Some(port) => self.power_port(port, Some(wire_index), enabled),
            None => Ok(()),
        }
    }

    pub fn send_value(
        &mut self,
        tile: TileId,
        name: &str,
        value: i32,
        transient: bool,
    ) -> Result<(), PropagationError> {
        match self.output(tile, name) {
            Some(port) => self.push_value(port, value, transient),
            None => Ok(()),
        }
    }

    pub fn send_signal(&mut self, tile: TileId, name: &str) -> Result<(), PropagationError> {
        match self.output(tile, name) {
            Some(port) => self.signal_port(port),
            None => Ok(()),
        }
    }

    fn output(&self, tile: TileId, name: &str) -> Option<PortId> {
        let port = self.port(tile, name);
        if port.is_none() {
            warn!(?tile, port = name, "no such port");
        }
        port
    }

    /// Deliver `event` to `tile`; returns the handled flag.
    pub fn send(&mut self, tile: TileId, event: &mut Event) -> Result<bool, PropagationError> {
        let limit = self.config.max_propagation_depth;
        if self.depth >= limit {
            error!(?tile, kind = ?event.kind, limit, "propagation depth exceeded");
            return Err(PropagationError::DepthExceeded { limit });
        }
        self.depth += 1;
        let result = self.dispatch(tile, event);
        self.depth -= 1;
        result
    }

    fn dispatch(&mut self, tile: TileId, event: &mut Event) -> Result<bool, PropagationError> {
        let Some(order) = self.tiles.get(tile).map(|t| t.dispatch.clone()) else {
            return Ok(false);
        };
        for index in order {
            let effects = {
                let Some(target) = self.tiles.get_mut(tile) else {
                    break;
                };
                let mut cx = TileContext::new(
                    tile,
                    target.cell,
                    self.tick,
                    &target.properties,
                    &target.ports,
                    &self.graph,
                    &mut self.shared,
                );
                target.components[index].on_event(event, &mut cx);
                cx.into_effects()
            };
            for effect in effects {
                self.apply(effect)?;
            }
            if event.handled {
                break;
            }
        }
        Ok(event.handled)
    }

    fn apply(&mut self, effect: Effect) -> Result<(), PropagationError> {
        match effect {
            Effect::SetPowered { port, enabled } => self.power_port(port, None, enabled),
            Effect::SetWirePowered {
                port,
                wire_index,
                enabled,
            } => self.power_port(port, Some(wire_index), enabled),
            Effect::SendValue {
                port,
                value,
                transient,
            } => self.push_value(port, value, transient),
            Effect::SendSignal { port } => self.signal_port(port),
        }
    }

    /// Wires of `port` when it is an output of `expected` type.
    fn output_wires(&self, port: PortId, expected: PortType) -> Option<Vec<WireId>> {
        let Some(found) = self.graph.port(port) else {
            warn!(?port, "unknown port");
            return None;
        };
        if found.flow() != PortFlow::Output || found.port_type() != expected {
            warn!(
                port = found.name(),
                flow = ?found.flow(),
                port_type = ?found.port_type(),
                ?expected,
                "ignoring send on a port of the wrong type"
            );
            return None;
        }
        Some(found.wires().to_vec())
    }

    fn power_port(
        &mut self,
        port: PortId,
        wire_index: Option<usize>,
        enabled: bool,
    ) -> Result<(), PropagationError> {
        let Some(mut wires) = self.output_wires(port, PortType::Power) else {
            return Ok(());
        };
        if let Some(index) = wire_index {
            match wires.get(index) {
                Some(wire) => wires = vec![*wire],
                None => {
                    warn!(?port, index, "wire index out of range");
                    return Ok(());
                }
            }
        }
        for wire in wires {
            let Some(state) = self.graph.wire_mut(wire) else {
                continue;
            };
            if state.enabled == enabled {
                continue;
            }
            state.enabled = enabled;
            let (input, target) = (state.to.port, state.to.tile);
            let Some(input_port) = self.graph.port(input) else {
                continue;
            };
            let kind = match input_port.port_type() {
                PortType::Signal if enabled => EventKind::Signal {
                    input: input_port.name(),
                    kind: input_port.signal_kind(),
                },
                PortType::Signal => continue,
                _ => EventKind::PowerChanged {
                    input: input_port.name(),
                    enabled,
                },
            };
            self.send(target, &mut Event::new(kind))?;
        }
        Ok(())
    }

    fn push_value(
        &mut self,
        port: PortId,
        value: i32,
        transient: bool,
    ) -> Result<(), PropagationError> {
        let Some(wires) = self.output_wires(port, PortType::Number) else {
            return Ok(());
        };
        for wire in wires {
            let Some(state) = self.graph.wire_mut(wire) else {
                continue;
            };
            if state.value == value {
                continue;
            }
            state.value = value;
            let (input, target) = (state.to.port, state.to.tile);
            let Some(input_port) = self.graph.port(input) else {
                continue;
            };
            let kind = EventKind::ValueChanged {
                input: input_port.name(),
                value,
                transient,
            };
            self.send(target, &mut Event::new(kind))?;
        }
        Ok(())
    }

    fn signal_port(&mut self, port: PortId) -> Result<(), PropagationError> {
        let Some(wires) = self.output_wires(port, PortType::Signal) else {
            return Ok(());
        };
        for wire in wires {
            let Some(state) = self.graph.wire(wire) else {
                continue;
            };
            let (input, target) = (state.to.port, state.to.tile);
            let Some(input_port) = self.graph.port(input) else {
                continue;
            };
            let kind = EventKind::Signal {
                input: input_port.name(),
                kind: input_port.signal_kind(),
            };
            self.send(target, &mut Event::new(kind))?;
        }
        Ok(())
    }

    /// Deliver an event to the tiles at `cell` according to `routing`.
    pub fn send_to_cell(
        &mut self,
        kind: EventKind,
        cell: Cell,
        routing: Routing,
    ) -> Result<bool, PropagationError> {
        let targets: Vec<TileId> = self.grid.occupants(cell).map(|(_, id)| id).collect();
        let mut handled = false;
        for tile in targets {
            let mut event = Event::new(kind.clone());
            let delivered = self.send(tile, &mut event)?;
            handled |= delivered;
            match routing {
                Routing::All => {}
                Routing::FirstHandled if delivered => break,
                Routing::FirstHandled => {}
                Routing::FirstVisible => break,
            }
        }
        Ok(handled)
    }

    /// Deliver `Start` to every tile in spawn order.
    pub fn start(&mut self) -> Result<(), PropagationError> {
        let tiles = self.order.clone();
        self.broadcast(&tiles, &EventKind::Start)?;
        info!(tiles = tiles.len(), wires = self.graph.wire_count(), "puzzle started");
        Ok(())
    }

    /// Advance one tick and notify subscribers in subscription order.
    pub fn advance_tick(&mut self) -> Result<Tick, PropagationError> {
        self.tick = self.tick.next();
        let subscribers = self.tick_subscribers.clone();
        self.broadcast(&subscribers, &EventKind::Tick(self.tick))?;
        Ok(self.tick)
    }

    /// A failed chain does not stop delivery to the remaining tiles; the
    /// first failure is reported.
    fn broadcast(&mut self, tiles: &[TileId], kind: &EventKind) -> Result<(), PropagationError> {
        let mut outcome = Ok(());
        for tile in tiles {
            if let Err(err) = self.send(*tile, &mut Event::new(kind.clone())) {
                if outcome.is_ok() {
                    outcome = Err(err);
                }
            }
        }
        outcome
    }

    /// Tiles subscribed to ticks, in subscription order.
    #[must_use]
    pub fn tick_subscribers(&self) -> &[TileId] {
        &self.tick_subscribers
    }
}

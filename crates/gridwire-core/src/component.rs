//! Component trait and the context handed to event handlers.

use crate::event::Event;
use crate::port::{PortGraph, WireSide};
use crate::property::{ComponentKind, PropertyDescriptor, PropertyError, PropertyValue, TileProperty};
use crate::shared::SharedData;
use crate::{PortId, Tick, TileId};
use gridwire_index::Cell;
use std::any::Any;
use std::fmt;
use tracing::warn;

/// Behaviour attached to a tile.
///
/// Properties are declared statically through [`TileComponent::descriptors`];
/// `get`/`set` are only consulted for non-port properties.
pub trait TileComponent: fmt::Debug {
    /// Stable identifier of the component type.
    fn kind(&self) -> ComponentKind;

    /// Property table in declaration order.
    fn descriptors(&self) -> &'static [PropertyDescriptor];

    fn get(&self, name: &str) -> Option<PropertyValue>;

    fn set(&mut self, name: &str, value: PropertyValue) -> Result<(), PropertyError>;

    /// Handlers with higher priority run first.
    fn priority(&self) -> i32 {
        0
    }

    /// Tiles with at least one ticking component subscribe to ticks on spawn.
    fn wants_ticks(&self) -> bool {
        false
    }

    fn on_event(&mut self, _event: &mut Event, _cx: &mut TileContext<'_>) {}
}

/// Deferred graph operation requested by a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    SetPowered {
        port: PortId,
        enabled: bool,
    },
    SetWirePowered {
        port: PortId,
        wire_index: usize,
        enabled: bool,
    },
    SendValue {
        port: PortId,
        value: i32,
        transient: bool,
    },
    SendSignal {
        port: PortId,
    },
}

/// Read access to the tile's ports plus an effect queue.
///
/// Effects are applied by the puzzle as soon as the handler returns, before
/// delivery continues with the next wire.
pub struct TileContext<'a> {
    tile: TileId,
    cell: Cell,
    tick: Tick,
    properties: &'a [TileProperty],
    ports: &'a [Option<PortId>],
    graph: &'a PortGraph,
    shared: &'a mut SharedData,
    effects: Vec<Effect>,
}

impl<'a> TileContext<'a> {
    pub(crate) fn new(
        tile: TileId,
        cell: Cell,
        tick: Tick,
        properties: &'a [TileProperty],
        ports: &'a [Option<PortId>],
        graph: &'a PortGraph,
        shared: &'a mut SharedData,
    ) -> Self {
        Self {
            tile,
            cell,
            tick,
            properties,
            ports,
            graph,
            shared,
            effects: Vec::new(),
        }
    }

    #[must_use]
    pub fn tile(&self) -> TileId {
        self.tile
    }

    #[must_use]
    pub fn cell(&self) -> Cell {
        self.cell
    }

    #[must_use]
    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Port declared by the property named `name`.
    #[must_use]
    pub fn port(&self, name: &str) -> Option<PortId> {
        self.properties
            .iter()
            .position(|property| property.name == name)
            .and_then(|index| self.ports.get(index).copied().flatten())
    }

    fn resolve(&self, name: &str) -> Option<PortId> {
        let port = self.port(name);
        if port.is_none() {
            warn!(tile = ?self.tile, port = name, "handler referenced an undeclared port");
        }
        port
    }

    #[must_use]
    pub fn has_power(&self, name: &str) -> bool {
        self.port(name)
            .is_some_and(|port| self.graph.has_power(port))
    }

    #[must_use]
    pub fn wire_count(&self, name: &str) -> usize {
        self.port(name)
            .map_or(0, |port| self.graph.wires_of(port).len())
    }

    /// Option slot on one end of the `wire_index`-th wire of port `name`.
    #[must_use]
    pub fn wire_option(
        &self,
        name: &str,
        wire_index: usize,
        side: WireSide,
        slot: usize,
    ) -> Option<i32> {
        let port = self.port(name)?;
        let wire = self.graph.wires_of(port).get(wire_index)?;
        self.graph.wire(*wire)?.side(side).option(slot)
    }

    /// Typed side-table entry shared by every component of `kind` in the puzzle.
    pub fn shared<T: Any + Default>(&mut self, kind: ComponentKind) -> Option<&mut T> {
        self.shared.get_or_default::<T>(kind)
    }

    pub fn set_powered(&mut self, name: &str, enabled: bool) {
        if let Some(port) = self.resolve(name) {
            self.effects.push(Effect::SetPowered { port, enabled });
        }
    }

    pub fn set_wire_powered(&mut self, name: &str, wire_index: usize, enabled: bool) {
        if let Some(port) = self.resolve(name) {
            self.effects.push(Effect::SetWirePowered {
                port,
                wire_index,
                enabled,
            });
        }
    }

    pub fn send_value(&mut self, name: &str, value: i32, transient: bool) {
        if let Some(port) = self.resolve(name) {
            self.effects.push(Effect::SendValue {
                port,
                value,
                transient,
            });
        }
    }

    pub fn send_signal(&mut self, name: &str) {
        if let Some(port) = self.resolve(name) {
            self.effects.push(Effect::SendSignal { port });
        }
    }

    pub(crate) fn into_effects(self) -> Vec<Effect> {
        self.effects
    }
}

//! Ports, wires, and the directed graph joining them.

use crate::property::{PortFlow, PortMetadata, PortType, SignalKind};
use crate::{PortId, TileId, WireId};
use slotmap::SlotMap;
use thiserror::Error;

/// Number of integer option slots carried by each wire endpoint.
pub const MAX_CONNECTION_OPTIONS: usize = 2;

/// Errors raised while editing the wire graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("unknown port")]
    UnknownPort,
    #[error("unknown wire")]
    UnknownWire,
    #[error("wires must run from an output port to an input port")]
    WrongFlow,
    #[error("{from:?} output cannot drive a {to:?} input")]
    Incompatible { from: PortType, to: PortType },
    #[error("a tile cannot be wired to itself")]
    SelfLoop,
    #[error("ports are already connected")]
    Duplicate,
    #[error("option slot {0} is out of range")]
    OptionIndex(usize),
}

/// Returns true when an output of type `from` may drive an input of type `to`.
#[must_use]
pub const fn compatible(from: PortType, to: PortType) -> bool {
    matches!(
        (from, to),
        (PortType::Number, PortType::Number)
            | (PortType::Power, PortType::Power)
            | (PortType::Power, PortType::Signal)
            | (PortType::Signal, PortType::Signal)
    )
}

/// Typed, directional connection point owned by a tile.
#[derive(Debug, Clone)]
pub struct Port {
    tile: TileId,
    name: &'static str,
    metadata: PortMetadata,
    wires: Vec<WireId>,
}

impl Port {
    #[must_use]
    pub fn tile(&self) -> TileId {
        self.tile
    }

    /// Name of the property that declared this port.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn port_type(&self) -> PortType {
        self.metadata.port_type
    }

    #[must_use]
    pub fn flow(&self) -> PortFlow {
        self.metadata.flow
    }

    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.metadata.legacy
    }

    /// Signal kind delivered when this input is triggered.
    #[must_use]
    pub fn signal_kind(&self) -> SignalKind {
        self.metadata.signal.unwrap_or_default()
    }

    /// Connected wires in insertion order.
    #[must_use]
    pub fn wires(&self) -> &[WireId] {
        &self.wires
    }
}

/// Per-endpoint option slots; a slot never written reads as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOptions(Vec<i32>);

impl ConnectionOptions {
    /// Build from stored values; fails when more than two are supplied.
    pub fn from_slice(values: &[i32]) -> Result<Self, WireError> {
        if values.len() > MAX_CONNECTION_OPTIONS {
            return Err(WireError::OptionIndex(values.len() - 1));
        }
        Ok(Self(values.to_vec()))
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<i32> {
        self.0.get(index).copied()
    }

    pub fn set(&mut self, index: usize, value: i32) -> Result<(), WireError> {
        if index >= MAX_CONNECTION_OPTIONS {
            return Err(WireError::OptionIndex(index));
        }
        if self.0.len() <= index {
            self.0.resize(index + 1, 0);
        }
        self.0[index] = value;
        Ok(())
    }

    #[must_use]
    pub fn as_slice(&self) -> &[i32] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One end of a wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub port: PortId,
    pub tile: TileId,
    pub options: ConnectionOptions,
}

impl Connection {
    fn new(port: PortId, tile: TileId) -> Self {
        Self {
            port,
            tile,
            options: ConnectionOptions::default(),
        }
    }

    pub fn set_option(&mut self, index: usize, value: i32) -> Result<(), WireError> {
        self.options.set(index, value)
    }

    #[must_use]
    pub fn option(&self, index: usize) -> Option<i32> {
        self.options.get(index)
    }
}

/// Selects one endpoint of a wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireSide {
    From,
    To,
}

/// Directed edge from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wire {
    pub from: Connection,
    pub to: Connection,
    pub enabled: bool,
    pub value: i32,
}

impl Wire {
    #[must_use]
    pub fn side(&self, side: WireSide) -> &Connection {
        match side {
            WireSide::From => &self.from,
            WireSide::To => &self.to,
        }
    }

    pub fn side_mut(&mut self, side: WireSide) -> &mut Connection {
        match side {
            WireSide::From => &mut self.from,
            WireSide::To => &mut self.to,
        }
    }
}

/// Arena of ports and wires.
#[derive(Debug, Default)]
pub struct PortGraph {
    ports: SlotMap<PortId, Port>,
    wires: SlotMap<WireId, Wire>,
}

impl PortGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_port(&mut self, tile: TileId, name: &'static str, metadata: PortMetadata) -> PortId {
        self.ports.insert(Port {
            tile,
            name,
            metadata,
            wires: Vec::new(),
        })
    }

    #[must_use]
    pub fn port(&self, id: PortId) -> Option<&Port> {
        self.ports.get(id)
    }

    #[must_use]
    pub fn wire(&self, id: WireId) -> Option<&Wire> {
        self.wires.get(id)
    }

    pub fn wire_mut(&mut self, id: WireId) -> Option<&mut Wire> {
        self.wires.get_mut(id)
    }

    #[must_use]
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    #[must_use]
    pub fn wire_count(&self) -> usize {
        self.wires.len()
    }

    pub fn iter_wires(&self) -> impl Iterator<Item = (WireId, &Wire)> {
        self.wires.iter()
    }

    /// Wires attached to `port`, in insertion order.
    #[must_use]
    pub fn wires_of(&self, port: PortId) -> &[WireId] {
        match self.ports.get(port) {
            Some(p) => &p.wires,
            None => &[],
        }
    }

    /// True when any wire attached to `port` is enabled.
    #[must_use]
    pub fn has_power(&self, port: PortId) -> bool {
        self.wires_of(port)
            .iter()
            .filter_map(|wire| self.wires.get(*wire))
            .any(|wire| wire.enabled)
    }

    /// Create a wire without registering it on either port.
    ///
    /// Loaders use this together with [`PortGraph::attach`] to restore the
    /// persisted per-port wire order. The duplicate check only sees attached
    /// wires, so callers inserting several detached wires must reject repeated
    /// `(from, to)` pairs themselves.
    pub fn insert_detached(&mut self, from: PortId, to: PortId) -> Result<WireId, WireError> {
        let (from_port, to_port) = match (self.ports.get(from), self.ports.get(to)) {
            (Some(f), Some(t)) => (f, t),
            _ => return Err(WireError::UnknownPort),
        };
        if from_port.flow() != PortFlow::Output || to_port.flow() != PortFlow::Input {
            return Err(WireError::WrongFlow);
        }
        if !compatible(from_port.port_type(), to_port.port_type()) {
            return Err(WireError::Incompatible {
                from: from_port.port_type(),
                to: to_port.port_type(),
            });
        }
        if from_port.tile == to_port.tile {
            return Err(WireError::SelfLoop);
        }
        let duplicate = from_port
            .wires
            .iter()
            .filter_map(|wire| self.wires.get(*wire))
            .any(|wire| wire.to.port == to);
        if duplicate {
            return Err(WireError::Duplicate);
        }
        let wire = Wire {
            from: Connection::new(from, from_port.tile),
            to: Connection::new(to, to_port.tile),
            enabled: false,
            value: 0,
        };
        Ok(self.wires.insert(wire))
    }

    /// Append `wire` to `port`'s list if it is one of the wire's endpoints.
    pub fn attach(&mut self, port: PortId, wire: WireId) -> bool {
        let Some(w) = self.wires.get(wire) else {
            return false;
        };
        if w.from.port != port && w.to.port != port {
            return false;
        }
        match self.ports.get_mut(port) {
            Some(p) if !p.wires.contains(&wire) => {
                p.wires.push(wire);
                true
            }
            _ => false,
        }
    }

    /// Connect an output port to an input port.
    pub fn connect(&mut self, from: PortId, to: PortId) -> Result<WireId, WireError> {
        let wire = self.insert_detached(from, to)?;
        self.attach(from, wire);
        self.attach(to, wire);
        Ok(wire)
    }

    /// Remove `wire`, unregistering it from both endpoints first.
    pub fn disconnect(&mut self, wire: WireId) -> Option<Wire> {
        let (from, to) = {
            let w = self.wires.get(wire)?;
            (w.from.port, w.to.port)
        };
        for port in [from, to] {
            if let Some(p) = self.ports.get_mut(port) {
                p.wires.retain(|id| *id != wire);
            }
        }
        self.wires.remove(wire)
    }

    /// Remove `port` and every wire attached to it.
    pub fn remove_port(&mut self, port: PortId) -> Vec<Wire> {
        let wires = self.wires_of(port).to_vec();
        let removed = wires
            .into_iter()
            .filter_map(|wire| self.disconnect(wire))
            .collect();
        self.ports.remove(port);
        removed
    }

    /// Drop wires that are not registered on both endpoint ports.
    pub fn prune_detached(&mut self) -> usize {
        let orphans: Vec<WireId> = self
            .wires
            .iter()
            .filter(|(id, wire)| {
                !self.wires_of(wire.from.port).contains(id)
                    || !self.wires_of(wire.to.port).contains(id)
            })
            .map(|(id, _)| id)
            .collect();
        for wire in &orphans {
            self.disconnect(*wire);
        }
        orphans.len()
    }

    pub fn clear(&mut self) {
        self.ports.clear();
        self.wires.clear();
    }
}

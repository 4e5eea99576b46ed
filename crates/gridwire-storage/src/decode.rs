//! Version-dispatched document reader.
//!
//! Decoding runs in two passes. The first instantiates tiles into a
//! pre-sized slot table and records port and component-reference payloads
//! by index; the second creates wires whose endpoints both resolved, restores
//! each port's wire order, and resolves component references.

use crate::{ByteReader, CodecError, DocumentCodec, DocumentHeader};
use gridwire_core::{
    ComponentKind, ComponentRef, ConnectionOptions, Decal, PortFlow, PortId, PropertyKind,
    PropertyValue, Puzzle, PuzzleConfig, TileId, TileSet, WireId,
};
use gridwire_index::{Cell, Edge};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Smallest encoded tile record: UUID, two `int32`s, edge byte, name flag.
const MIN_TILE_RECORD: usize = 16 + 4 + 4 + 1 + 1;

enum Payload {
    Value(PropertyValue),
    Port(Vec<usize>),
    /// Tile-table back-reference; 0 is null.
    ComponentRef(usize),
}

#[derive(Debug, Clone, Default)]
struct PendingWire {
    from: Option<PortId>,
    to: Option<PortId>,
    from_options: ConnectionOptions,
    to_options: ConnectionOptions,
}

struct PendingPort {
    port: PortId,
    wires: Vec<usize>,
}

struct PendingRef {
    tile: TileId,
    property: &'static str,
    target: usize,
    kind: ComponentKind,
}

impl DocumentCodec {
    /// Decode any supported document version into a new puzzle.
    pub fn decode(
        &self,
        bytes: &[u8],
        config: PuzzleConfig,
        tileset: Arc<TileSet>,
    ) -> Result<Puzzle, CodecError> {
        let mut reader = ByteReader::new(bytes);
        let header = DocumentHeader::read(&mut reader)?;
        if header.tiles.saturating_mul(MIN_TILE_RECORD) > reader.remaining()
            || header.wires.saturating_mul(2) > reader.remaining()
        {
            return Err(CodecError::Malformed("table sizes exceed document length"));
        }
        let mut loader = Loader {
            codec: self,
            puzzle: Puzzle::new(config, tileset)?,
            slots: Vec::with_capacity(header.tiles),
            wires: vec![PendingWire::default(); header.wires],
            ports: Vec::new(),
            refs: Vec::new(),
        };
        match header.version {
            3 | 4 => loader.read_legacy(&mut reader, header)?,
            _ => loader.read_current(&mut reader, header)?,
        }
        loader.read_wire_options(&mut reader)?;
        Ok(loader.finish(header))
    }
}

struct Loader<'a> {
    codec: &'a DocumentCodec,
    puzzle: Puzzle,
    slots: Vec<Option<TileId>>,
    wires: Vec<PendingWire>,
    ports: Vec<PendingPort>,
    refs: Vec<PendingRef>,
}

impl Loader<'_> {
    fn read_current(
        &mut self,
        reader: &mut ByteReader<'_>,
        header: DocumentHeader,
    ) -> Result<(), CodecError> {
        for _ in 0..header.tiles {
            let slot = self.read_tile(reader, true)?;
            self.slots.push(slot);
        }
        loop {
            let tag = reader.read_i32()?;
            if tag == 0 {
                break;
            }
            let size = reader.read_len()?;
            let end = reader.position().saturating_add(size);
            let tile = usize::try_from(tag)
                .ok()
                .and_then(|tag| tag.checked_sub(1))
                .and_then(|index| self.slots.get(index).copied().flatten());
            match tile {
                Some(tile) => self.read_properties(reader, tile, end)?,
                None => debug!(tag, size, "skipping property block of a missing tile"),
            }
            close_block(reader, end)?;
        }
        Ok(())
    }

    /// Versions 3 and 4: properties follow each tile record; version 3
    /// keeps custom names in a trailing block.
    fn read_legacy(
        &mut self,
        reader: &mut ByteReader<'_>,
        header: DocumentHeader,
    ) -> Result<(), CodecError> {
        let inline_names = header.version >= 4;
        for _ in 0..header.tiles {
            let slot = self.read_tile(reader, inline_names)?;
            let size = reader.read_len()?;
            let end = reader.position().saturating_add(size);
            if let Some(tile) = slot {
                self.read_properties(reader, tile, end)?;
            }
            close_block(reader, end)?;
            self.slots.push(slot);
        }
        if !inline_names {
            for index in 0..header.tiles {
                let name = if reader.read_bool()? {
                    Some(reader.read_string()?)
                } else {
                    None
                };
                if let (Some(Some(tile)), Some(name)) = (self.slots.get(index).copied(), name) {
                    self.rename(tile, name);
                }
            }
        }
        Ok(())
    }

    fn read_tile(
        &mut self,
        reader: &mut ByteReader<'_>,
        inline_name: bool,
    ) -> Result<Option<TileId>, CodecError> {
        let template = reader.read_guid()?;
        let x = reader.read_i32()?;
        let y = reader.read_i32()?;
        let edge = reader.read_u8()?;
        let name = if inline_name && reader.read_bool()? {
            Some(reader.read_string()?)
        } else {
            None
        };

        let resolved = self.codec.migrations.resolve(template);
        let Some(layer) = self
            .puzzle
            .tileset()
            .template(resolved)
            .map(|found| found.layer())
        else {
            warn!(%template, "unknown template; tile skipped");
            return Ok(None);
        };
        let Some(edge) = Edge::from_code(edge) else {
            warn!(%template, edge, "invalid edge code; tile skipped");
            return Ok(None);
        };
        let cell = Cell::in_system(x, y, layer.system(), edge);
        if !cell.is_valid() {
            warn!(%template, x, y, ?edge, ?layer, "cell does not fit template layer; tile skipped");
            return Ok(None);
        }
        let tile = match self.puzzle.spawn_tile(resolved, cell) {
            Ok(tile) => tile,
            Err(err) => {
                warn!(%template, %cell, %err, "tile skipped");
                return Ok(None);
            }
        };
        if let Some(name) = name {
            self.rename(tile, name);
        }
        Ok(Some(tile))
    }

    fn rename(&mut self, tile: TileId, name: String) {
        if let Err(err) = self.puzzle.rename_tile(tile, Some(name)) {
            warn!(?tile, %err, "rename failed");
        }
    }

    fn read_properties(
        &mut self,
        reader: &mut ByteReader<'_>,
        tile: TileId,
        end: usize,
    ) -> Result<(), CodecError> {
        while reader.position() < end {
            let code = reader.read_u8()?;
            let Some(kind) = PropertyKind::from_code(code) else {
                warn!(?tile, code, "unknown property kind; rest of block skipped");
                return Ok(());
            };
            if kind == PropertyKind::Unknown {
                return Ok(());
            }
            let name = reader.read_string()?;
            let payload = read_payload(reader, kind, self.wires.len())?;
            self.apply(tile, &name, payload);
        }
        Ok(())
    }

    fn apply(&mut self, tile: TileId, name: &str, payload: Payload) {
        let Some(found) = self.puzzle.tile(tile) else {
            return;
        };
        let Some(index) = found.property_index(name) else {
            warn!(?tile, property = name, "unknown property skipped");
            return;
        };
        let property = found.properties()[index].clone();
        let port = found.port_at(index);

        match payload {
            Payload::Port(wires) => {
                let (Some(port), Some(metadata)) = (port, property.port) else {
                    warn!(?tile, property = name, "port payload on a non-port property");
                    return;
                };
                for wire in &wires {
                    let pending = &mut self.wires[*wire];
                    match metadata.flow {
                        PortFlow::Output => pending.from = Some(port),
                        PortFlow::Input => pending.to = Some(port),
                    }
                }
                self.ports.push(PendingPort { port, wires });
            }
            Payload::ComponentRef(target) => {
                let Some(kind) = property.target.filter(|_| property.kind == PropertyKind::ComponentRef)
                else {
                    warn!(?tile, property = name, "component reference on a mismatched property");
                    return;
                };
                if target > 0 {
                    self.refs.push(PendingRef {
                        tile,
                        property: property.name,
                        target: target - 1,
                        kind,
                    });
                }
            }
            Payload::Value(value) => {
                if value.kind() != property.kind {
                    warn!(
                        ?tile,
                        property = name,
                        expected = ?property.kind,
                        found = ?value.kind(),
                        "stored kind differs from declaration; skipped"
                    );
                    return;
                }
                if !self.references_resolve(&value) {
                    warn!(?tile, property = name, "missing asset reference; default kept");
                    return;
                }
                let value = match value {
                    PropertyValue::TileRef(Some(id)) => {
                        PropertyValue::TileRef(Some(self.codec.migrations.resolve(id)))
                    }
                    other => other,
                };
                if let Err(err) = self.puzzle.set_value(tile, property.name, value) {
                    warn!(?tile, property = name, %err, "property not applied");
                }
            }
        }
    }

    fn references_resolve(&self, value: &PropertyValue) -> bool {
        let catalog = self.codec.catalog.as_ref();
        let decal_present = |decal: &Decal| decal.id.is_nil() || catalog.has_decal(decal.id);
        match value {
            PropertyValue::SoundRef(Some(id)) => catalog.has_sound(*id),
            PropertyValue::BackgroundRef(Some(id)) => catalog.has_background(*id),
            PropertyValue::TileRef(Some(id)) => self
                .puzzle
                .tileset()
                .template(self.codec.migrations.resolve(*id))
                .is_some(),
            PropertyValue::Decal(decal) => decal_present(decal),
            PropertyValue::DecalArray(decals) => decals.iter().all(decal_present),
            PropertyValue::SoundArray(sounds) => sounds.iter().all(|id| catalog.has_sound(*id)),
            _ => true,
        }
    }

    fn read_wire_options(&mut self, reader: &mut ByteReader<'_>) -> Result<(), CodecError> {
        for (index, pending) in self.wires.iter_mut().enumerate() {
            pending.from_options = read_options(reader, index)?;
            pending.to_options = read_options(reader, index)?;
        }
        Ok(())
    }

    fn finish(mut self, header: DocumentHeader) -> Puzzle {
        let mut created: Vec<Option<WireId>> = vec![None; self.wires.len()];
        // Detached wires are invisible to the graph's duplicate check.
        let mut pairs: HashSet<(PortId, PortId)> = HashSet::with_capacity(self.wires.len());
        let mut discarded = 0usize;
        for (index, pending) in self.wires.iter().enumerate() {
            let (Some(from), Some(to)) = (pending.from, pending.to) else {
                debug!(wire = index, "unresolved wire discarded");
                discarded += 1;
                continue;
            };
            if !pairs.insert((from, to)) {
                warn!(wire = index, "duplicate wire discarded");
                discarded += 1;
                continue;
            }
            let graph = self.puzzle.graph_mut();
            match graph.insert_detached(from, to) {
                Ok(id) => {
                    if let Some(wire) = graph.wire_mut(id) {
                        wire.from.options = pending.from_options.clone();
                        wire.to.options = pending.to_options.clone();
                    }
                    created[index] = Some(id);
                }
                Err(err) => {
                    warn!(wire = index, %err, "wire discarded");
                    discarded += 1;
                }
            }
        }

        let graph = self.puzzle.graph_mut();
        for pending in &self.ports {
            for wire in &pending.wires {
                if let Some(Some(id)) = created.get(*wire) {
                    graph.attach(pending.port, *id);
                }
            }
        }
        discarded += graph.prune_detached();

        for reference in std::mem::take(&mut self.refs) {
            let target = self
                .slots
                .get(reference.target)
                .copied()
                .flatten()
                .filter(|tile| {
                    self.puzzle
                        .tile(*tile)
                        .is_some_and(|found| found.component_index(reference.kind).is_some())
                });
            let Some(target) = target else {
                warn!(
                    tile = ?reference.tile,
                    property = reference.property,
                    "component reference unresolved"
                );
                continue;
            };
            let value = PropertyValue::ComponentRef(Some(ComponentRef {
                tile: target,
                kind: reference.kind,
            }));
            if let Err(err) = self.puzzle.set_value(reference.tile, reference.property, value) {
                warn!(tile = ?reference.tile, %err, "component reference not applied");
            }
        }

        let loaded = self.slots.iter().flatten().count();
        info!(
            version = header.version,
            tiles = loaded,
            skipped = header.tiles - loaded,
            wires = self.puzzle.graph().wire_count(),
            discarded,
            "document decoded"
        );
        self.puzzle
    }
}

/// Move past a sized property block; a payload that ran beyond the block is fatal.
fn close_block(reader: &mut ByteReader<'_>, end: usize) -> Result<(), CodecError> {
    if reader.position() > end {
        return Err(CodecError::Malformed("property block overran its size"));
    }
    reader.seek(end)
}

fn read_options(reader: &mut ByteReader<'_>, wire: usize) -> Result<ConnectionOptions, CodecError> {
    let count = usize::from(reader.read_u8()?);
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        values.push(reader.read_i32()?);
    }
    Ok(ConnectionOptions::from_slice(&values).unwrap_or_else(|err| {
        warn!(wire, %err, "wire options dropped");
        ConnectionOptions::default()
    }))
}

fn read_count(reader: &mut ByteReader<'_>, element: usize) -> Result<usize, CodecError> {
    let count = reader.read_len()?;
    if count.saturating_mul(element) > reader.remaining() {
        return Err(CodecError::Malformed("array length exceeds document"));
    }
    Ok(count)
}

fn read_decal(reader: &mut ByteReader<'_>) -> Result<Decal, CodecError> {
    let id = reader.read_guid()?;
    let flags = reader.read_u8()?;
    Ok(Decal::new(id, flags))
}

fn read_optional_guid(reader: &mut ByteReader<'_>) -> Result<Option<gridwire_core::Guid>, CodecError> {
    if reader.read_bool()? {
        Ok(Some(reader.read_guid()?))
    } else {
        Ok(None)
    }
}

fn read_payload(
    reader: &mut ByteReader<'_>,
    kind: PropertyKind,
    wire_count: usize,
) -> Result<Payload, CodecError> {
    let value = match kind {
        PropertyKind::Int => PropertyValue::Int(reader.read_i32()?),
        PropertyKind::Bool => PropertyValue::Bool(reader.read_bool()?),
        PropertyKind::String => PropertyValue::String(reader.read_string()?),
        PropertyKind::Uuid => PropertyValue::Uuid(reader.read_guid()?),
        PropertyKind::StringArray => {
            let count = read_count(reader, 1)?;
            let items = (0..count)
                .map(|_| reader.read_string())
                .collect::<Result<_, _>>()?;
            PropertyValue::StringArray(items)
        }
        PropertyKind::Decal => PropertyValue::Decal(read_decal(reader)?),
        PropertyKind::DecalArray => {
            let count = read_count(reader, 17)?;
            let items = (0..count)
                .map(|_| read_decal(reader))
                .collect::<Result<_, _>>()?;
            PropertyValue::DecalArray(items)
        }
        PropertyKind::TileRef => PropertyValue::TileRef(read_optional_guid(reader)?),
        PropertyKind::BackgroundRef => PropertyValue::BackgroundRef(read_optional_guid(reader)?),
        PropertyKind::SoundRef => PropertyValue::SoundRef(read_optional_guid(reader)?),
        PropertyKind::IntArray => {
            let count = read_count(reader, 4)?;
            let items = (0..count)
                .map(|_| reader.read_i32())
                .collect::<Result<_, _>>()?;
            PropertyValue::IntArray(items)
        }
        PropertyKind::Cell => {
            let x = reader.read_i32()?;
            let y = reader.read_i32()?;
            PropertyValue::Cell(Cell::grid(x, y))
        }
        PropertyKind::SoundArray => {
            let count = read_count(reader, 16)?;
            let items = (0..count)
                .map(|_| reader.read_guid())
                .collect::<Result<_, _>>()?;
            PropertyValue::SoundArray(items)
        }
        PropertyKind::Port => {
            let count = read_count(reader, 4)?;
            let mut wires = Vec::with_capacity(count);
            for _ in 0..count {
                let index = reader.read_i32()?;
                match usize::try_from(index).ok().filter(|i| *i < wire_count) {
                    Some(index) => wires.push(index),
                    None => warn!(index, wire_count, "wire index out of range dropped"),
                }
            }
            return Ok(Payload::Port(wires));
        }
        PropertyKind::ComponentRef => {
            let index = reader.read_i32()?;
            return Ok(Payload::ComponentRef(usize::try_from(index).unwrap_or(0)));
        }
        PropertyKind::Unknown => return Err(CodecError::Malformed("unexpected property sentinel")),
    };
    Ok(Payload::Value(value))
}

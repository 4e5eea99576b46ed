//! Current-version document writer.

use crate::{ByteWriter, CURRENT_VERSION, DocumentCodec, TAG};
use gridwire_core::{
    Decal, Guid, MAX_CONNECTION_OPTIONS, PortFlow, PropertyKind, PropertyValue, Puzzle, Tile,
    TileId, WireId,
};
use std::collections::HashMap;
use tracing::{debug, warn};

impl DocumentCodec {
    /// Encode every linked tile and the wires between them.
    #[must_use]
    pub fn encode(&self, puzzle: &Puzzle) -> Vec<u8> {
        let tiles: Vec<(TileId, &Tile)> = puzzle
            .tiles()
            .filter(|(_, tile)| tile.is_linked())
            .collect();
        let tile_index: HashMap<TileId, usize> = tiles
            .iter()
            .enumerate()
            .map(|(index, (id, _))| (*id, index))
            .collect();
        let wires = wire_table(puzzle, &tiles, &tile_index);
        let wire_index: HashMap<WireId, usize> = wires
            .iter()
            .enumerate()
            .map(|(index, id)| (*id, index))
            .collect();

        let mut out = ByteWriter::new();
        out.write_bytes(&TAG);
        out.write_i32(CURRENT_VERSION);
        out.write_len(tiles.len());
        out.write_len(wires.len());

        for (_, tile) in &tiles {
            out.write_guid(tile.template());
            let cell = tile.cell();
            out.write_i32(cell.x);
            out.write_i32(cell.y);
            out.write_u8(cell.edge.code());
            match tile.custom_name() {
                Some(name) => {
                    out.write_bool(true);
                    out.write_string(name);
                }
                None => out.write_bool(false),
            }
        }

        for (index, (id, tile)) in tiles.iter().enumerate() {
            out.write_len(index + 1);
            let size_at = out.position();
            out.write_i32(0);
            let start = out.position();
            write_properties(&mut out, puzzle, *id, tile, &tile_index, &wire_index);
            out.write_u8(PropertyKind::Unknown.code());
            out.patch_i32(size_at, i32::try_from(out.position() - start).unwrap_or(i32::MAX));
        }
        out.write_i32(0);

        for id in &wires {
            let Some(wire) = puzzle.graph().wire(*id) else {
                continue;
            };
            for options in [&wire.from.options, &wire.to.options] {
                let values = options.as_slice();
                let values = &values[..values.len().min(MAX_CONNECTION_OPTIONS)];
                out.write_u8(u8::try_from(values.len()).unwrap_or(u8::MAX));
                for value in values {
                    out.write_i32(*value);
                }
            }
        }

        debug!(tiles = tiles.len(), wires = wires.len(), "document encoded");
        out.into_inner()
    }
}

/// Wires enumerated once, through the output ports that own them.
fn wire_table(
    puzzle: &Puzzle,
    tiles: &[(TileId, &Tile)],
    tile_index: &HashMap<TileId, usize>,
) -> Vec<WireId> {
    let graph = puzzle.graph();
    let mut wires = Vec::new();
    for (_, tile) in tiles {
        for (index, property) in tile.properties().iter().enumerate() {
            let is_output = property
                .port
                .is_some_and(|metadata| metadata.flow == PortFlow::Output);
            let Some(port) = tile.port_at(index).filter(|_| is_output) else {
                continue;
            };
            for id in graph.wires_of(port) {
                let Some(wire) = graph.wire(*id) else {
                    continue;
                };
                if tile_index.contains_key(&wire.from.tile) && tile_index.contains_key(&wire.to.tile)
                {
                    wires.push(*id);
                }
            }
        }
    }
    wires
}

fn write_properties(
    out: &mut ByteWriter,
    puzzle: &Puzzle,
    id: TileId,
    tile: &Tile,
    tile_index: &HashMap<TileId, usize>,
    wire_index: &HashMap<WireId, usize>,
) {
    for (index, property) in tile.properties().iter().enumerate() {
        if !property.serialized {
            continue;
        }
        if let Some(port) = tile.port_at(index) {
            let wires: Vec<usize> = puzzle
                .graph()
                .wires_of(port)
                .iter()
                .filter_map(|wire| wire_index.get(wire).copied())
                .collect();
            out.write_u8(PropertyKind::Port.code());
            out.write_string(property.name);
            out.write_len(wires.len());
            for wire in wires {
                out.write_len(wire);
            }
            continue;
        }
        let value = match puzzle.value(id, property.name) {
            Ok(value) => value,
            Err(err) => {
                warn!(property = property.name, %err, "property not written");
                continue;
            }
        };
        out.write_u8(value.kind().code());
        out.write_string(property.name);
        write_value(out, &value, tile_index);
    }
}

fn write_value(out: &mut ByteWriter, value: &PropertyValue, tile_index: &HashMap<TileId, usize>) {
    match value {
        PropertyValue::Int(v) => out.write_i32(*v),
        PropertyValue::Bool(v) => out.write_bool(*v),
        PropertyValue::String(v) => out.write_string(v),
        PropertyValue::Uuid(v) => out.write_guid(*v),
        PropertyValue::StringArray(items) => {
            out.write_len(items.len());
            for item in items {
                out.write_string(item);
            }
        }
        PropertyValue::Decal(decal) => write_decal(out, decal),
        PropertyValue::DecalArray(items) => {
            out.write_len(items.len());
            for decal in items {
                write_decal(out, decal);
            }
        }
        PropertyValue::TileRef(v) | PropertyValue::BackgroundRef(v) | PropertyValue::SoundRef(v) => {
            write_optional_guid(out, *v);
        }
        PropertyValue::IntArray(items) => {
            out.write_len(items.len());
            for item in items {
                out.write_i32(*item);
            }
        }
        // Port wiring is written by the caller from the live graph.
        PropertyValue::Port(_) => out.write_len(0),
        PropertyValue::Cell(cell) => {
            out.write_i32(cell.x);
            out.write_i32(cell.y);
        }
        PropertyValue::ComponentRef(target) => {
            let index = target
                .and_then(|r| tile_index.get(&r.tile))
                .map_or(0, |index| index + 1);
            out.write_len(index);
        }
        PropertyValue::SoundArray(items) => {
            out.write_len(items.len());
            for item in items {
                out.write_guid(*item);
            }
        }
    }
}

fn write_decal(out: &mut ByteWriter, decal: &Decal) {
    out.write_guid(decal.id);
    out.write_u8(decal.flags);
}

fn write_optional_guid(out: &mut ByteWriter, value: Option<Guid>) {
    match value {
        Some(id) => {
            out.write_bool(true);
            out.write_guid(id);
        }
        None => out.write_bool(false),
    }
}

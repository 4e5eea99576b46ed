//! Structural snapshot of a puzzle that ignores slot-map handles.

use gridwire_core::{Cell, Guid, PropertyValue, Puzzle, TileId, TileSet, builtin};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, PartialEq)]
pub struct WireSummary {
    pub peer: usize,
    pub peer_port: &'static str,
    pub from_options: Vec<i32>,
    pub to_options: Vec<i32>,
}

#[derive(Debug, PartialEq)]
pub struct TileSummary {
    pub template: Guid,
    pub cell: Cell,
    pub name: Option<String>,
    pub values: Vec<(&'static str, String)>,
    pub ports: Vec<(&'static str, Vec<WireSummary>)>,
}

pub fn stock() -> Arc<TileSet> {
    Arc::new(builtin::tileset().expect("stock tile set"))
}

/// Tiles in spawn order with serialized values and per-port wire lists.
pub fn describe(puzzle: &Puzzle) -> Vec<TileSummary> {
    let index: HashMap<TileId, usize> = puzzle
        .tiles()
        .enumerate()
        .map(|(i, (id, _))| (id, i))
        .collect();
    let graph = puzzle.graph();
    puzzle
        .tiles()
        .map(|(id, tile)| {
            let mut values = Vec::new();
            let mut ports = Vec::new();
            for (i, property) in tile.properties().iter().enumerate() {
                if let Some(port) = tile.port_at(i) {
                    let wires = graph
                        .wires_of(port)
                        .iter()
                        .filter_map(|wire| graph.wire(*wire))
                        .map(|wire| {
                            let far = if wire.from.port == port {
                                wire.to.port
                            } else {
                                wire.from.port
                            };
                            let far = graph.port(far).expect("peer port");
                            WireSummary {
                                peer: index[&far.tile()],
                                peer_port: far.name(),
                                from_options: wire.from.options.as_slice().to_vec(),
                                to_options: wire.to.options.as_slice().to_vec(),
                            }
                        })
                        .collect();
                    ports.push((property.name, wires));
                } else if property.serialized {
                    let value = puzzle.value(id, property.name).expect("value");
                    let text = match value {
                        PropertyValue::ComponentRef(Some(target)) => {
                            format!("ref {} {:?}", index[&target.tile], target.kind)
                        }
                        other => format!("{other:?}"),
                    };
                    values.push((property.name, text));
                }
            }
            TileSummary {
                template: tile.template(),
                cell: tile.cell(),
                name: tile.custom_name().map(str::to_string),
                values,
                ports,
            }
        })
        .collect()
}

//! Hand-assembled documents in every readable layout.

mod common;

use common::{describe, stock};
use gridwire_core::builtin;
use gridwire_core::{
    Cell, CoordinateSystem, Edge, Guid, Layer, PropertyKind, PropertyValue, PuzzleConfig,
};
use gridwire_storage::{ByteWriter, CodecError, DocumentCodec, TAG};

type TestResult = Result<(), Box<dyn std::error::Error>>;

enum Stored {
    Bool(&'static str, bool),
    Int(&'static str, i32),
    Text(&'static str, &'static str),
    Port(&'static str, &'static [i32]),
    RawKind(u8),
}

struct Record {
    template: Guid,
    x: i32,
    y: i32,
    edge: Edge,
    name: Option<&'static str>,
    properties: Vec<Stored>,
}

fn property_block(properties: &[Stored]) -> Vec<u8> {
    let mut out = ByteWriter::new();
    for property in properties {
        match property {
            Stored::Bool(name, value) => {
                out.write_u8(PropertyKind::Bool.code());
                out.write_string(name);
                out.write_bool(*value);
            }
            Stored::Int(name, value) => {
                out.write_u8(PropertyKind::Int.code());
                out.write_string(name);
                out.write_i32(*value);
            }
            Stored::Text(name, value) => {
                out.write_u8(PropertyKind::String.code());
                out.write_string(name);
                out.write_string(value);
            }
            Stored::Port(name, wires) => {
                out.write_u8(PropertyKind::Port.code());
                out.write_string(name);
                out.write_len(wires.len());
                for wire in *wires {
                    out.write_i32(*wire);
                }
            }
            Stored::RawKind(code) => out.write_u8(*code),
        }
    }
    out.write_u8(PropertyKind::Unknown.code());
    out.into_inner()
}

fn header(out: &mut ByteWriter, version: i32, tiles: usize, wires: usize) {
    out.write_bytes(&TAG);
    out.write_i32(version);
    out.write_len(tiles);
    out.write_len(wires);
}

fn position(out: &mut ByteWriter, record: &Record) {
    out.write_guid(record.template);
    out.write_i32(record.x);
    out.write_i32(record.y);
    out.write_u8(record.edge.code());
}

fn inline_name(out: &mut ByteWriter, record: &Record) {
    match record.name {
        Some(name) => {
            out.write_bool(true);
            out.write_string(name);
        }
        None => out.write_bool(false),
    }
}

fn sized(out: &mut ByteWriter, block: &[u8]) {
    out.write_len(block.len());
    out.write_bytes(block);
}

fn wire_options(out: &mut ByteWriter, options: &[(&[i32], &[i32])]) {
    for (from, to) in options {
        for side in [from, to] {
            out.write_u8(u8::try_from(side.len()).expect("option count"));
            for value in *side {
                out.write_i32(*value);
            }
        }
    }
}

fn v5(records: &[Record], options: &[(&[i32], &[i32])]) -> Vec<u8> {
    let mut out = ByteWriter::new();
    header(&mut out, 5, records.len(), options.len());
    for record in records {
        position(&mut out, record);
        inline_name(&mut out, record);
    }
    for (index, record) in records.iter().enumerate() {
        out.write_len(index + 1);
        sized(&mut out, &property_block(&record.properties));
    }
    out.write_i32(0);
    wire_options(&mut out, options);
    out.into_inner()
}

fn v4(records: &[Record], options: &[(&[i32], &[i32])]) -> Vec<u8> {
    let mut out = ByteWriter::new();
    header(&mut out, 4, records.len(), options.len());
    for record in records {
        position(&mut out, record);
        inline_name(&mut out, record);
        sized(&mut out, &property_block(&record.properties));
    }
    wire_options(&mut out, options);
    out.into_inner()
}

fn v3(records: &[Record], options: &[(&[i32], &[i32])]) -> Vec<u8> {
    let mut out = ByteWriter::new();
    header(&mut out, 3, records.len(), options.len());
    for record in records {
        position(&mut out, record);
        sized(&mut out, &property_block(&record.properties));
    }
    for record in records {
        inline_name(&mut out, record);
    }
    wire_options(&mut out, options);
    out.into_inner()
}

/// Switch named "main" powering a door and a gate; the gate's wire carries
/// a from-side option.
fn lobby() -> Vec<Record> {
    vec![
        Record {
            template: builtin::SWITCH,
            x: 0,
            y: 0,
            edge: Edge::None,
            name: Some("main"),
            properties: vec![Stored::Port("power", &[0, 1]), Stored::Bool("isOn", true)],
        },
        Record {
            template: builtin::DOOR,
            x: 1,
            y: 0,
            edge: Edge::None,
            name: None,
            properties: vec![Stored::Port("power", &[0]), Stored::Bool("isOpen", true)],
        },
        Record {
            template: builtin::GATE,
            x: 2,
            y: 0,
            edge: Edge::South,
            name: None,
            properties: vec![Stored::Port("power", &[1]), Stored::Bool("isOpen", true)],
        },
    ]
}

const LOBBY_OPTIONS: &[(&[i32], &[i32])] = &[(&[], &[]), (&[3], &[])];
const ONE_BARE_WIRE: &[(&[i32], &[i32])] = &[(&[], &[])];

#[test]
fn every_version_decodes_to_the_same_puzzle() -> TestResult {
    let codec = DocumentCodec::new();
    let records = lobby();
    let current = codec.decode(&v5(&records, LOBBY_OPTIONS), PuzzleConfig::default(), stock())?;
    let inline = codec.decode(&v4(&records, LOBBY_OPTIONS), PuzzleConfig::default(), stock())?;
    let trailing = codec.decode(&v3(&records, LOBBY_OPTIONS), PuzzleConfig::default(), stock())?;

    let expected = describe(&current);
    assert_eq!(describe(&inline), expected);
    assert_eq!(describe(&trailing), expected);

    assert_eq!(current.tile_count(), 3);
    assert_eq!(current.graph().wire_count(), 2);
    let switch = current.topmost_tile(Cell::grid(0, 0)).expect("switch");
    assert_eq!(current.tile(switch).expect("tile").custom_name(), Some("main"));
    assert_eq!(current.value(switch, "isOn")?, PropertyValue::Bool(true));

    let gate_cell = Cell::shared_edge(2, 0, Edge::South);
    assert_eq!((gate_cell.x, gate_cell.y, gate_cell.edge), (2, -1, Edge::North));
    assert_eq!(gate_cell.system, CoordinateSystem::SharedEdge);
    let gate = current.cell_to_tile(gate_cell, Layer::Wall).expect("gate");
    let wires = current.graph().wires_of(current.port(gate, "power").expect("port"));
    let wire = current.graph().wire(wires[0]).expect("wire");
    assert_eq!(wire.from.tile, switch);
    assert_eq!(wire.from.options.get(0), Some(3));
    assert_eq!(wire.to.options.get(0), None);
    Ok(())
}

#[test]
fn legacy_documents_upgrade_on_save() -> TestResult {
    let codec = DocumentCodec::new();
    let legacy = codec.decode(&v3(&lobby(), LOBBY_OPTIONS), PuzzleConfig::default(), stock())?;
    let bytes = codec.encode(&legacy);
    assert_eq!(DocumentCodec::inspect(&bytes)?.version, 5);
    let upgraded = codec.decode(&bytes, PuzzleConfig::default(), stock())?;
    assert_eq!(describe(&upgraded), describe(&legacy));
    Ok(())
}

#[test]
fn damaged_entries_are_skipped_without_failing_the_load() -> TestResult {
    let records = vec![
        Record {
            template: builtin::SWITCH,
            x: 0,
            y: 0,
            edge: Edge::None,
            name: None,
            properties: vec![
                Stored::Port("power", &[0, 7, -1]),
                Stored::Text("colour", "teal"),
            ],
        },
        Record {
            template: builtin::DOOR,
            x: 1,
            y: 0,
            edge: Edge::North,
            name: None,
            properties: vec![Stored::Port("power", &[0])],
        },
        Record {
            template: builtin::DOOR,
            x: 2,
            y: 0,
            edge: Edge::None,
            name: None,
            properties: vec![
                Stored::Int("isOpen", 1),
                Stored::RawKind(200),
                Stored::Bool("isOpen", true),
            ],
        },
        Record {
            template: builtin::COUNTER,
            x: 3,
            y: 0,
            edge: Edge::None,
            name: None,
            properties: vec![Stored::Int("count", 4)],
        },
        // Shared edges whose owner cell would lie below the coordinate range.
        Record {
            template: builtin::GATE,
            x: 0,
            y: i32::MIN,
            edge: Edge::South,
            name: None,
            properties: vec![Stored::Bool("isOpen", true)],
        },
        Record {
            template: builtin::GATE,
            x: i32::MIN,
            y: 0,
            edge: Edge::West,
            name: None,
            properties: vec![Stored::Bool("isOpen", true)],
        },
    ];
    let mut bytes = v5(&records, ONE_BARE_WIRE);

    // Splice a block for a tile that does not exist ahead of the terminator.
    let mut stray = ByteWriter::new();
    stray.write_i32(42);
    sized(&mut stray, &[0xde, 0xad, 0xbe, 0xef]);
    let terminator = bytes.len() - 4 - 2;
    bytes.splice(terminator..terminator, stray.into_inner());

    let puzzle = DocumentCodec::new().decode(&bytes, PuzzleConfig::default(), stock())?;
    assert_eq!(puzzle.tile_count(), 3);
    // The only wire ended on the door dropped for its edge code.
    assert_eq!(puzzle.graph().wire_count(), 0);

    let door = puzzle.cell_to_tile(Cell::grid(2, 0), Layer::Static).expect("door");
    assert_eq!(puzzle.value(door, "isOpen")?, PropertyValue::Bool(false));
    let counter = puzzle.cell_to_tile(Cell::grid(3, 0), Layer::Logic).expect("counter");
    assert_eq!(puzzle.value(counter, "count")?, PropertyValue::Int(4));
    Ok(())
}

#[test]
fn repeated_wire_endpoints_load_as_one_wire() -> TestResult {
    let records = vec![
        Record {
            template: builtin::SWITCH,
            x: 0,
            y: 0,
            edge: Edge::None,
            name: None,
            properties: vec![Stored::Port("power", &[0, 1])],
        },
        Record {
            template: builtin::DOOR,
            x: 1,
            y: 0,
            edge: Edge::None,
            name: None,
            properties: vec![Stored::Port("power", &[0, 1])],
        },
    ];
    let options: &[(&[i32], &[i32])] = &[(&[], &[]), (&[], &[])];
    let puzzle =
        DocumentCodec::new().decode(&v5(&records, options), PuzzleConfig::default(), stock())?;
    assert_eq!(puzzle.graph().wire_count(), 1);

    let switch = puzzle.topmost_tile(Cell::grid(0, 0)).expect("switch");
    let door = puzzle.topmost_tile(Cell::grid(1, 0)).expect("door");
    for tile in [switch, door] {
        let port = puzzle.port(tile, "power").expect("port");
        assert_eq!(puzzle.graph().wires_of(port).len(), 1);
    }
    Ok(())
}

#[test]
fn property_blocks_may_not_overrun_their_size() {
    let record = Record {
        template: builtin::SWITCH,
        x: 0,
        y: 0,
        edge: Edge::None,
        name: None,
        properties: vec![Stored::Bool("isOn", true)],
    };
    let block = property_block(&record.properties);

    let mut out = ByteWriter::new();
    header(&mut out, 5, 1, 0);
    position(&mut out, &record);
    inline_name(&mut out, &record);
    out.write_len(1);
    // Declared size ends inside the property name.
    out.write_len(3);
    out.write_bytes(&block);
    out.write_i32(0);

    let result = DocumentCodec::new().decode(&out.into_inner(), PuzzleConfig::default(), stock());
    assert!(matches!(result, Err(CodecError::Malformed(_))));
}

mod common;

use common::{describe, stock};
use gridwire_core::builtin::{self, Door};
use gridwire_core::{
    Cell, ComponentRef, ConnectionOptions, Decal, Edge, Guid, Layer, PropertyValue, Puzzle,
    PuzzleConfig, TileSet, TileTemplate,
};
use gridwire_storage::{AssetSet, CodecError, DocumentCodec, MigrationTable};
use std::sync::Arc;

type TestResult = Result<(), Box<dyn std::error::Error>>;

const LAMP: Guid = Guid::from_u128(0x7e57_0000_0000_0000_0000_0000_0000_00aa);
const BACKDROP: Guid = Guid::from_u128(0xa55e_7000_0000_0000_0000_0000_0000_0001);
const STICKER: Guid = Guid::from_u128(0xa55e_7000_0000_0000_0000_0000_0000_0002);
const CHIME: Guid = Guid::from_u128(0xa55e_7000_0000_0000_0000_0000_0000_0003);
const BELL: Guid = Guid::from_u128(0xa55e_7000_0000_0000_0000_0000_0000_0004);

fn with_lamp() -> Arc<TileSet> {
    let mut templates = builtin::templates();
    templates.push(TileTemplate::new(LAMP, "lamp", Layer::Static).with(Door::boxed));
    Arc::new(TileSet::new(templates).expect("tile set with lamp"))
}

/// One of everything: every stored value kind, a component reference, and
/// wires with and without endpoint options.
fn workshop() -> Result<Puzzle, Box<dyn std::error::Error>> {
    let mut puzzle = Puzzle::new(PuzzleConfig::default(), stock())?;
    let switch = puzzle.spawn_tile(builtin::SWITCH, Cell::grid(0, 0))?;
    puzzle.rename_tile(switch, Some("master".into()))?;
    let door = puzzle.spawn_tile(builtin::DOOR, Cell::grid(1, 0))?;
    let gate = puzzle.spawn_tile(builtin::GATE, Cell::shared_edge(1, 0, Edge::East))?;
    puzzle.connect(switch, "power", door, "power")?;
    puzzle.connect(switch, "power", gate, "power")?;

    let counter = puzzle.spawn_tile(builtin::COUNTER, Cell::grid(0, 2))?;
    let display = puzzle.spawn_tile(builtin::DISPLAY, Cell::grid(1, 2))?;
    puzzle.set_value(counter, "count", PropertyValue::Int(2))?;
    puzzle.set_value(counter, "decayTicks", PropertyValue::Int(7))?;
    puzzle.connect(counter, "value", display, "value")?;

    let sequencer = puzzle.spawn_tile(builtin::SEQUENCER, Cell::grid(3, 3))?;
    let lamp = puzzle.spawn_tile(builtin::DOOR, Cell::grid(3, 4))?;
    let wire = puzzle.connect(sequencer, "power", lamp, "power")?;
    let options = puzzle.graph_mut().wire_mut(wire).expect("wire");
    options.from.options = ConnectionOptions::from_slice(&[0b0101])?;
    options.to.options = ConnectionOptions::from_slice(&[7, -1])?;

    let sign = puzzle.spawn_tile(builtin::SIGN, Cell::grid(5, 5))?;
    puzzle.set_value(sign, "text", PropertyValue::String("Exit →".into()))?;
    puzzle.set_value(
        sign,
        "lines",
        PropertyValue::StringArray(vec!["left".into(), String::new(), "right".into()]),
    )?;
    puzzle.set_value(sign, "background", PropertyValue::BackgroundRef(Some(BACKDROP)))?;
    puzzle.set_value(sign, "decal", PropertyValue::Decal(Decal::new(STICKER, 3)))?;

    let decoration = puzzle.spawn_tile(builtin::DECORATION, Cell::grid(5, 5))?;
    puzzle.set_value(
        decoration,
        "decals",
        PropertyValue::DecalArray(vec![Decal::new(STICKER, 1), Decal::new(Guid::NIL, 0)]),
    )?;
    puzzle.set_value(decoration, "tint", PropertyValue::IntArray(vec![1, -2, 3]))?;
    puzzle.set_value(decoration, "variant", PropertyValue::Uuid(Guid::from_u128(99)))?;

    let speaker = puzzle.spawn_tile(builtin::SPEAKER, Cell::grid(6, 6))?;
    puzzle.set_value(speaker, "sound", PropertyValue::SoundRef(Some(CHIME)))?;
    puzzle.set_value(speaker, "playlist", PropertyValue::SoundArray(vec![CHIME, BELL]))?;
    puzzle.set_value(speaker, "plays", PropertyValue::Int(4))?;

    let marker = puzzle.spawn_tile(builtin::MARKER, Cell::grid(1, 0))?;
    puzzle.set_value(marker, "target", PropertyValue::Cell(Cell::grid(4, -4)))?;
    puzzle.set_value(marker, "spawns", PropertyValue::TileRef(Some(builtin::GEM)))?;
    puzzle.set_value(
        marker,
        "door",
        PropertyValue::ComponentRef(Some(ComponentRef {
            tile: door,
            kind: Door::KIND,
        })),
    )?;

    let gem = puzzle.spawn_tile(builtin::GEM, Cell::grid(7, 7))?;
    puzzle.set_value(gem, "points", PropertyValue::Int(5))?;

    puzzle.set_value(switch, "isOn", PropertyValue::Bool(true))?;
    puzzle.set_powered(switch, "power", true)?;
    Ok(puzzle)
}

#[test]
fn round_trip_preserves_tiles_values_and_wiring() -> TestResult {
    let original = workshop()?;
    let codec = DocumentCodec::new();
    let bytes = codec.encode(&original);
    let header = DocumentCodec::inspect(&bytes)?;
    assert_eq!(header.version, 5);
    assert_eq!(header.tiles, original.tile_count());
    assert_eq!(header.wires, 4);

    let mut loaded = codec.decode(&bytes, PuzzleConfig::default(), stock())?;
    assert_eq!(describe(&loaded), describe(&original));
    assert_eq!(codec.encode(&loaded), bytes);

    let door = loaded.cell_to_tile(Cell::grid(1, 0), Layer::Static).expect("door");
    assert_eq!(loaded.value(door, "isOpen")?, PropertyValue::Bool(true));
    let marker = loaded
        .cell_to_tile(Cell::grid(1, 0), Layer::InvisibleFloor)
        .expect("marker");
    assert_eq!(
        loaded.value(marker, "door")?,
        PropertyValue::ComponentRef(Some(ComponentRef {
            tile: door,
            kind: Door::KIND,
        }))
    );
    let speaker = loaded.cell_to_tile(Cell::grid(6, 6), Layer::Logic).expect("speaker");
    assert_eq!(loaded.value(speaker, "plays")?, PropertyValue::Int(0));

    loaded.start()?;
    let display = loaded.cell_to_tile(Cell::grid(1, 2), Layer::Static).expect("display");
    assert_eq!(loaded.value(display, "committed")?, PropertyValue::Int(2));
    let lamp = loaded.cell_to_tile(Cell::grid(3, 4), Layer::Static).expect("lamp");
    assert_eq!(loaded.value(lamp, "isOpen")?, PropertyValue::Bool(true));
    let power = loaded.port(lamp, "power").expect("port");
    let wire = loaded.graph().wire(loaded.graph().wires_of(power)[0]).expect("wire");
    assert_eq!(wire.to.options.as_slice(), &[7, -1]);
    Ok(())
}

#[test]
fn save_and_load_through_the_filesystem() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("workshop.puzl");
    let original = workshop()?;
    let codec = DocumentCodec::new();
    codec.save(&original, &path)?;
    let loaded = codec.load(&path, PuzzleConfig::default(), stock())?;
    assert_eq!(describe(&loaded), describe(&original));

    let missing = codec.load(dir.path().join("absent.puzl"), PuzzleConfig::default(), stock());
    assert!(matches!(missing, Err(CodecError::Io(_))));
    Ok(())
}

fn lamp_puzzle() -> Result<Puzzle, Box<dyn std::error::Error>> {
    let mut puzzle = Puzzle::new(PuzzleConfig::default(), with_lamp())?;
    let switch = puzzle.spawn_tile(builtin::SWITCH, Cell::grid(0, 0))?;
    let lamp = puzzle.spawn_tile(LAMP, Cell::grid(1, 0))?;
    puzzle.rename_tile(lamp, Some("porch".into()))?;
    let door = puzzle.spawn_tile(builtin::DOOR, Cell::grid(2, 0))?;
    puzzle.connect(switch, "power", lamp, "power")?;
    puzzle.connect(switch, "power", door, "power")?;
    let marker = puzzle.spawn_tile(builtin::MARKER, Cell::grid(0, 0))?;
    puzzle.set_value(marker, "spawns", PropertyValue::TileRef(Some(LAMP)))?;
    puzzle.set_value(
        marker,
        "door",
        PropertyValue::ComponentRef(Some(ComponentRef {
            tile: lamp,
            kind: Door::KIND,
        })),
    )?;
    Ok(puzzle)
}

#[test]
fn unknown_templates_drop_their_tiles_and_wires() -> TestResult {
    let bytes = DocumentCodec::new().encode(&lamp_puzzle()?);
    let loaded = DocumentCodec::new().decode(&bytes, PuzzleConfig::default(), stock())?;

    assert_eq!(loaded.tile_count(), 3);
    assert_eq!(loaded.graph().wire_count(), 1);
    let switch = loaded.topmost_tile(Cell::grid(0, 0)).expect("switch");
    let wires = loaded.graph().wires_of(loaded.port(switch, "power").expect("port"));
    assert_eq!(wires.len(), 1);
    let wire = loaded.graph().wire(wires[0]).expect("wire");
    let door = loaded.cell_to_tile(Cell::grid(2, 0), Layer::Static).expect("door");
    assert_eq!(wire.to.tile, door);

    let marker = loaded
        .cell_to_tile(Cell::grid(0, 0), Layer::InvisibleFloor)
        .expect("marker");
    assert_eq!(loaded.value(marker, "spawns")?, PropertyValue::TileRef(None));
    assert_eq!(loaded.value(marker, "door")?, PropertyValue::ComponentRef(None));
    Ok(())
}

#[test]
fn migrations_retarget_templates_and_tile_references() -> TestResult {
    let bytes = DocumentCodec::new().encode(&lamp_puzzle()?);
    let codec = DocumentCodec::new().with_migrations(MigrationTable::new().with(LAMP, builtin::DOOR));
    let loaded = codec.decode(&bytes, PuzzleConfig::default(), stock())?;

    assert_eq!(loaded.tile_count(), 4);
    assert_eq!(loaded.graph().wire_count(), 2);
    let lamp = loaded.cell_to_tile(Cell::grid(1, 0), Layer::Static).expect("lamp");
    let tile = loaded.tile(lamp).expect("tile");
    assert_eq!(tile.template(), builtin::DOOR);
    assert_eq!(tile.custom_name(), Some("porch"));

    let marker = loaded
        .cell_to_tile(Cell::grid(0, 0), Layer::InvisibleFloor)
        .expect("marker");
    assert_eq!(
        loaded.value(marker, "spawns")?,
        PropertyValue::TileRef(Some(builtin::DOOR))
    );
    assert_eq!(
        loaded.value(marker, "door")?,
        PropertyValue::ComponentRef(Some(ComponentRef {
            tile: lamp,
            kind: Door::KIND,
        }))
    );
    Ok(())
}

#[test]
fn missing_assets_leave_defaults() -> TestResult {
    let bytes = DocumentCodec::new().encode(&workshop()?);
    let codec = DocumentCodec::new().with_catalog(AssetSet::new().with_sound(CHIME));
    let loaded = codec.decode(&bytes, PuzzleConfig::default(), stock())?;

    let sign = loaded.cell_to_tile(Cell::grid(5, 5), Layer::Static).expect("sign");
    assert_eq!(loaded.value(sign, "background")?, PropertyValue::BackgroundRef(None));
    assert_eq!(loaded.value(sign, "decal")?, PropertyValue::Decal(Decal::default()));
    assert_eq!(loaded.value(sign, "text")?, PropertyValue::String("Exit →".into()));

    let decoration = loaded.cell_to_tile(Cell::grid(5, 5), Layer::Floor).expect("decoration");
    assert_eq!(loaded.value(decoration, "decals")?, PropertyValue::DecalArray(Vec::new()));

    let speaker = loaded.cell_to_tile(Cell::grid(6, 6), Layer::Logic).expect("speaker");
    assert_eq!(loaded.value(speaker, "sound")?, PropertyValue::SoundRef(Some(CHIME)));
    assert_eq!(loaded.value(speaker, "playlist")?, PropertyValue::SoundArray(Vec::new()));
    Ok(())
}

#[test]
fn unlinked_tiles_are_not_written() -> TestResult {
    let mut puzzle = workshop()?;
    let gem = puzzle.cell_to_tile(Cell::grid(7, 7), Layer::Dynamic).expect("gem");
    assert!(puzzle.unlink_tile(gem));
    let header = DocumentCodec::inspect(&DocumentCodec::new().encode(&puzzle))?;
    assert_eq!(header.tiles, puzzle.tile_count() - 1);
    Ok(())
}

#[test]
fn damaged_documents_are_rejected() -> TestResult {
    let codec = DocumentCodec::new();
    let bytes = codec.encode(&workshop()?);
    let truncated = codec.decode(&bytes[..bytes.len() - 3], PuzzleConfig::default(), stock());
    assert!(matches!(truncated, Err(CodecError::Truncated { .. })));

    let mut oversized = bytes[..8].to_vec();
    oversized.extend_from_slice(&1_000_000i32.to_le_bytes());
    oversized.extend_from_slice(&0i32.to_le_bytes());
    let oversized = codec.decode(&oversized, PuzzleConfig::default(), stock());
    assert!(matches!(oversized, Err(CodecError::Malformed(_))));
    Ok(())
}

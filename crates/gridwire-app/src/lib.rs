//! Demo scene, configuration loading, and the tick runner behind the
//! `gridwire` binary.

use anyhow::{Context, Result};
use gridwire_core::builtin::{self, Collectible, CollectibleTally};
use gridwire_core::{
    Cell, ConnectionOptions, Edge, EventKind, PropertyValue, Puzzle, PuzzleConfig, Routing,
    TileSet,
};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Where the scripted visitor presses.
pub const BUTTON_CELL: Cell = Cell::grid(0, 0);
/// Cells the visitor walks over on the final tick.
pub const GEM_CELLS: [Cell; 2] = [Cell::grid(4, 0), Cell::grid(5, 0)];

/// Read a JSON config file, or fall back to defaults, and validate it.
pub fn load_config(path: Option<&Path>) -> Result<PuzzleConfig> {
    let config = match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str::<PuzzleConfig>(&raw)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => PuzzleConfig::default(),
    };
    config.validate().context("invalid puzzle configuration")?;
    Ok(config)
}

pub fn stock_tileset() -> Result<Arc<TileSet>> {
    let tileset = builtin::tileset().context("stock tile set failed validation")?;
    Ok(Arc::new(tileset))
}

/// A switch/door lobby, a button-driven counter vault, a timer-stepped
/// sequencer, and a pair of gems feeding a score display.
pub fn demo_puzzle(config: PuzzleConfig, tileset: Arc<TileSet>) -> Result<Puzzle> {
    let mut puzzle = Puzzle::new(config, tileset)?;

    let switch = puzzle.spawn_tile(builtin::SWITCH, Cell::grid(0, 2))?;
    puzzle.rename_tile(switch, Some("lobby switch".into()))?;
    let door = puzzle.spawn_tile(builtin::DOOR, Cell::grid(1, 2))?;
    let gate = puzzle.spawn_tile(builtin::GATE, Cell::shared_edge(1, 2, Edge::East))?;
    puzzle.connect(switch, "power", door, "power")?;
    puzzle.connect(switch, "power", gate, "power")?;

    let button = puzzle.spawn_tile(builtin::BUTTON, BUTTON_CELL)?;
    let counter = puzzle.spawn_tile(builtin::COUNTER, Cell::grid(0, 0))?;
    let display = puzzle.spawn_tile(builtin::DISPLAY, Cell::grid(1, 0))?;
    let vault = puzzle.spawn_tile(builtin::DOOR, Cell::grid(2, 0))?;
    puzzle.rename_tile(vault, Some("vault".into()))?;
    let speaker = puzzle.spawn_tile(builtin::SPEAKER, Cell::grid(0, 1))?;
    puzzle.connect(button, "pressed", counter, "increment")?;
    puzzle.connect(button, "pressed", switch, "toggle")?;
    puzzle.connect(button, "pressed", speaker, "play")?;
    puzzle.connect(counter, "value", display, "value")?;
    puzzle.connect(counter, "reached", vault, "power")?;

    let timer = puzzle.spawn_tile(builtin::TIMER, Cell::grid(0, 3))?;
    puzzle.set_value(timer, "interval", PropertyValue::Int(4))?;
    let sequencer = puzzle.spawn_tile(builtin::SEQUENCER, Cell::grid(1, 3))?;
    puzzle.connect(timer, "elapsed", sequencer, "advance")?;
    for (x, mask) in [(2, 0b0011), (3, 0b1100)] {
        let lock = puzzle.spawn_tile(builtin::DOOR, Cell::grid(x, 3))?;
        let wire = puzzle.connect(sequencer, "power", lock, "power")?;
        if let Some(wire) = puzzle.graph_mut().wire_mut(wire) {
            wire.from.options = ConnectionOptions::from_slice(&[mask])?;
        }
    }

    let score = puzzle.spawn_tile(builtin::DISPLAY, Cell::grid(6, 0))?;
    for (cell, points) in GEM_CELLS.into_iter().zip([2, 3]) {
        let gem = puzzle.spawn_tile(builtin::GEM, cell)?;
        puzzle.set_value(gem, "points", PropertyValue::Int(points))?;
        puzzle.connect(gem, "total", score, "value")?;
    }

    let sign = puzzle.spawn_tile(builtin::SIGN, Cell::grid(1, 1))?;
    puzzle.set_value(
        sign,
        "text",
        PropertyValue::String("Press the button three times".into()),
    )?;
    let marker = puzzle.spawn_tile(builtin::MARKER, Cell::grid(2, 0))?;
    puzzle.set_value(marker, "target", PropertyValue::Cell(Cell::grid(2, 0)))?;

    debug!(
        tiles = puzzle.tile_count(),
        wires = puzzle.graph().wire_count(),
        "demo puzzle built"
    );
    Ok(puzzle)
}

/// How [`run`] drives a puzzle.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub ticks: u64,
    /// Press [`BUTTON_CELL`] every this many ticks; 0 never presses.
    pub press_every: u64,
    /// Sleep between ticks; `None` runs flat out.
    pub pace: Option<Duration>,
}

/// Outcome of a run, printed as JSON by the binary.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RunReport {
    pub ticks: u64,
    pub tiles: usize,
    pub wires: usize,
    pub presses: u64,
    pub open_doors: usize,
    pub collected: usize,
    pub points: i32,
}

/// Start the puzzle and advance it while a scripted visitor presses the
/// button and, on the last tick, walks over the gems.
pub fn run(puzzle: &mut Puzzle, options: &RunOptions) -> Result<RunReport> {
    puzzle.start()?;
    let mut presses = 0;
    for step in 1..=options.ticks {
        let tick = puzzle.advance_tick()?;
        if options.press_every > 0 && step % options.press_every == 0 {
            if puzzle.send_to_cell(EventKind::Interact, BUTTON_CELL, Routing::FirstHandled)? {
                presses += 1;
            }
            debug!(tick = tick.0, presses, "visitor pressed");
        }
        if step == options.ticks {
            for cell in GEM_CELLS {
                puzzle.send_to_cell(EventKind::Enter, cell, Routing::All)?;
            }
        }
        if let Some(pace) = options.pace {
            thread::sleep(pace);
        }
    }

    let open_doors = puzzle
        .tiles()
        .filter(|(id, _)| matches!(puzzle.value(*id, "isOpen"), Ok(PropertyValue::Bool(true))))
        .count();
    let tally = puzzle
        .shared()
        .get::<CollectibleTally>(Collectible::KIND);
    let report = RunReport {
        ticks: puzzle.tick().0,
        tiles: puzzle.tile_count(),
        wires: puzzle.graph().wire_count(),
        presses,
        open_doors,
        collected: tally.map_or(0, |t| t.collected),
        points: tally.map_or(0, |t| t.points),
    };
    info!(
        ticks = report.ticks,
        presses = report.presses,
        open_doors = report.open_doors,
        points = report.points,
        "run finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo() -> Puzzle {
        let tileset = stock_tileset().expect("tile set");
        demo_puzzle(PuzzleConfig::default(), tileset).expect("demo")
    }

    #[test]
    fn three_presses_open_the_vault_and_gems_score() {
        let mut puzzle = demo();
        let options = RunOptions {
            ticks: 9,
            press_every: 3,
            pace: None,
        };
        let report = run(&mut puzzle, &options).expect("run");
        assert_eq!(report.ticks, 9);
        assert_eq!(report.presses, 3);
        assert_eq!(report.collected, 2);
        assert_eq!(report.points, 5);

        let vault = puzzle
            .tiles()
            .find(|(_, tile)| tile.custom_name() == Some("vault"))
            .map(|(id, _)| id)
            .expect("vault");
        assert_eq!(puzzle.value(vault, "isOpen"), Ok(PropertyValue::Bool(true)));
        let display = puzzle.topmost_tile(Cell::grid(1, 0)).expect("display");
        assert_eq!(puzzle.value(display, "committed"), Ok(PropertyValue::Int(3)));
        let score = puzzle.topmost_tile(Cell::grid(6, 0)).expect("score");
        assert_eq!(puzzle.value(score, "committed"), Ok(PropertyValue::Int(5)));
    }

    #[test]
    fn config_defaults_and_rejections() {
        assert_eq!(load_config(None).expect("defaults"), PuzzleConfig::default());

        let dir = tempfile::tempdir().expect("tempdir");
        let good = dir.path().join("good.json");
        fs::write(&good, r#"{ "grid_size": 32, "tick_interval_ms": 5 }"#).expect("write");
        let config = load_config(Some(&good)).expect("config");
        assert_eq!(config.grid_size, 32);
        assert_eq!(config.tick_interval_ms, 5);

        let odd = dir.path().join("odd.json");
        fs::write(&odd, r#"{ "grid_size": 31 }"#).expect("write");
        assert!(load_config(Some(&odd)).is_err());
        assert!(load_config(Some(&dir.path().join("absent.json"))).is_err());
    }
}

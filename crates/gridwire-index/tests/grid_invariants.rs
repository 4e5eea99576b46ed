use gridwire_index::{
    Cell, CoordinateSystem, Edge, GridError, Layer, SpatialGrid, WorldPoint, cell_to_world,
    snap_tolerance, world_to_cell,
};
use std::collections::HashSet;

const SIZE: u32 = 16;

fn cells_for(grid: &SpatialGrid<u32>, system: CoordinateSystem) -> Vec<Cell> {
    let (min, max) = grid.bounds();
    let mut cells = Vec::new();
    for y in min..=max {
        for x in min..=max {
            match system {
                CoordinateSystem::Grid => cells.push(Cell::grid(x, y)),
                CoordinateSystem::Edge => {
                    cells.extend(Edge::ALL.iter().map(|&edge| Cell::edge(x, y, edge)));
                }
                CoordinateSystem::SharedEdge => {
                    cells.push(Cell::shared_edge(x, y, Edge::North));
                    cells.push(Cell::shared_edge(x, y, Edge::East));
                }
                CoordinateSystem::Invalid => {}
            }
        }
    }
    cells
}

#[test]
fn slot_index_is_injective_per_layer() {
    let grid: SpatialGrid<u32> = SpatialGrid::new(SIZE).expect("grid");
    for layer in Layer::ALL {
        let cells = cells_for(&grid, layer.system());
        let mut seen = HashSet::new();
        for cell in &cells {
            let index = grid.index(layer, *cell).expect("in-bounds cell");
            assert!(
                index < layer.stride() * (SIZE * SIZE) as usize,
                "index {index} for {cell} escapes layer {layer:?}"
            );
            assert!(seen.insert(index), "{cell} collides on {layer:?}");
        }
        assert_eq!(seen.len(), layer.stride() * (SIZE * SIZE) as usize);
    }
}

#[test]
fn cell_world_round_trip_is_exact() {
    let grid: SpatialGrid<u32> = SpatialGrid::new(SIZE).expect("grid");
    for system in [
        CoordinateSystem::Grid,
        CoordinateSystem::Edge,
        CoordinateSystem::SharedEdge,
    ] {
        for cell in cells_for(&grid, system) {
            let world = cell_to_world(cell);
            assert_eq!(world_to_cell(world, system), cell, "via {world:?}");
        }
    }
}

#[test]
fn world_points_snap_within_tolerance() {
    let samples = [
        WorldPoint::new(0.1, 0.2),
        WorldPoint::new(-1.3, 2.45),
        WorldPoint::new(3.49, -3.2),
        WorldPoint::new(-0.7, -0.05),
        WorldPoint::new(5.0, 5.45),
    ];
    for system in [
        CoordinateSystem::Grid,
        CoordinateSystem::Edge,
        CoordinateSystem::SharedEdge,
    ] {
        for point in samples {
            let cell = world_to_cell(point, system);
            assert_eq!(cell.system, system);
            let snapped = cell_to_world(cell);
            assert!(
                snapped.distance(point) <= snap_tolerance(system) + 1e-4,
                "{point:?} snapped to {snapped:?} in {system:?}"
            );
        }
    }
}

#[test]
fn edge_offsets_distinguish_thin_and_shared_edges() {
    let thin = cell_to_world(Cell::edge(2, 2, Edge::North));
    let shared = cell_to_world(Cell::shared_edge(2, 2, Edge::North));
    assert!((thin.y - 2.4).abs() < 1e-5);
    assert!((shared.y - 2.5).abs() < 1e-5);
    assert_eq!(
        cell_to_world(Cell::shared_edge(2, 3, Edge::South)),
        shared,
        "both owners of a border resolve to one point"
    );
}

#[test]
fn occupancy_holds_under_link_unlink_sequences() {
    let mut grid: SpatialGrid<u32> = SpatialGrid::new(8).expect("grid");
    let a = Cell::grid(0, 0);
    let b = Cell::grid(1, 0);
    let script: &[(bool, u32, Cell)] = &[
        (true, 1, a),
        (true, 2, a),
        (true, 2, b),
        (false, 2, a),
        (true, 3, b),
        (false, 1, a),
        (true, 4, a),
        (false, 9, b),
        (true, 1, a),
    ];
    for &(link, handle, cell) in script {
        let before = grid.get(Layer::Dynamic, cell);
        if link {
            match grid.link(Layer::Dynamic, cell, handle) {
                Ok(_) => assert_eq!(grid.get(Layer::Dynamic, cell), Some(handle)),
                Err(GridError::Occupied { .. }) => {
                    assert_eq!(grid.get(Layer::Dynamic, cell), before)
                }
                Err(other) => panic!("unexpected {other}"),
            }
        } else {
            grid.unlink(Layer::Dynamic, cell, handle);
            if before != Some(handle) {
                assert_eq!(grid.get(Layer::Dynamic, cell), before);
            }
        }
        let occupants: Vec<u32> = grid.iter_layer(Layer::Dynamic).collect();
        let unique: HashSet<u32> = occupants.iter().copied().collect();
        assert_eq!(occupants.len(), unique.len(), "a handle occupies two slots");
    }
    assert_eq!(grid.get(Layer::Dynamic, a), Some(4));
    assert_eq!(grid.get(Layer::Dynamic, b), Some(2));
}

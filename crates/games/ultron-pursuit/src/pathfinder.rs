//! Shortest walking paths on the grid.
//!
//! A* over 4-neighbour adjacency with unit step cost and a Manhattan
//! heuristic. The open set is ordered by `(f, h, y, x)` and neighbours are
//! expanded east, west, south, north, so identical inputs always yield the
//! identical path.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use ultron_core::grid::{Cell, Grid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Frontier {
    f: u32,
    h: u32,
    y: i32,
    x: i32,
}

/// Path from `start` (exclusive) to `goal` (inclusive) avoiding `blocking`.
///
/// Returns an empty vector when the goal is unreachable or `start == goal`.
pub fn find_path(grid: &Grid, blocking: &HashSet<Cell>, start: Cell, goal: Cell) -> Vec<Cell> {
    if start == goal || blocking.contains(&goal) {
        return Vec::new();
    }
    let (Some(start_idx), Some(_)) = (grid.index(start), grid.index(goal)) else {
        return Vec::new();
    };

    let cells = grid.cell_count();
    let mut g_score = vec![u32::MAX; cells];
    let mut came_from: Vec<Option<Cell>> = vec![None; cells];
    let mut closed = vec![false; cells];
    let mut open = BinaryHeap::new();

    g_score[start_idx] = 0;
    let h = start.distance(goal);
    open.push(Reverse(Frontier {
        f: h,
        h,
        y: start.y,
        x: start.x,
    }));

    while let Some(Reverse(node)) = open.pop() {
        let cell = Cell::new(node.x, node.y);
        let Some(idx) = grid.index(cell) else {
            continue;
        };
        if closed[idx] {
            continue;
        }
        if cell == goal {
            return reconstruct(grid, &came_from, start, goal);
        }
        closed[idx] = true;

        let next_g = g_score[idx] + 1;
        for neighbor in grid.neighbors(cell) {
            if blocking.contains(&neighbor) {
                continue;
            }
            let Some(n_idx) = grid.index(neighbor) else {
                continue;
            };
            if closed[n_idx] || next_g >= g_score[n_idx] {
                continue;
            }
            g_score[n_idx] = next_g;
            came_from[n_idx] = Some(cell);
            let h = neighbor.distance(goal);
            open.push(Reverse(Frontier {
                f: next_g + h,
                h,
                y: neighbor.y,
                x: neighbor.x,
            }));
        }
    }

    Vec::new()
}

fn reconstruct(grid: &Grid, came_from: &[Option<Cell>], start: Cell, goal: Cell) -> Vec<Cell> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(prev) = grid.index(current).and_then(|i| came_from[i]) {
        if prev == start {
            break;
        }
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

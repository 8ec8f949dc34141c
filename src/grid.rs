//! Two-dimensional navigation over the wrapping note grid.
//!
//! Notes are laid out row-major: index `i` sits at row `i / columns`,
//! column `i % columns`. The last row may be short. Moves wrap around both
//! axes, so the grid behaves like a torus with a ragged bottom edge.
//!
//! Everything here takes primitives only and has no state.

use serde::{Deserialize, Serialize};

/// Direction of a single grid step.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Computes the selection index after moving one cell in `direction`.
///
/// Vertical moves wrap modulo the row count and keep the column. When the
/// target cell falls past the end of a short last row, rows are scanned
/// further in the same direction until one holds that column: an upward
/// wrap settles on the last row that has it, a downward wrap on the first.
/// Horizontal moves wrap modulo `columns` inside the current row and clamp
/// to the last note when the row is short.
///
/// # Arguments
/// * `direction` - The direction of the move
/// * `selected_index` - The current selection (clamped into range first)
/// * `total_count` - Number of notes in the grid
/// * `columns` - Column count derived from the viewport (treated as at least 1)
///
/// # Returns
/// The new index, always in `[0, total_count - 1]`. With an empty grid the
/// move is a no-op and `0` is returned; callers should not navigate then.
pub fn move_selection(
    direction: Direction,
    selected_index: usize,
    total_count: usize,
    columns: usize,
) -> usize {
    if total_count == 0 {
        return 0;
    }

    let columns = columns.max(1);
    let selected = selected_index.min(total_count - 1);
    let total_rows = total_count.div_ceil(columns);
    let row = selected / columns;
    let col = selected % columns;

    match direction {
        Direction::Up | Direction::Down => {
            let step = |r: usize| match direction {
                Direction::Up => (r + total_rows - 1) % total_rows,
                _ => (r + 1) % total_rows,
            };

            let mut candidate = step(row);
            for _ in 0..total_rows {
                let index = candidate * columns + col;
                if index < total_count {
                    return index;
                }
                candidate = step(candidate);
            }
            // Row 0 always holds `col`, so the scan above returns first.
            selected
        }
        Direction::Left | Direction::Right => {
            let new_col = match direction {
                Direction::Left => (col + columns - 1) % columns,
                _ => (col + 1) % columns,
            };
            (row * columns + new_col).min(total_count - 1)
        }
    }
}

/// Index of the last note, or 0 for an empty grid.
pub fn last_index(total_count: usize) -> usize {
    total_count.saturating_sub(1)
}

/// Clamps a selection into `[0, total_count - 1]`.
pub fn clamp_index(index: usize, total_count: usize) -> usize {
    index.min(last_index(total_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_up_from_top_wraps_to_bottom_of_full_grid() {
        assert_eq!(move_selection(Direction::Up, 0, 12, 4), 8);
    }

    #[test]
    fn test_down_from_bottom_wraps_to_top_of_full_grid() {
        assert_eq!(move_selection(Direction::Down, 9, 12, 4), 1);
    }

    #[test]
    fn test_down_from_ragged_last_row_wraps_to_first_row() {
        // rows: [0..4), [4..8), [8, 9]
        assert_eq!(move_selection(Direction::Down, 9, 10, 4), 1);
    }

    #[test]
    fn test_down_into_missing_cell_wraps_to_first_row() {
        // index 6 is row 1, col 2; row 2 has no col 2
        assert_eq!(move_selection(Direction::Down, 6, 10, 4), 2);
    }

    #[test]
    fn test_up_into_missing_cell_settles_on_last_valid_row() {
        // index 3 is row 0, col 3; wrapping up lands on row 2 (empty at col 3)
        assert_eq!(move_selection(Direction::Up, 3, 10, 4), 7);
    }

    #[test]
    fn test_horizontal_wraps_inside_row() {
        assert_eq!(move_selection(Direction::Right, 3, 12, 4), 0);
        assert_eq!(move_selection(Direction::Left, 4, 12, 4), 7);
    }

    #[test]
    fn test_horizontal_in_short_row_clamps_to_last() {
        assert_eq!(move_selection(Direction::Right, 9, 10, 4), 9);
        assert_eq!(move_selection(Direction::Left, 8, 10, 4), 9);
    }

    #[test]
    fn test_single_column_behaves_like_list() {
        assert_eq!(move_selection(Direction::Down, 2, 5, 1), 3);
        assert_eq!(move_selection(Direction::Down, 4, 5, 1), 0);
        assert_eq!(move_selection(Direction::Up, 0, 5, 1), 4);
        assert_eq!(move_selection(Direction::Left, 2, 5, 1), 2);
    }

    #[test]
    fn test_zero_columns_treated_as_one() {
        assert_eq!(move_selection(Direction::Down, 0, 3, 0), 1);
    }

    #[test]
    fn test_more_columns_than_notes() {
        assert_eq!(move_selection(Direction::Left, 0, 3, 5), 2);
        assert_eq!(move_selection(Direction::Down, 1, 3, 5), 1);
    }

    #[test]
    fn test_empty_grid_is_noop() {
        assert_eq!(move_selection(Direction::Down, 0, 0, 4), 0);
    }

    #[test]
    fn test_stale_selection_is_clamped_before_moving() {
        assert_eq!(move_selection(Direction::Left, 40, 10, 4), 8);
    }

    #[test]
    fn test_clamp_index() {
        assert_eq!(clamp_index(5, 3), 2);
        assert_eq!(clamp_index(1, 3), 1);
        assert_eq!(clamp_index(7, 0), 0);
    }

    fn direction_strategy() -> impl Strategy<Value = Direction> {
        prop_oneof![
            Just(Direction::Up),
            Just(Direction::Down),
            Just(Direction::Left),
            Just(Direction::Right),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Every move lands on an existing note.
        #[test]
        fn prop_move_stays_in_bounds(
            direction in direction_strategy(),
            total in 1usize..200,
            columns in 1usize..12,
            selected in 0usize..250,
        ) {
            let next = move_selection(direction, selected, total, columns);
            prop_assert!(next < total);
        }

        /// Vertical moves never change the column.
        #[test]
        fn prop_vertical_move_keeps_column(
            up in any::<bool>(),
            total in 1usize..200,
            columns in 1usize..12,
            selected in 0usize..200,
        ) {
            let selected = selected % total;
            let direction = if up { Direction::Up } else { Direction::Down };
            let next = move_selection(direction, selected, total, columns);
            prop_assert_eq!(next % columns, selected % columns);
        }

        /// On a full grid, moving one way and back returns to the start.
        #[test]
        fn prop_full_grid_moves_are_reversible(
            direction in direction_strategy(),
            rows in 1usize..10,
            columns in 1usize..10,
            selected in 0usize..100,
        ) {
            let total = rows * columns;
            let selected = selected % total;
            let opposite = match direction {
                Direction::Up => Direction::Down,
                Direction::Down => Direction::Up,
                Direction::Left => Direction::Right,
                Direction::Right => Direction::Left,
            };
            let there = move_selection(direction, selected, total, columns);
            prop_assert_eq!(move_selection(opposite, there, total, columns), selected);
        }
    }
}

use serde::{Deserialize, Serialize};

/// Minimum persisted window width in pixels
pub const MIN_WINDOW_WIDTH: u32 = 600;
/// Minimum persisted window height in pixels
pub const MIN_WINDOW_HEIGHT: u32 = 400;
/// Gap kept on the right of the grid
pub const RIGHT_MARGIN: u32 = 10;
/// Width reserved for the vertical scrollbar
pub const SCROLLBAR_SPACE: u32 = 10;
/// Gap between two neighbouring cards
pub const CARD_SPACING: u32 = 20;
/// Largest column count the optimizer will try
pub const MAX_OPTIMAL_COLUMNS: u32 = 5;
/// Card height change per keyboard step
pub const CARD_HEIGHT_STEP: u32 = 10;
pub const MIN_CARD_HEIGHT: u32 = 1;
pub const MAX_CARD_HEIGHT: u32 = 5000;

/// Card widths the optimizer considers readable
const READABLE_CARD_WIDTH: std::ops::RangeInclusive<u32> = 150..=400;
/// Width at which two notes are shown side by side
const MIN_TWO_COLUMN_WIDTH: u32 = 200;

/// Geometry of the grid area as reported by the rendering layer.
///
/// A zero width means the layout pass has not happened yet.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    pub grid_width: u32,
    pub left_margin: u32,
}

impl Viewport {
    pub fn new(grid_width: u32, left_margin: u32) -> Self {
        Self {
            grid_width,
            left_margin,
        }
    }

    /// Width left for cards once margins and the scrollbar are removed.
    pub fn available_width(&self) -> u32 {
        self.grid_width
            .saturating_sub(
                self.left_margin
                    .saturating_add(RIGHT_MARGIN)
                    .saturating_add(SCROLLBAR_SPACE),
            )
    }

    /// Whether the rendering layer has measured the grid yet.
    pub fn is_ready(&self) -> bool {
        self.available_width() > 0
    }
}

/// Card width that makes `columns` cards fill `available` exactly.
pub fn card_width_for_columns(available: u32, columns: u32) -> u32 {
    let columns = columns.max(1);
    available.saturating_sub((columns - 1).saturating_mul(CARD_SPACING)) / columns
}

/// Column count the grid shows for a given card width.
///
/// Each cell is a card plus one spacing gap; the last card has no trailing
/// gap, hence the extra spacing on the numerator.
///
/// # Arguments
/// * `available` - Width available for cards
/// * `card_width` - Current card width
///
/// # Returns
/// The column count, never less than 1
pub fn grid_columns(available: u32, card_width: u32) -> usize {
    let cell = u64::from(card_width) + u64::from(CARD_SPACING);
    let columns = (u64::from(available) + u64::from(CARD_SPACING)) / cell.max(1);
    (columns as usize).max(1)
}

/// Approximate column count used by the column stepping shortcuts.
///
/// A card covering at least 90% of the available width counts as a single
/// full-width column.
pub fn current_columns(available: u32, card_width: u32) -> u32 {
    if is_full_width(available, card_width) {
        return 1;
    }
    grid_columns(available, card_width) as u32
}

fn is_full_width(available: u32, card_width: u32) -> bool {
    u64::from(card_width) * 10 >= u64::from(available) * 9
}

/// Picks a readable column count for the current notes.
///
/// # Arguments
/// * `available` - Width available for cards
/// * `total_notes` - Number of visible notes
///
/// # Returns
/// * `Some(columns)` - The preferred column count
/// * `None` - If there are no notes to lay out
pub fn optimal_columns(available: u32, total_notes: usize) -> Option<u32> {
    match total_notes {
        0 => None,
        1 => Some(1),
        2 => {
            let two_wide = available.saturating_sub(CARD_SPACING) / 2;
            Some(if two_wide >= MIN_TWO_COLUMN_WIDTH { 2 } else { 1 })
        }
        _ => {
            let limit = (total_notes as u32).min(MAX_OPTIMAL_COLUMNS);
            let mut optimal = 1;
            for columns in 1..=limit {
                let width = card_width_for_columns(available, columns);
                if READABLE_CARD_WIDTH.contains(&width) {
                    optimal = columns;
                } else if width > *READABLE_CARD_WIDTH.end() && columns > optimal {
                    optimal = columns;
                }
            }
            Some(optimal)
        }
    }
}

/// Column count after an "increase columns" step, if one is possible.
///
/// There is never any point in more columns than notes.
pub fn columns_after_increase(available: u32, card_width: u32, total_notes: usize) -> Option<u32> {
    if total_notes == 0 {
        return None;
    }
    let current = current_columns(available, card_width);
    if current as usize >= total_notes {
        return None;
    }
    Some(current + 1)
}

/// Column count after a "decrease columns" step, if one is possible.
///
/// A single narrow column is first widened to the full width before the
/// step is refused.
pub fn columns_after_decrease(available: u32, card_width: u32) -> Option<u32> {
    let current = current_columns(available, card_width);
    if current <= 1 {
        if is_full_width(available, card_width) {
            return None;
        }
        return Some(1);
    }
    Some(current - 1)
}

/// Next card height for a keyboard step, clamped to the allowed range.
pub fn step_card_height(current: u32, increase: bool) -> u32 {
    let next = if increase {
        current.saturating_add(CARD_HEIGHT_STEP)
    } else {
        current.saturating_sub(CARD_HEIGHT_STEP)
    };
    next.clamp(MIN_CARD_HEIGHT, MAX_CARD_HEIGHT)
}

/// Whether a reported window size should be persisted.
pub fn is_persistable_window_size(width: u32, height: u32) -> bool {
    width >= MIN_WINDOW_WIDTH && height >= MIN_WINDOW_HEIGHT
}

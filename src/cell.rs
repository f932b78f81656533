/// A single grid position as parsed from the map text.
///
/// The robot itself is not a cell: `GridMap` tracks its position separately
/// and overlays it at render time, so a cell's cleaning history survives the
/// robot passing through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cell {
    /// An impassable position, remembering the glyph it was parsed from.
    Wall(char),
    /// An open position the robot has not visited yet.
    Dirty,
    /// An open position the robot has already cleaned.
    Clean,
}

impl Cell {
    pub fn from_char(value: char) -> Cell {
        match value {
            ' ' => Cell::Dirty,
            wall => Cell::Wall(wall),
        }
    }

    pub fn to_char(self) -> char {
        match self {
            Cell::Wall(glyph) => glyph,
            Cell::Dirty => ' ',
            Cell::Clean => '/',
        }
    }

    pub fn is_wall(self) -> bool {
        matches!(self, Cell::Wall(_))
    }
}

/// Represents the direction the robot can move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    /// The (dx, dy) offset of one step in this direction, y growing downward.
    pub fn offset(self) -> (isize, isize) {
        match self {
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_parsing_a_space_the_cell_is_dirty_floor() {
        assert_eq!(Cell::from_char(' '), Cell::Dirty);
    }

    #[test]
    fn when_parsing_any_other_glyph_the_cell_is_a_wall_keeping_the_glyph() {
        assert_eq!(Cell::from_char('#'), Cell::Wall('#'));
        assert_eq!(Cell::from_char('%'), Cell::Wall('%'));
        assert_eq!(Cell::Wall('%').to_char(), '%');
    }

    #[test]
    fn when_rendering_cells_the_trail_marker_differs_from_unvisited_floor() {
        assert_ne!(Cell::Clean.to_char(), Cell::Dirty.to_char());
    }

    #[test]
    fn when_offsetting_in_each_direction_opposite_directions_cancel_out() {
        let (dx, dy) = Direction::Up.offset();
        let (dx2, dy2) = Direction::Down.offset();
        assert_eq!((dx + dx2, dy + dy2), (0, 0));

        let (dx, dy) = Direction::Left.offset();
        let (dx2, dy2) = Direction::Right.offset();
        assert_eq!((dx + dx2, dy + dy2), (0, 0));
    }
}

use crate::cell::{Cell, Direction};
use crossterm::{
    cursor::Hide,
    execute,
    style::{Color, Print, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use rand::seq::SliceRandom;
use rand::Rng;
use std::io::{stdout, Write};
use thiserror::Error;

/// Failure modes of a single robot step.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum StepError {
    /// The map has no open cell for the robot to stand on.
    #[error("robot has not been placed on the map")]
    RobotNotPlaced,
    /// Every neighboring cell is a wall or out of bounds.
    #[error("robot has no passable neighboring cell")]
    Deadlock,
}

/// The grid, the robot on it, and the cleaning counters.
///
/// Created by parsing map text, mutated in place by [`GridMap::advance`], and
/// replaced wholesale when a new map is submitted.
pub struct GridMap {
    grid: Vec<Vec<Cell>>,
    robot: Option<(usize, usize)>,
    last_direction: Option<Direction>,
    total_spaces: usize,
    unclean_spaces: usize,
}

impl GridMap {
    /// Parses map text into a grid.
    ///
    /// Rows are separated by newlines and each character is one cell: a space
    /// is open floor, anything else is a wall. The first open cell in
    /// row-major order becomes the robot's starting position and counts as
    /// already cleaned. Empty input produces the valid degenerate empty grid
    /// with no robot.
    pub fn parse(contents: &str) -> GridMap {
        let mut grid = Vec::new();
        let mut robot = None;
        let mut total_spaces = 0;

        for (y, line) in contents.lines().enumerate() {
            let mut row = Vec::with_capacity(line.len());

            for (x, value) in line.chars().enumerate() {
                let mut cell = Cell::from_char(value);

                if cell == Cell::Dirty {
                    total_spaces += 1;

                    // The robot starts on the first open cell and its start
                    // cell is considered already cleaned.
                    if robot.is_none() {
                        robot = Some((x, y));
                        cell = Cell::Clean;
                        tracing::debug!(x, y, "robot placed");
                    }
                }

                row.push(cell);
            }

            grid.push(row);
        }

        GridMap {
            grid,
            robot,
            last_direction: None,
            total_spaces,
            unclean_spaces: total_spaces.saturating_sub(1),
        }
    }

    /// The robot's current (x, y) position, if it has been placed.
    pub fn robot_position(&self) -> Option<(usize, usize)> {
        self.robot
    }

    /// Open cells counted at parse time. Never changes during a run.
    pub fn total_spaces(&self) -> usize {
        self.total_spaces
    }

    /// Open cells the robot has not visited yet.
    pub fn unclean_spaces(&self) -> usize {
        self.unclean_spaces
    }

    pub fn spaces_cleaned(&self) -> usize {
        self.total_spaces - self.unclean_spaces
    }

    pub fn is_complete(&self) -> bool {
        self.unclean_spaces == 0
    }

    /// Renders the grid as text, one character per cell: walls keep their
    /// parsed glyph, unvisited floor is a space, the clean trail is `/`, and
    /// the robot's current cell is overlaid with `X`.
    pub fn render(&self) -> String {
        let mut out = String::new();

        for (y, row) in self.grid.iter().enumerate() {
            for (x, cell) in row.iter().enumerate() {
                if self.robot == Some((x, y)) {
                    out.push('X');
                } else {
                    out.push(cell.to_char());
                }
            }
            out.push('\n');
        }

        out
    }

    /// Moves the robot one step in a random passable direction.
    ///
    /// The candidate order is biased: with probability 0.75 the previous
    /// direction, when one exists, is tried first; the rest follow in
    /// shuffled order. Each of the four directions is evaluated at most once
    /// against the grid bounds and the wall check, so a fully enclosed robot
    /// reports [`StepError::Deadlock`] instead of spinning forever.
    ///
    /// Returns the robot's new position.
    pub fn advance<R: Rng>(&mut self, rng: &mut R) -> Result<(usize, usize), StepError> {
        let (x, y) = self.robot.ok_or(StepError::RobotNotPlaced)?;

        // The robot leaves a clean trail behind it.
        self.grid[y][x] = Cell::Clean;

        let mut candidates = Direction::ALL;
        candidates.shuffle(rng);

        if let Some(last) = self.last_direction {
            if rng.gen_bool(0.75) {
                if let Some(i) = candidates.iter().position(|d| *d == last) {
                    candidates.swap(0, i);
                }
            }
        }

        for direction in candidates {
            let Some((nx, ny)) = self.neighbor(x, y, direction) else {
                continue;
            };

            if self.grid[ny][nx].is_wall() {
                continue;
            }

            if self.grid[ny][nx] == Cell::Dirty {
                self.grid[ny][nx] = Cell::Clean;
                self.unclean_spaces -= 1;
            }

            self.robot = Some((nx, ny));
            self.last_direction = Some(direction);
            tracing::trace!(
                x = nx,
                y = ny,
                unclean = self.unclean_spaces,
                "robot moved"
            );

            return Ok((nx, ny));
        }

        Err(StepError::Deadlock)
    }

    /// The coordinate one step from (x, y), validated against the grid
    /// bounds. Rows may be ragged, so the column bound is per-row.
    fn neighbor(&self, x: usize, y: usize, direction: Direction) -> Option<(usize, usize)> {
        let (dx, dy) = direction.offset();
        let nx = x.checked_add_signed(dx)?;
        let ny = y.checked_add_signed(dy)?;
        let row = self.grid.get(ny)?;

        if nx >= row.len() {
            return None;
        }

        Some((nx, ny))
    }

    /// Draws the grid to the console.
    pub fn draw(&self) {
        let mut stdout = stdout();

        execute!(stdout, Clear(ClearType::All), Hide).unwrap();

        for (y, row) in self.grid.iter().enumerate() {
            for (x, cell) in row.iter().enumerate() {
                let (color, glyph) = if self.robot == Some((x, y)) {
                    (Color::Yellow, 'X')
                } else {
                    match cell {
                        Cell::Wall(glyph) => (Color::DarkGrey, *glyph),
                        Cell::Clean => (Color::Green, '/'),
                        Cell::Dirty => (Color::Reset, ' '),
                    }
                };

                execute!(
                    stdout,
                    SetForegroundColor(color),
                    Print(glyph),
                    SetForegroundColor(Color::Reset)
                )
                .unwrap();
            }
            execute!(stdout, Print("\n")).unwrap();
        }

        stdout.flush().unwrap();
    }
}

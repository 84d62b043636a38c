use std::{fmt::Display, str::FromStr};

use snafu::Snafu;

use crate::grid::PixelGrid;

/// Which way image content moves. "Up" moves content toward row 0, "Left" toward column 0.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum ShiftDirection {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Axis {
    Horizontal,
    Vertical,
}

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(display("Unknown direction \"{direction}\" (expected up, down, left or right)"))]
pub struct ParseDirectionError {
    direction: String,
}

impl ShiftDirection {
    pub const ALL: [ShiftDirection; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    pub fn axis(&self) -> Axis {
        match self {
            Self::Up | Self::Down => Axis::Vertical,
            Self::Left | Self::Right => Axis::Horizontal,
        }
    }

    /// Whether content moves toward index 0 along its axis.
    #[inline(always)]
    fn toward_start(&self) -> bool {
        matches!(self, Self::Up | Self::Left)
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// The `(dx, dy)` that a shift by `offset` applies to image content. Positive y points down.
    pub fn displacement(&self, offset: usize) -> (isize, isize) {
        let offset = offset.min(isize::MAX as usize) as isize;
        match self {
            Self::Up => (0, -offset),
            Self::Down => (0, offset),
            Self::Left => (-offset, 0),
            Self::Right => (offset, 0),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl Display for ShiftDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ShiftDirection {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|direction| direction.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseDirectionError {
                direction: trimmed.to_owned(),
            })
    }
}

/// Shift a slice by a whole number of elements, filling whatever is uncovered with zeros. If `offset` is at least
/// the slice length, the whole slice becomes zero.
pub fn shift_slice(buf: &mut [f32], offset: usize, toward_start: bool) {
    let len = buf.len();
    let offset = offset.min(len);
    if offset == 0 {
        return;
    }

    if toward_start {
        // buf[i] = buf[i + offset]; the last `offset` elements have no source
        buf.copy_within(offset.., 0);
        buf[len - offset..].fill(0.0);
    } else {
        // buf[i] = buf[i - offset]; the first `offset` elements have no source
        buf.copy_within(..len - offset, offset);
        buf[..offset].fill(0.0);
    }
}

/// Translate every sample of `grid` by `offset` along `direction`, zero-filling the vacated edge.
///
/// The input grid is consumed and its buffer reused for the output. Offsets at least as large as the grid along the
/// shift axis produce an all-zero grid of the same size.
pub fn shift(mut grid: PixelGrid, direction: ShiftDirection, offset: usize) -> PixelGrid {
    let width = grid.width();
    let toward_start = direction.toward_start();

    match direction.axis() {
        Axis::Horizontal => {
            for row in grid.rows_mut() {
                shift_slice(row, offset, toward_start);
            }
        }
        Axis::Vertical => {
            // The grid is row-major, so moving by whole rows is a shift of the flat buffer. Saturate so huge offsets
            // still just mean "everything".
            shift_slice(
                grid.as_mut_slice(),
                offset.saturating_mul(width),
                toward_start,
            );
        }
    }

    grid
}

impl PixelGrid {
    /// Like [`shift`], but leaves `self` untouched and returns a shifted copy.
    pub fn shifted(&self, direction: ShiftDirection, offset: usize) -> PixelGrid {
        shift(self.clone(), direction, offset)
    }
}

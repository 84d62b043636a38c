use snafu::{OptionExt, Snafu, ensure};

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum GridError {
    #[snafu(display(
        "Buffer holds {actual} samples but a {width}x{height} grid needs {expected}"
    ))]
    SizeMismatch {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },

    #[snafu(display("A {width}x{height} grid has more samples than fit in memory"))]
    TooLarge { width: usize, height: usize },
}

fn sample_count(width: usize, height: usize) -> Result<usize, GridError> {
    width
        .checked_mul(height)
        .context(TooLargeSnafu { width, height })
}

/// A single-channel image of 32-bit float samples, stored row-major (`data[y * width + x]`).
#[derive(Debug, Clone, PartialEq)]
pub struct PixelGrid {
    width: usize,
    height: usize,
    data: Box<[f32]>,
}

impl PixelGrid {
    /// Wrap an existing buffer. The buffer length must be exactly `width * height`.
    pub fn new(width: usize, height: usize, data: impl Into<Box<[f32]>>) -> Result<Self, GridError> {
        let data = data.into();
        let expected = sample_count(width, height)?;
        ensure!(
            data.len() == expected,
            SizeMismatchSnafu {
                width,
                height,
                expected,
                actual: data.len(),
            }
        );
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn zeroed(width: usize, height: usize) -> Result<Self, GridError> {
        let len = sample_count(width, height)?;
        Ok(Self {
            width,
            height,
            data: vec![0.0; len].into_boxed_slice(),
        })
    }

    /// Build a grid by evaluating `f(x, y)` for every sample.
    pub fn from_fn(
        width: usize,
        height: usize,
        mut f: impl FnMut(usize, usize) -> f32,
    ) -> Result<Self, GridError> {
        sample_count(width, height)?;
        let data = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build a grid from a list of equally-sized rows, top row first.
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Result<Self, GridError> {
        let height = rows.len();
        let width = rows.first().map_or(0, |row| row.as_ref().len());
        let expected = sample_count(width, height)?;
        let data: Vec<f32> = rows
            .iter()
            .flat_map(|row| row.as_ref().iter().copied())
            .collect();
        // Ragged rows can still add up to width * height, so check each one.
        ensure!(
            rows.iter().all(|row| row.as_ref().len() == width),
            SizeMismatchSnafu {
                width,
                height,
                expected,
                actual: data.len(),
            }
        );
        Self::new(width, height, data)
    }

    #[inline(always)]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline(always)]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline(always)]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// The sample at column `x`, row `y`, or `None` if that lies outside the grid.
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        if x < self.width && y < self.height {
            Some(self.data[y * self.width + x])
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<f32> {
        self.data.into_vec()
    }

    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[f32]> {
        (0..self.height).map(move |y| &self.data[y * self.width..(y + 1) * self.width])
    }

    pub(crate) fn rows_mut(&mut self) -> std::slice::ChunksExactMut<'_, f32> {
        self.data.chunks_exact_mut(self.width.max(1))
    }

    pub fn is_all_zero(&self) -> bool {
        self.data.iter().all(|&sample| sample == 0.0)
    }
}

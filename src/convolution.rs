//! Sliding-window convolution over the fixed 5x5 input
//!
//! Implements the arithmetic leaf of the visualizer: a 3x3 kernel slides
//! over a 5x5 binary input, producing one scalar per valid window position
//! (9 positions total, row-major).
//!
//! Key properties:
//! - `convolve` is the raw linear sum; gradients are computed from it
//! - `display_output` applies ReLU and is used only for display and loss,
//!   never for gradient computation (the toy learning rule is linear)
//! - Out-of-range positions are programming errors, not recoverable failures

use serde::Serialize;

/// Side length of the square input matrix
pub const INPUT_SIZE: usize = 5;

/// Side length of the square kernel
pub const KERNEL_SIZE: usize = 3;

/// Side length of the output map (INPUT_SIZE - KERNEL_SIZE + 1)
pub const OUTPUT_SIZE: usize = 3;

/// Number of valid window positions per full pass
pub const NUM_POSITIONS: usize = OUTPUT_SIZE * OUTPUT_SIZE;

/// 5x5 binary input matrix (0/1 values)
pub type InputMatrix = [[u8; INPUT_SIZE]; INPUT_SIZE];

/// 3x3 binary target matrix (0/1 values)
pub type TargetMatrix = [[u8; OUTPUT_SIZE]; OUTPUT_SIZE];

/// 3x3 real-valued matrix, used for kernels, gradients, and output grids
pub type Matrix3 = [[f64; KERNEL_SIZE]; KERNEL_SIZE];

/// Top-left corner of a convolution window
///
/// Valid rows and columns are in [0, OUTPUT_SIZE). The canonical enumeration
/// order is row-major: (0,0), (0,1), (0,2), (1,0), ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    /// Create a position, asserting it is a valid window corner
    pub fn new(row: usize, col: usize) -> Self {
        assert!(
            row < OUTPUT_SIZE && col < OUTPUT_SIZE,
            "Position ({}, {}) outside valid window range [0, {})",
            row,
            col,
            OUTPUT_SIZE
        );
        Self { row, col }
    }

    /// Position for a flat index in canonical row-major order
    pub fn from_index(index: usize) -> Self {
        assert!(index < NUM_POSITIONS, "Position index {} out of range", index);
        Self {
            row: index / OUTPUT_SIZE,
            col: index % OUTPUT_SIZE,
        }
    }

    /// Flat index of this position in canonical row-major order
    #[inline]
    pub fn index(&self) -> usize {
        self.row * OUTPUT_SIZE + self.col
    }

    /// All 9 positions in canonical row-major order
    pub fn all() -> [Position; NUM_POSITIONS] {
        let mut positions = [Position { row: 0, col: 0 }; NUM_POSITIONS];
        for (index, slot) in positions.iter_mut().enumerate() {
            *slot = Position::from_index(index);
        }
        positions
    }
}

/// Pure convolution engine over one immutable input matrix
///
/// The input is passed in at construction rather than read from global
/// state, so alternative inputs can be exercised in tests.
#[derive(Debug, Clone)]
pub struct ConvolutionEngine {
    input: InputMatrix,
}

impl ConvolutionEngine {
    /// Create an engine for the given input matrix
    pub fn new(input: InputMatrix) -> Self {
        Self { input }
    }

    /// The input matrix this engine convolves over
    pub fn input(&self) -> &InputMatrix {
        &self.input
    }

    /// Input value under the window at `position`, offset by (i, j)
    #[inline]
    pub fn window_value(&self, position: Position, i: usize, j: usize) -> f64 {
        debug_assert!(i < KERNEL_SIZE && j < KERNEL_SIZE);
        f64::from(self.input[position.row + i][position.col + j])
    }

    /// Raw linear convolution output at one window position
    ///
    /// sum over (i, j) in [0, 3)x[0, 3) of input[row+i][col+j] * kernel[i][j].
    /// Pure and deterministic; no activation applied.
    pub fn convolve(&self, position: Position, kernel: &Matrix3) -> f64 {
        let mut sum = 0.0;
        for i in 0..KERNEL_SIZE {
            for j in 0..KERNEL_SIZE {
                sum += self.window_value(position, i, j) * kernel[i][j];
            }
        }
        sum
    }

    /// ReLU-activated output for display and loss computation only
    ///
    /// Gradients always flow through `convolve`, never through this.
    pub fn display_output(&self, position: Position, kernel: &Matrix3) -> f64 {
        self.convolve(position, kernel).max(0.0)
    }

    /// Full 3x3 ReLU output grid for a kernel
    pub fn output_grid(&self, kernel: &Matrix3) -> Matrix3 {
        let mut grid = [[0.0; KERNEL_SIZE]; KERNEL_SIZE];
        for position in Position::all() {
            grid[position.row][position.col] = self.display_output(position, kernel);
        }
        grid
    }
}

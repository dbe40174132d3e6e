//! Look-around sampling table.
//!
//! Each column of the table is a random permutation of the station's rate
//! indices. Walking a group's cursor row by row and then column by column
//! proposes every rate once per column, in an order that differs between
//! columns.

use itertools::Itertools;

use crate::simulation::SimulationRng;

/// `[rate][column]` table of rate indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleTable {
    rows: Vec<Vec<u8>>,
    columns: usize,
}

impl SampleTable {
    /// Places every rate index once per column: pick a random row, probe
    /// forward on collision.
    pub(crate) fn generate(rates: usize, columns: usize, rng: &mut SimulationRng) -> Self {
        assert!(rates > 0, "sample table needs at least one rate");
        let mut slots: Vec<Vec<Option<u8>>> = vec![vec![None; columns]; rates];
        for column in 0..columns {
            for rate in 0..rates {
                let mut row = rng.gen_range(0..rates);
                while slots[row][column].is_some() {
                    row = (row + 1) % rates;
                }
                slots[row][column] = Some(rate as u8);
            }
        }
        let rows = slots
            .into_iter()
            .map(|row| row.into_iter().flatten().collect())
            .collect();
        Self { rows, columns }
    }

    pub fn rates(&self) -> usize {
        self.rows.len()
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn get(&self, row: usize, column: usize) -> usize {
        self.rows[row][column] as usize
    }

    /// Tab separated rows, one line per rate index.
    pub fn dump(&self) -> String {
        self.rows
            .iter()
            .map(|row| row.iter().join("\t"))
            .join("\n")
    }
}

/// Position of one group in the sample table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleCursor {
    pub index: usize,
    pub column: usize,
}

impl SampleCursor {
    /// Moves to the next row, wrapping into the next column and back to the
    /// first column after the last.
    pub(crate) fn advance(&mut self, rates: usize, columns: usize) {
        self.index += 1;
        if self.index >= rates {
            self.index = 0;
            self.column += 1;
            if self.column >= columns {
                self.column = 0;
            }
        }
    }
}

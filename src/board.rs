use std::fmt;

use serde::{Deserialize, Serialize};

/// Width and height of every board.
pub const GRID_SIZE: u8 = 10;

#[derive(Default, Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coord {
	pub x: u8,
	pub y: u8,
}

impl Coord {
	#[must_use]
	pub const fn new(x: u8, y: u8) -> Self {
		Self { x, y }
	}

	#[must_use]
	pub const fn in_bounds(self) -> bool {
		self.x < GRID_SIZE && self.y < GRID_SIZE
	}

	/// The cell `steps` away from this one along `orientation`.
	#[must_use]
	pub const fn step(self, orientation: Orientation, steps: u8) -> Self {
		match orientation {
			Orientation::Horizontal => Self::new(self.x.saturating_add(steps), self.y),
			Orientation::Vertical => Self::new(self.x, self.y.saturating_add(steps)),
		}
	}
}

impl fmt::Display for Coord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}{}", (b'A' + self.y) as char, self.x)
	}
}

#[derive(Default, Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub enum Orientation {
	#[default]
	Horizontal,
	Vertical,
}

impl Orientation {
	#[must_use]
	pub const fn toggled(self) -> Self {
		match self {
			Orientation::Horizontal => Orientation::Vertical,
			Orientation::Vertical => Orientation::Horizontal,
		}
	}

	#[must_use]
	pub const fn is_horizontal(self) -> bool {
		matches!(self, Orientation::Horizontal)
	}
}

impl From<bool> for Orientation {
	fn from(horizontal: bool) -> Self {
		if horizontal {
			Orientation::Horizontal
		} else {
			Orientation::Vertical
		}
	}
}

/// Outcome of a shot at one cell. Travels as `0`, `1` or `2`.
#[derive(Default, Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(into = "u8", try_from = "u8")]
pub enum Cell {
	#[default]
	Empty,
	Miss,
	Hit,
}

impl From<Cell> for u8 {
	fn from(c: Cell) -> Self {
		match c {
			Cell::Empty => 0,
			Cell::Miss => 1,
			Cell::Hit => 2,
		}
	}
}

impl TryFrom<u8> for Cell {
	type Error = String;

	fn try_from(v: u8) -> Result<Self, Self::Error> {
		match v {
			0 => Ok(Cell::Empty),
			1 => Ok(Cell::Miss),
			2 => Ok(Cell::Hit),
			v => Err(format!("{} is not a cell state", v)),
		}
	}
}

impl From<Cell> for char {
	fn from(c: Cell) -> Self {
		match c {
			Cell::Empty => ' ',
			Cell::Miss => '?',
			Cell::Hit => 'X',
		}
	}
}

impl Cell {
	#[must_use]
	pub const fn is_empty(self) -> bool {
		matches!(self, Cell::Empty)
	}
}

/// Every shot one side has fired, indexed `[row][column]`.
#[derive(Default, Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(transparent)]
pub struct Grid {
	rows: [[Cell; GRID_SIZE as usize]; GRID_SIZE as usize],
}

impl Grid {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn get(&self, at: Coord) -> Cell {
		if at.in_bounds() {
			self.rows[usize::from(at.y)][usize::from(at.x)]
		} else {
			Cell::Empty
		}
	}

	/// Records an outcome. Cells are write-once, so this refuses anything but
	/// an empty, in-bounds cell.
	pub fn mark(&mut self, at: Coord, outcome: Cell) -> bool {
		if !at.in_bounds() || outcome.is_empty() || !self.get(at).is_empty() {
			return false;
		}
		self.rows[usize::from(at.y)][usize::from(at.x)] = outcome;
		true
	}

	/// Whether `self` could follow `previous`: no tried cell was changed or
	/// cleared.
	#[must_use]
	pub fn extends(&self, previous: &Grid) -> bool {
		self.cells()
			.zip(previous.cells())
			.all(|((_, now), (_, before))| before.is_empty() || now == before)
	}

	/// Number of cells tried in `self` that were still empty in `previous`.
	#[must_use]
	pub fn added(&self, previous: &Grid) -> usize {
		self.cells()
			.zip(previous.cells())
			.filter(|((_, now), (_, before))| before.is_empty() && !now.is_empty())
			.count()
	}

	pub fn cells(&self) -> impl Iterator<Item = (Coord, Cell)> + '_ {
		self.rows.iter().enumerate().flat_map(|(y, row)| {
			row.iter()
				.enumerate()
				.map(move |(x, cell)| (Coord::new(x as u8, y as u8), *cell))
		})
	}

	pub fn hits(&self) -> impl Iterator<Item = Coord> + '_ {
		self.cells()
			.filter(|(_, cell)| *cell == Cell::Hit)
			.map(|(at, _)| at)
	}

	#[must_use]
	pub fn tried(&self) -> usize {
		self.cells().filter(|(_, cell)| !cell.is_empty()).count()
	}

	pub fn clear(&mut self) {
		*self = Self::default();
	}
}

/// Whether all `length` cells from `anchor` along `orientation` are on the board.
#[must_use]
pub fn fits(anchor: Coord, length: u8, orientation: Orientation) -> bool {
	if length == 0 || !anchor.in_bounds() {
		return false;
	}
	anchor.step(orientation, length - 1).in_bounds()
}

#[must_use]
pub fn derive_cells(anchor: Coord, length: u8, orientation: Orientation) -> Vec<Coord> {
	(0..length).map(|i| anchor.step(orientation, i)).collect()
}

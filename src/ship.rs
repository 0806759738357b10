use serde::{Deserialize, Serialize};

use crate::{
	board::{derive_cells, fits, Coord, Orientation},
	flow::GameError,
};

/// Ship lengths of a fleet, in placement order.
pub const FLEET_LENGTHS: [u8; 4] = [1, 2, 3, 4];

/// How a ship is described to the other player.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ShipRecord {
	pub length: u8,
	pub x: u8,
	pub y: u8,
	pub horizontal: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ship {
	length: u8,
	anchor: Coord,
	orientation: Orientation,
	cells: Vec<Coord>,
	hits: Vec<bool>,
	placed: bool,
	epoch: u32,
}

impl Ship {
	/// An unplaced ship parked on the placeholder cell.
	#[must_use]
	pub fn new(length: u8) -> Self {
		Self {
			length,
			anchor: Coord::default(),
			orientation: Orientation::default(),
			cells: Vec::new(),
			hits: vec![false; usize::from(length)],
			placed: false,
			epoch: 0,
		}
	}

	/// A ship rebuilt from the other player's description. Already placed.
	#[must_use]
	pub fn from_record(record: ShipRecord, epoch: u32) -> Self {
		let mut ship = Self::new(record.length);
		ship.anchor = Coord::new(record.x, record.y);
		ship.orientation = record.horizontal.into();
		ship.epoch = epoch;
		ship.place();
		ship
	}

	#[must_use]
	pub fn record(&self) -> ShipRecord {
		ShipRecord {
			length: self.length,
			x: self.anchor.x,
			y: self.anchor.y,
			horizontal: self.orientation.is_horizontal(),
		}
	}

	#[must_use]
	pub const fn length(&self) -> u8 {
		self.length
	}

	#[must_use]
	pub const fn anchor(&self) -> Coord {
		self.anchor
	}

	#[must_use]
	pub const fn orientation(&self) -> Orientation {
		self.orientation
	}

	#[must_use]
	pub const fn is_placed(&self) -> bool {
		self.placed
	}

	#[must_use]
	pub const fn epoch(&self) -> u32 {
		self.epoch
	}

	#[must_use]
	pub fn hits(&self) -> &[bool] {
		&self.hits
	}

	/// Frozen cells of a placed ship. Empty until placed.
	#[must_use]
	pub fn occupied(&self) -> &[Coord] {
		&self.cells
	}

	/// Cells the ship would cover at its current anchor and orientation.
	#[must_use]
	pub fn footprint(&self) -> Vec<Coord> {
		derive_cells(self.anchor, self.length, self.orientation)
	}

	#[must_use]
	pub fn fits(&self) -> bool {
		fits(self.anchor, self.length, self.orientation)
	}

	pub fn rotate(&mut self) {
		if !self.placed {
			self.orientation = self.orientation.toggled();
		}
	}

	pub fn move_to(&mut self, anchor: Coord) {
		if !self.placed {
			self.anchor = anchor;
		}
	}

	pub fn place(&mut self) {
		self.cells = self.footprint();
		self.placed = true;
	}

	/// Marks the hit flag for `at`. Returns whether `at` is one of our cells.
	pub fn hit_at(&mut self, at: Coord) -> bool {
		match self.cells.iter().position(|c| *c == at) {
			Some(i) => {
				self.hits[i] = true;
				true
			}
			None => false,
		}
	}

	#[must_use]
	pub fn is_destroyed(&self) -> bool {
		self.hits.iter().all(|h| *h)
	}

	/// Back to the placeholder: unplaced, unhit, horizontal.
	pub fn reset(&mut self) {
		*self = Self::new(self.length);
	}
}

/// Whether `candidate` shares a cell with any placed ship.
#[must_use]
pub fn overlaps(candidate: &[Coord], ships: &[Ship]) -> bool {
	ships
		.iter()
		.filter(|s| s.is_placed())
		.flat_map(Ship::occupied)
		.any(|c| candidate.contains(c))
}

/// Checks a fleet description from the other player: one ship of each length,
/// all on the board, none overlapping.
pub fn validate_fleet(records: &[ShipRecord; 4]) -> Result<(), GameError> {
	let mut lengths: Vec<u8> = records.iter().map(|r| r.length).collect();
	lengths.sort_unstable();
	if lengths != FLEET_LENGTHS {
		return Err(GameError::ProtocolViolation("fleet has the wrong ships"));
	}

	let mut checked: Vec<Ship> = Vec::with_capacity(records.len());
	for record in records {
		let ship = Ship::from_record(*record, 0);
		if !ship.fits() {
			return Err(GameError::ProtocolViolation("fleet ship off the board"));
		}
		if overlaps(ship.occupied(), &checked) {
			return Err(GameError::ProtocolViolation("fleet ships overlap"));
		}
		checked.push(ship);
	}
	Ok(())
}

/// Our own four ships, placed one at a time in length order.
#[derive(Clone, Debug)]
pub struct Fleet {
	ships: Vec<Ship>,
}

impl Default for Fleet {
	fn default() -> Self {
		Self {
			ships: FLEET_LENGTHS.iter().map(|&l| Ship::new(l)).collect(),
		}
	}
}

impl Fleet {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn ships(&self) -> &[Ship] {
		&self.ships
	}

	#[must_use]
	pub fn get(&self, index: usize) -> Option<&Ship> {
		self.ships.get(index)
	}

	pub fn get_mut(&mut self, index: usize) -> Option<&mut Ship> {
		self.ships.get_mut(index)
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.ships.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.ships.is_empty()
	}

	/// Whether the ship at `index` could be placed where it currently is.
	#[must_use]
	pub fn can_place(&self, index: usize) -> bool {
		match self.ships.get(index) {
			Some(ship) if !ship.is_placed() => {
				ship.fits() && !overlaps(&ship.footprint(), &self.ships)
			}
			_ => false,
		}
	}

	/// Places the ship at `index` if it fits and overlaps nothing.
	pub fn try_place(&mut self, index: usize) -> bool {
		if !self.can_place(index) {
			return false;
		}
		self.ships[index].place();
		true
	}

	#[must_use]
	pub fn all_placed(&self) -> bool {
		self.ships.iter().all(Ship::is_placed)
	}

	#[must_use]
	pub fn records(&self) -> [ShipRecord; 4] {
		let mut out = [Ship::new(0).record(); 4];
		for (slot, ship) in out.iter_mut().zip(&self.ships) {
			*slot = ship.record();
		}
		out
	}

	/// Applies every hit in `hits` to the ship covering that cell.
	pub fn apply_hits(&mut self, hits: impl Iterator<Item = Coord>) {
		for at in hits {
			for ship in &mut self.ships {
				if ship.hit_at(at) {
					break;
				}
			}
		}
	}

	#[must_use]
	pub fn all_destroyed(&self) -> bool {
		self.all_placed() && self.ships.iter().all(Ship::is_destroyed)
	}

	pub fn reset(&mut self) {
		self.ships.iter_mut().for_each(Ship::reset);
	}
}

/// Every fleet the other player has ever described to us. Ships from an
/// earlier game are retired by moving to a new epoch; they stay in the arena
/// but are skipped by everything that looks at the current game.
#[derive(Clone, Debug, Default)]
pub struct OpponentFleets {
	ships: Vec<Ship>,
	epoch: u32,
}

impl OpponentFleets {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub const fn epoch(&self) -> u32 {
		self.epoch
	}

	/// Adds the described ships to the current game.
	pub fn extend(&mut self, records: &[ShipRecord]) {
		let epoch = self.epoch;
		self.ships
			.extend(records.iter().map(|r| Ship::from_record(*r, epoch)));
	}

	pub fn retire(&mut self) {
		self.epoch = self.epoch.wrapping_add(1);
	}

	#[must_use]
	pub fn is_retired(&self, ship: &Ship) -> bool {
		ship.epoch() != self.epoch
	}

	pub fn active(&self) -> impl Iterator<Item = &Ship> + '_ {
		let epoch = self.epoch;
		self.ships.iter().filter(move |s| s.epoch() == epoch)
	}

	pub fn active_mut(&mut self) -> impl Iterator<Item = &mut Ship> + '_ {
		let epoch = self.epoch;
		self.ships.iter_mut().filter(move |s| s.epoch() == epoch)
	}

	/// Every ship ever received, retired ones included.
	#[must_use]
	pub fn all(&self) -> &[Ship] {
		&self.ships
	}

	/// Marks the active ship covering `at`. Returns whether one was hit.
	pub fn strike(&mut self, at: Coord) -> bool {
		self.active_mut().any(|ship| ship.hit_at(at))
	}

	/// Whether every ship considered is destroyed. An empty selection is never
	/// destroyed, so an opponent we know nothing about can't be beaten.
	#[must_use]
	pub fn all_destroyed(&self, include_retired: bool) -> bool {
		let mut considered = self
			.ships
			.iter()
			.filter(|s| include_retired || !self.is_retired(s))
			.peekable();
		considered.peek().is_some() && considered.all(Ship::is_destroyed)
	}
}

use log::{debug, info, warn};
use thiserror::Error;

use crate::{
	board::{Cell, Coord, Grid},
	net::{Msg, Role, Transport, TransportEvent},
	ship::{validate_fleet, Fleet, OpponentFleets, Ship, ShipRecord},
};

/// Player actions that were refused. None of them change any state.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
	#[error("that ship doesn't fit there")]
	InvalidPlacement,
	#[error("that cell was already attacked")]
	AttackOnAlreadyTriedCell,
	#[error("it's not your turn")]
	NotYourTurn,
	#[error("not possible right now")]
	OutOfOrder,
}

#[derive(Error, Debug)]
pub enum GameError {
	#[error("nobody is hosting a game there")]
	ConnectionRefused,
	#[error("the other player disconnected")]
	PeerDisconnected,
	#[error(transparent)]
	Rejected(#[from] Rejection),
	#[error("protocol violation: {0}")]
	ProtocolViolation(&'static str),
	#[error("network error: {0}")]
	Network(#[from] std::io::Error),
	#[error("malformed message: {0}")]
	Malformed(#[from] serde_cbor::Error),
	#[error("frame of {0} bytes is too large")]
	FrameTooLarge(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
	Won,
	Lost,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Phase {
	#[default]
	Disconnected,
	Connected,
	Placing,
	WaitingForOpponent,
	Battle,
	GameOver(Outcome),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoardSide {
	Own,
	Opponent,
}

/// Something the player did on one of the boards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
	Select { board: BoardSide, at: Coord },
	Hover { board: BoardSide, at: Coord },
	Rotate,
}

/// Status changes worth telling the player about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
	Connected(Role),
	ConnectionFailed(String),
	PeerIdentified(String),
	PlaceShip(u8),
	FleetPlaced,
	OpponentPlaced,
	BattleStarted { my_turn: bool },
	Fired { at: Coord, outcome: Cell, sunk: Option<u8> },
	Attacked { hits: usize, my_turn: bool },
	GameOver(Outcome),
	Disconnected,
	Rejected(Rejection),
	ProtocolViolation(&'static str),
}

/// Where the active ship would go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Preview {
	pub board: BoardSide,
	pub cells: Vec<Coord>,
	pub valid: bool,
}

/// Everything the view may draw, copied out after each change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
	pub phase: Phase,
	pub my_turn: bool,
	pub role: Option<Role>,
	pub name: String,
	pub peer: Option<String>,
	pub own: Vec<Ship>,
	pub preview: Option<Preview>,
	pub sunk: Vec<Ship>,
	pub attacks: Grid,
	pub received: Grid,
}

/// Receives state from the controller. The controller never asks it anything.
pub trait View {
	fn render(&mut self, snapshot: &Snapshot);
	fn notify(&mut self, notice: Notice);
}

#[derive(Clone, Debug, Default)]
struct Session {
	turn: bool,
	placed: bool,
	enemy_placed: bool,
	role: Option<Role>,
	peer: Option<String>,
	outcome: Option<Outcome>,
}

/// One player's side of a game.
pub struct GameController<T: Transport, V: View> {
	name: String,
	view: V,
	transport: Option<T>,
	phase: Phase,
	session: Session,
	fleet: Fleet,
	enemy: OpponentFleets,
	attacks: Grid,
	received: Grid,
	placing: Option<usize>,
	hover: Option<BoardSide>,
}

impl<T: Transport, V: View> GameController<T, V> {
	pub fn new(name: impl Into<String>, view: V) -> Self {
		Self {
			name: name.into(),
			view,
			transport: None,
			phase: Phase::Disconnected,
			session: Session::default(),
			fleet: Fleet::new(),
			enemy: OpponentFleets::new(),
			attacks: Grid::new(),
			received: Grid::new(),
			placing: None,
			hover: None,
		}
	}

	#[must_use]
	pub const fn phase(&self) -> Phase {
		self.phase
	}

	#[must_use]
	pub fn my_turn(&self) -> bool {
		self.phase == Phase::Battle && self.session.turn
	}

	#[must_use]
	pub const fn role(&self) -> Option<Role> {
		self.session.role
	}

	#[must_use]
	pub fn peer(&self) -> Option<&str> {
		self.session.peer.as_deref()
	}

	#[must_use]
	pub const fn outcome(&self) -> Option<Outcome> {
		self.session.outcome
	}

	#[must_use]
	pub const fn fleet(&self) -> &Fleet {
		&self.fleet
	}

	#[must_use]
	pub const fn enemy(&self) -> &OpponentFleets {
		&self.enemy
	}

	/// Our record of shots at the other player.
	#[must_use]
	pub const fn attacks(&self) -> &Grid {
		&self.attacks
	}

	/// The other player's record of shots at us.
	#[must_use]
	pub const fn received(&self) -> &Grid {
		&self.received
	}

	/// Index of the ship being placed, if any.
	#[must_use]
	pub const fn placing(&self) -> Option<usize> {
		self.placing
	}

	#[must_use]
	pub fn is_attached(&self) -> bool {
		self.transport.is_some()
	}

	#[must_use]
	pub const fn view(&self) -> &V {
		&self.view
	}

	pub fn view_mut(&mut self) -> &mut V {
		&mut self.view
	}

	/// Hands the controller a freshly opened transport. The game starts when the
	/// transport reports the connection.
	pub fn attach(&mut self, transport: T, role: Role) -> Result<(), GameError> {
		if self.transport.is_some() || self.phase != Phase::Disconnected {
			return Err(Rejection::OutOfOrder.into());
		}
		debug!("attached connection {} as {:?}", transport.id(), role);
		self.transport = Some(transport);
		self.session.role = Some(role);
		Ok(())
	}

	pub fn connection_failed(&mut self, error: &GameError) {
		warn!("could not connect: {}", error);
		self.view.notify(Notice::ConnectionFailed(error.to_string()));
		self.render();
	}

	pub fn handle(&mut self, event: TransportEvent) -> Result<(), GameError> {
		let current = self.transport.as_ref().map(Transport::id);
		if current != Some(event.conn()) {
			debug!("dropping stale event {:?}", event);
			return Ok(());
		}

		let result = match event {
			TransportEvent::Connected(_) => self.connected(),
			TransportEvent::Received(_, msg) => self.receive(msg),
			TransportEvent::Disconnected(_) => {
				info!("peer disconnected");
				self.reset();
				self.view.notify(Notice::Disconnected);
				self.render();
				Ok(())
			}
		};

		if let Err(GameError::ProtocolViolation(why)) = result {
			warn!("protocol violation: {}", why);
			self.reset();
			self.view.notify(Notice::ProtocolViolation(why));
			self.render();
		}
		result
	}

	pub fn intent(&mut self, intent: Intent) -> Result<(), GameError> {
		let result = match intent {
			Intent::Rotate => {
				self.rotate();
				Ok(())
			}
			Intent::Hover { board, at } => {
				self.hover(board, at);
				Ok(())
			}
			Intent::Select { board, at } => match (self.phase, board) {
				(Phase::Placing, BoardSide::Own) if self.placing.is_some() => self.place(at),
				(Phase::Battle, BoardSide::Opponent) => self.fire(at),
				(Phase::GameOver(_), BoardSide::Opponent) => Err(Rejection::OutOfOrder),
				_ => Ok(()),
			},
		};

		if let Err(rejection) = result {
			debug!("rejected {:?}: {}", intent, rejection);
			self.view.notify(Notice::Rejected(rejection));
			self.render();
			return Err(rejection.into());
		}
		Ok(())
	}

	/// The player asked to leave the game.
	pub fn disconnect(&mut self) {
		self.reset();
		self.view.notify(Notice::Disconnected);
		self.render();
	}

	#[must_use]
	pub fn snapshot(&self) -> Snapshot {
		let preview = match (self.placing, self.hover) {
			(Some(index), Some(board)) => self.fleet.get(index).map(|ship| Preview {
				board,
				cells: ship.footprint(),
				valid: board == BoardSide::Own && self.fleet.can_place(index),
			}),
			_ => None,
		};

		Snapshot {
			phase: self.phase,
			my_turn: self.my_turn(),
			role: self.session.role,
			name: self.name.clone(),
			peer: self.session.peer.clone(),
			own: self.fleet.ships().iter().filter(|s| s.is_placed()).cloned().collect(),
			preview,
			sunk: self.enemy.active().filter(|s| s.is_destroyed()).cloned().collect(),
			attacks: self.attacks.clone(),
			received: self.received.clone(),
		}
	}

	fn render(&mut self) {
		let snapshot = self.snapshot();
		self.view.render(&snapshot);
	}

	fn send(&mut self, msg: Msg) {
		if let Some(transport) = &mut self.transport {
			transport.send(msg);
		}
	}

	fn connected(&mut self) -> Result<(), GameError> {
		if self.phase != Phase::Disconnected {
			return Err(GameError::ProtocolViolation("connected twice"));
		}
		let role = self.session.role.unwrap_or(Role::Initiator);
		info!("connected as {:?}", role);
		self.phase = Phase::Connected;
		self.send(Msg::Identity(self.name.clone()));
		self.view.notify(Notice::Connected(role));
		self.start_placing();
		Ok(())
	}

	fn start_placing(&mut self) {
		self.placing = Some(0);
		self.phase = Phase::Placing;
		if let Some(ship) = self.fleet.get(0) {
			let length = ship.length();
			self.view.notify(Notice::PlaceShip(length));
		}
		self.render();
	}

	fn receive(&mut self, msg: Msg) -> Result<(), GameError> {
		match msg {
			Msg::Identity(label) => {
				self.identify(label);
				Ok(())
			}
			Msg::Fleet(records) => self.enemy_fleet(&records),
			Msg::Attacks(grid) => self.attacked(grid),
		}
	}

	fn identify(&mut self, mut label: String) {
		if label == self.name {
			label.push('2');
		}
		info!("playing against {}", label);
		self.session.peer = Some(label.clone());
		self.view.notify(Notice::PeerIdentified(label));
		self.render();
	}

	fn enemy_fleet(&mut self, records: &[ShipRecord; 4]) -> Result<(), GameError> {
		match self.phase {
			Phase::Placing | Phase::WaitingForOpponent => {}
			_ => return Err(GameError::ProtocolViolation("fleet outside placement")),
		}
		if self.session.enemy_placed {
			return Err(GameError::ProtocolViolation("fleet sent twice"));
		}
		validate_fleet(records)?;

		self.enemy.extend(records);
		self.session.enemy_placed = true;
		self.view.notify(Notice::OpponentPlaced);

		if self.session.placed {
			self.start_battle();
		} else {
			self.render();
		}
		Ok(())
	}

	fn attacked(&mut self, grid: Grid) -> Result<(), GameError> {
		match self.phase {
			Phase::Battle if !self.session.turn => {}
			Phase::GameOver(_) => {
				warn!("ignoring attack after the game ended");
				return Ok(());
			}
			Phase::Battle => return Err(GameError::ProtocolViolation("attack out of turn")),
			_ => return Err(GameError::ProtocolViolation("attack outside battle")),
		}
		if !grid.extends(&self.received) {
			return Err(GameError::ProtocolViolation("attack record rewrites history"));
		}
		if grid.added(&self.received) != 1 {
			return Err(GameError::ProtocolViolation("attack record must add one shot"));
		}

		self.received = grid;
		self.fleet.apply_hits(self.received.hits());
		self.session.turn = true;

		let hits = self.received.hits().count();
		self.view.notify(Notice::Attacked {
			hits,
			my_turn: true,
		});
		self.check_game_over();
		self.render();
		Ok(())
	}

	fn start_battle(&mut self) {
		self.session.turn = self.session.role == Some(Role::Listener);
		self.phase = Phase::Battle;
		info!("battle started, our turn: {}", self.session.turn);
		self.view.notify(Notice::BattleStarted {
			my_turn: self.session.turn,
		});
		self.render();
	}

	fn rotate(&mut self) {
		if let Some(ship) = self.placing.and_then(|i| self.fleet.get_mut(i)) {
			ship.rotate();
			self.render();
		}
	}

	fn hover(&mut self, board: BoardSide, at: Coord) {
		if let Some(ship) = self.placing.and_then(|i| self.fleet.get_mut(i)) {
			ship.move_to(at);
			self.hover = Some(board);
			self.render();
		}
	}

	fn place(&mut self, at: Coord) -> Result<(), Rejection> {
		let index = self.placing.ok_or(Rejection::OutOfOrder)?;
		if let Some(ship) = self.fleet.get_mut(index) {
			ship.move_to(at);
		}
		self.hover = Some(BoardSide::Own);
		if !self.fleet.try_place(index) {
			return Err(Rejection::InvalidPlacement);
		}
		debug!("placed ship {} at {}", index + 1, at);

		let next = index + 1;
		if let Some(ship) = self.fleet.get_mut(next) {
			ship.move_to(at);
			let length = ship.length();
			self.placing = Some(next);
			self.view.notify(Notice::PlaceShip(length));
			self.render();
		} else {
			self.all_placed();
		}
		Ok(())
	}

	fn all_placed(&mut self) {
		self.placing = None;
		self.hover = None;
		self.session.placed = true;
		let records = self.fleet.records();
		self.send(Msg::Fleet(records));
		self.view.notify(Notice::FleetPlaced);

		if self.session.enemy_placed {
			self.start_battle();
		} else {
			self.phase = Phase::WaitingForOpponent;
			self.render();
		}
	}

	fn fire(&mut self, at: Coord) -> Result<(), Rejection> {
		if !self.session.turn {
			return Err(Rejection::NotYourTurn);
		}
		if !at.in_bounds() || !self.attacks.get(at).is_empty() {
			return Err(Rejection::AttackOnAlreadyTriedCell);
		}

		let outcome = if self.enemy.strike(at) {
			Cell::Hit
		} else {
			Cell::Miss
		};
		self.attacks.mark(at, outcome);
		let sunk = self
			.enemy
			.active()
			.find(|s| s.occupied().contains(&at))
			.filter(|s| s.is_destroyed())
			.map(Ship::length);
		debug!("fired at {}: {:?}", at, outcome);

		self.send(Msg::Attacks(self.attacks.clone()));
		self.session.turn = false;
		self.view.notify(Notice::Fired { at, outcome, sunk });
		self.check_game_over();
		self.render();
		Ok(())
	}

	fn check_game_over(&mut self) {
		if self.session.outcome.is_some() {
			return;
		}
		let outcome = if self.fleet.all_destroyed() {
			Outcome::Lost
		} else if self.enemy.all_destroyed(false) {
			Outcome::Won
		} else {
			return;
		};
		info!("game over: {:?}", outcome);
		self.session.outcome = Some(outcome);
		self.phase = Phase::GameOver(outcome);
		self.view.notify(Notice::GameOver(outcome));
	}

	/// Back to the start. The transport is closed and dropped, ships from the
	/// other player's game are retired and ours go back to the placeholder.
	fn reset(&mut self) {
		if let Some(mut transport) = self.transport.take() {
			transport.close();
		}
		self.enemy.retire();
		self.fleet.reset();
		self.attacks.clear();
		self.received.clear();
		self.session = Session::default();
		self.placing = None;
		self.hover = None;
		self.phase = Phase::Disconnected;
		info!("game reset");
	}
}

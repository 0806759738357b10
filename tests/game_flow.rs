//! Two controllers playing each other over an in-memory wire.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use fleetduel::{
	net::ConnId, ship::ShipRecord, ui, BoardSide, Cell, Coord, GameController, GameError, Grid,
	Intent, Msg, Notice, Outcome, Phase, Rejection, Role, Snapshot, Transport, TransportEvent,
	View, GRID_SIZE,
};

#[derive(Default)]
struct Wire {
	queue: VecDeque<Msg>,
	closed: bool,
}

struct MemTransport {
	id: ConnId,
	wire: Rc<RefCell<Wire>>,
}

impl Transport for MemTransport {
	fn id(&self) -> ConnId {
		self.id
	}

	fn send(&mut self, msg: Msg) {
		let mut wire = self.wire.borrow_mut();
		if !wire.closed {
			wire.queue.push_back(msg);
		}
	}

	fn close(&mut self) {
		self.wire.borrow_mut().closed = true;
	}
}

#[derive(Default)]
struct Screen {
	notices: Vec<Notice>,
	last: Option<Snapshot>,
}

impl View for Screen {
	fn render(&mut self, snapshot: &Snapshot) {
		self.last = Some(snapshot.clone());
	}

	fn notify(&mut self, notice: Notice) {
		self.notices.push(notice);
	}
}

type Side = GameController<MemTransport, Screen>;

/// A listener and an initiator joined by two one-way wires.
struct Table {
	host: Side,
	guest: Side,
	host_out: Rc<RefCell<Wire>>,
	guest_out: Rc<RefCell<Wire>>,
	conn: ConnId,
}

impl Table {
	fn new() -> Self {
		let mut table = Table {
			host: GameController::new("host", Screen::default()),
			guest: GameController::new("guest", Screen::default()),
			host_out: Rc::default(),
			guest_out: Rc::default(),
			conn: 0,
		};
		table.connect();
		table
	}

	/// Opens fresh transports on both sides and reports the connection.
	fn connect(&mut self) {
		self.conn += 1;
		self.host_out = Rc::default();
		self.guest_out = Rc::default();
		self.host
			.attach(
				MemTransport {
					id: self.conn,
					wire: self.host_out.clone(),
				},
				Role::Listener,
			)
			.unwrap();
		self.guest
			.attach(
				MemTransport {
					id: self.conn,
					wire: self.guest_out.clone(),
				},
				Role::Initiator,
			)
			.unwrap();
		self.host.handle(TransportEvent::Connected(self.conn)).unwrap();
		self.guest.handle(TransportEvent::Connected(self.conn)).unwrap();
		self.pump();
	}

	/// Delivers queued messages until both wires are quiet.
	fn pump(&mut self) {
		loop {
			let to_guest = self.host_out.borrow_mut().queue.pop_front();
			let to_host = self.guest_out.borrow_mut().queue.pop_front();
			if to_guest.is_none() && to_host.is_none() {
				break;
			}
			if let Some(msg) = to_guest {
				self.guest
					.handle(TransportEvent::Received(self.conn, msg))
					.unwrap();
			}
			if let Some(msg) = to_host {
				self.host
					.handle(TransportEvent::Received(self.conn, msg))
					.unwrap();
			}
		}
	}
}

fn place(side: &mut Side, x: u8, y: u8) -> Result<(), GameError> {
	side.intent(Intent::Select {
		board: BoardSide::Own,
		at: Coord::new(x, y),
	})
}

fn fire(side: &mut Side, x: u8, y: u8) -> Result<(), GameError> {
	side.intent(Intent::Select {
		board: BoardSide::Opponent,
		at: Coord::new(x, y),
	})
}

/// Ship n at column 0 of row n-1, all horizontal.
fn place_ladder(side: &mut Side) {
	for y in 0..4 {
		place(side, 0, y).unwrap();
	}
}

/// Every cell of the ladder layout, in firing order.
fn ladder_cells() -> Vec<(u8, u8)> {
	(0..4u8).flat_map(|y| (0..=y).map(move |x| (x, y))).collect()
}

fn ready_table() -> Table {
	let mut table = Table::new();
	place_ladder(&mut table.host);
	place_ladder(&mut table.guest);
	table.pump();
	table
}

#[test]
fn both_sides_reach_battle_with_listener_first() {
	let table = ready_table();
	assert_eq!(table.host.phase(), Phase::Battle);
	assert_eq!(table.guest.phase(), Phase::Battle);
	assert!(table.host.my_turn());
	assert!(!table.guest.my_turn());
	assert_eq!(table.host.peer(), Some("guest"));
	assert_eq!(table.guest.peer(), Some("host"));
	assert_eq!(table.guest.enemy().active().count(), 4);
}

#[test]
fn opponent_fleet_can_arrive_before_ours_is_done() {
	let mut table = Table::new();
	place_ladder(&mut table.guest);
	table.pump();
	assert_eq!(table.guest.phase(), Phase::WaitingForOpponent);
	assert_eq!(table.host.phase(), Phase::Placing);
	assert_eq!(table.host.enemy().active().count(), 4);

	place(&mut table.host, 0, 0).unwrap();
	assert_eq!(table.host.phase(), Phase::Placing);
	for y in 1..4 {
		place(&mut table.host, 0, y).unwrap();
	}
	assert_eq!(table.host.phase(), Phase::Battle);
	table.pump();
	assert_eq!(table.guest.phase(), Phase::Battle);
	assert!(table.host.my_turn());
}

#[test]
fn a_hit_reaches_the_defender() {
	let mut table = ready_table();
	fire(&mut table.host, 0, 0).unwrap();
	assert_eq!(table.host.attacks().get(Coord::new(0, 0)), Cell::Hit);
	assert!(!table.host.my_turn());
	table.pump();

	let ship = table.guest.fleet().get(0).unwrap();
	assert_eq!(ship.hits(), &[true]);
	assert!(ship.is_destroyed());
	assert!(table.guest.my_turn());
	assert_eq!(table.guest.received().get(Coord::new(0, 0)), Cell::Hit);
	assert_eq!(table.host.outcome(), None);
	assert_eq!(table.guest.outcome(), None);
	assert!(table.host.view().notices.contains(&Notice::Fired {
		at: Coord::new(0, 0),
		outcome: Cell::Hit,
		sunk: Some(1),
	}));
}

#[test]
fn a_miss_is_recorded_as_miss() {
	let mut table = ready_table();
	fire(&mut table.host, 9, 9).unwrap();
	assert_eq!(table.host.attacks().get(Coord::new(9, 9)), Cell::Miss);
	table.pump();
	assert_eq!(table.guest.received().get(Coord::new(9, 9)), Cell::Miss);
	assert!(table.guest.fleet().ships().iter().all(|s| s.hits().iter().all(|h| !h)));
}

#[test]
fn repeated_attack_on_a_cell_is_ignored() {
	let mut table = ready_table();
	fire(&mut table.host, 0, 0).unwrap();
	table.pump();
	fire(&mut table.guest, 5, 5).unwrap();
	table.pump();
	assert!(table.host.my_turn());

	let before = table.host.attacks().clone();
	let err = fire(&mut table.host, 0, 0).unwrap_err();
	assert!(matches!(
		err,
		GameError::Rejected(Rejection::AttackOnAlreadyTriedCell)
	));
	assert_eq!(table.host.attacks(), &before);
	assert!(table.host.my_turn());
	assert!(table.host_out.borrow().queue.is_empty());
}

#[test]
fn turns_strictly_alternate() {
	let mut table = ready_table();
	assert!(matches!(
		fire(&mut table.guest, 0, 0),
		Err(GameError::Rejected(Rejection::NotYourTurn))
	));
	fire(&mut table.host, 1, 1).unwrap();
	assert!(matches!(
		fire(&mut table.host, 2, 2),
		Err(GameError::Rejected(Rejection::NotYourTurn))
	));
	assert_eq!(table.host_out.borrow().queue.len(), 1);
	table.pump();
	fire(&mut table.guest, 3, 3).unwrap();
	table.pump();
	fire(&mut table.host, 2, 2).unwrap();
}

#[test]
fn sinking_everything_wins_and_loses() {
	let mut table = ready_table();
	let targets = ladder_cells();
	let mut misses = (0..GRID_SIZE).flat_map(|x| (5..GRID_SIZE).map(move |y| (x, y)));

	for (i, (x, y)) in targets.iter().enumerate() {
		fire(&mut table.host, *x, *y).unwrap();
		table.pump();
		if i + 1 < targets.len() {
			assert_eq!(table.guest.outcome(), None);
			let (mx, my) = misses.next().unwrap();
			fire(&mut table.guest, mx, my).unwrap();
			table.pump();
		}
	}

	assert_eq!(table.host.phase(), Phase::GameOver(Outcome::Won));
	assert_eq!(table.guest.phase(), Phase::GameOver(Outcome::Lost));
	assert!(table.guest.fleet().all_destroyed());
	assert!(table.host.enemy().all_destroyed(false));

	let lost = table
		.guest
		.view()
		.notices
		.iter()
		.filter(|n| matches!(n, Notice::GameOver(_)))
		.count();
	assert_eq!(lost, 1);
	assert!(matches!(
		fire(&mut table.host, 9, 9),
		Err(GameError::Rejected(Rejection::OutOfOrder))
	));
}

#[test]
fn peer_disconnect_mid_battle_resets() {
	let mut table = ready_table();
	fire(&mut table.host, 0, 0).unwrap();
	table.pump();

	table
		.guest
		.handle(TransportEvent::Disconnected(table.conn))
		.unwrap();
	let guest = &table.guest;
	assert_eq!(guest.phase(), Phase::Disconnected);
	assert!(!guest.is_attached());
	assert!(table.guest_out.borrow().closed);
	assert!(guest.fleet().ships().iter().all(|s| !s.is_placed()));
	assert!(guest.fleet().ships().iter().all(|s| s.hits().iter().all(|h| !h)));
	assert_eq!(guest.enemy().active().count(), 0);
	assert_eq!(guest.enemy().all().len(), 4);
	assert_eq!(guest.received(), &Grid::new());
	assert_eq!(guest.attacks(), &Grid::new());
	assert_eq!(guest.placing(), None);
	assert!(guest.view().notices.contains(&Notice::Disconnected));
}

#[test]
fn a_new_game_ignores_retired_ships() {
	let mut table = ready_table();
	table.host.disconnect();
	table.guest.disconnect();
	table.connect();

	place_ladder(&mut table.host);
	for y in 5..9 {
		place(&mut table.guest, 5, y).unwrap();
	}
	table.pump();
	assert_eq!(table.host.phase(), Phase::Battle);
	assert_eq!(table.host.enemy().all().len(), 8);
	assert_eq!(table.host.enemy().active().count(), 4);

	// (0,0) held a ship last game only.
	fire(&mut table.host, 0, 0).unwrap();
	assert_eq!(table.host.attacks().get(Coord::new(0, 0)), Cell::Miss);
	table.pump();
	fire(&mut table.guest, 9, 9).unwrap();
	table.pump();
	fire(&mut table.host, 5, 5).unwrap();
	assert_eq!(table.host.attacks().get(Coord::new(5, 5)), Cell::Hit);
	assert!(table.host.enemy().all().iter().take(4).all(|s| !s.is_destroyed()));
}

#[test]
fn events_from_an_old_connection_are_ignored() {
	let mut table = ready_table();
	let old = table.conn;
	table.host.disconnect();
	table.guest.disconnect();
	table.connect();

	table.host.handle(TransportEvent::Disconnected(old)).unwrap();
	table
		.host
		.handle(TransportEvent::Received(old, Msg::Attacks(Grid::new())))
		.unwrap();
	assert_eq!(table.host.phase(), Phase::Placing);
	assert!(table.host.is_attached());
}

#[test]
fn malformed_fleet_resets_the_receiver() {
	let mut table = Table::new();
	let bad = [
		ShipRecord {
			length: 1,
			x: 0,
			y: 0,
			horizontal: true,
		},
		ShipRecord {
			length: 2,
			x: 0,
			y: 0,
			horizontal: false,
		},
		ShipRecord {
			length: 3,
			x: 0,
			y: 5,
			horizontal: true,
		},
		ShipRecord {
			length: 4,
			x: 0,
			y: 6,
			horizontal: true,
		},
	];
	let result = table
		.host
		.handle(TransportEvent::Received(table.conn, Msg::Fleet(bad)));
	assert!(matches!(result, Err(GameError::ProtocolViolation(_))));
	assert_eq!(table.host.phase(), Phase::Disconnected);
	assert!(table.host_out.borrow().closed);
	assert_eq!(table.host.enemy().active().count(), 0);
}

#[test]
fn attack_record_that_rewrites_history_is_a_violation() {
	let mut table = ready_table();
	fire(&mut table.host, 0, 0).unwrap();
	table.pump();
	fire(&mut table.guest, 9, 9).unwrap();
	table.pump();
	fire(&mut table.host, 1, 1).unwrap();
	// Drop the honest record and send one that forgets the first shot.
	table.host_out.borrow_mut().queue.clear();

	let mut forged = Grid::new();
	forged.mark(Coord::new(1, 1), Cell::Hit);
	let result = table
		.guest
		.handle(TransportEvent::Received(table.conn, Msg::Attacks(forged)));
	assert!(matches!(result, Err(GameError::ProtocolViolation(_))));
	assert_eq!(table.guest.phase(), Phase::Disconnected);
}

#[test]
fn an_attack_record_without_a_new_shot_is_a_violation() {
	let mut table = ready_table();
	let result = table
		.guest
		.handle(TransportEvent::Received(table.conn, Msg::Attacks(Grid::new())));
	assert!(matches!(result, Err(GameError::ProtocolViolation(_))));
	assert_eq!(table.guest.phase(), Phase::Disconnected);
	assert!(!table.guest.my_turn());
}

#[test]
fn an_attack_record_with_several_new_shots_is_a_violation() {
	let mut table = ready_table();
	let mut volley = Grid::new();
	for x in 0..4 {
		volley.mark(Coord::new(x, 3), Cell::Hit);
	}
	let result = table
		.guest
		.handle(TransportEvent::Received(table.conn, Msg::Attacks(volley)));
	assert!(matches!(result, Err(GameError::ProtocolViolation(_))));
	assert_eq!(table.guest.phase(), Phase::Disconnected);
	assert!(!table
		.guest
		.view()
		.notices
		.iter()
		.any(|n| matches!(n, Notice::GameOver(_) | Notice::Attacked { .. })));
}

#[test]
fn placed_fleets_are_disjoint_and_on_the_board() {
	for vertical in [false, true] {
		let mut table = Table::new();
		let side = &mut table.host;
		while let Some(index) = side.placing() {
			if vertical {
				side.intent(Intent::Rotate).unwrap();
			}
			let mut placed = false;
			'search: for y in 0..GRID_SIZE {
				for x in 0..GRID_SIZE {
					if place(side, x, y).is_ok() {
						placed = true;
						break 'search;
					}
					assert_eq!(side.placing(), Some(index));
				}
			}
			assert!(placed);
		}

		let mut seen = HashSet::new();
		for ship in side.fleet().ships() {
			assert!(ship.is_placed());
			assert_eq!(ship.occupied().len(), usize::from(ship.length()));
			for cell in ship.occupied() {
				assert!(cell.in_bounds());
				assert!(seen.insert(*cell));
			}
		}
		assert_eq!(side.phase(), Phase::WaitingForOpponent);
	}
}

#[test]
fn placed_ships_ignore_rotation() {
	let mut table = Table::new();
	place(&mut table.host, 3, 3).unwrap();
	let before = table.host.fleet().get(0).unwrap().clone();
	table.host.intent(Intent::Rotate).unwrap();
	assert_eq!(table.host.fleet().get(0).unwrap(), &before);
	assert_eq!(
		table.host.fleet().get(1).unwrap().orientation(),
		fleetduel::Orientation::Vertical
	);
}

#[test]
fn the_board_shows_ships_and_shots() {
	let mut table = ready_table();
	fire(&mut table.host, 0, 0).unwrap();
	table.pump();

	let host = ui::render(table.host.view().last.as_ref().unwrap());
	let guest = ui::render(table.guest.view().last.as_ref().unwrap());
	assert!(host.starts_with(" |YOU       |GUEST     |"));
	// The sunk one-cell ship shows its length on the attacker's right board.
	assert!(host.contains("A|1         |1         |"));
	assert!(guest.contains("A|X         |          |"));
	assert!(guest.contains("D|4444      |          |"));
	assert!(guest.ends_with("Choose a tile in the rightmost grid to attack."));
}

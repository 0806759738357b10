use crate::{
	board::{Cell, Coord, GRID_SIZE},
	flow::{BoardSide, Notice, Outcome, Phase, Snapshot},
	net::Role,
	ship::Ship,
};

/// Parses coordinates like `E5`: the letter picks the row, the digit the column.
#[must_use]
pub fn parse_coord(c: &str) -> Option<Coord> {
	if let [y, x] = &c.trim().chars().take(3).collect::<Vec<_>>()[..] {
		let y = y.to_ascii_uppercase();
		if !('A'..='J').contains(&y) || !('0'..='9').contains(x) {
			return None;
		}
		let y = y as u8 - b'A';
		let x = *x as u8 - b'0';
		Some(Coord::new(x, y))
	} else {
		None
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
	Host(Option<u16>),
	Join(String, Option<u16>),
	Disconnect,
	Place(Coord),
	Look(Coord),
	Rotate,
	Fire(Coord),
	Board,
	Help,
	Quit,
}

#[must_use]
pub fn parse_command(line: &str) -> Option<Command> {
	let mut words = line.split_whitespace();
	let verb = words.next()?.to_lowercase();
	let arg = words.next();
	let extra = words.next();
	let coord = || arg.and_then(parse_coord);
	let port = |p: Option<&str>| p.map(str::parse::<u16>);

	match verb.as_str() {
		"host" | "serve" => match port(arg) {
			None => Some(Command::Host(None)),
			Some(Ok(p)) => Some(Command::Host(Some(p))),
			Some(Err(_)) => None,
		},
		"join" | "connect" => {
			let host = arg?.to_string();
			match port(extra) {
				None => Some(Command::Join(host, None)),
				Some(Ok(p)) => Some(Command::Join(host, Some(p))),
				Some(Err(_)) => None,
			}
		}
		"disconnect" | "leave" => Some(Command::Disconnect),
		"place" | "p" => coord().map(Command::Place),
		"look" | "l" => coord().map(Command::Look),
		"rotate" | "r" => Some(Command::Rotate),
		"fire" | "f" => coord().map(Command::Fire),
		"board" | "b" => Some(Command::Board),
		"help" | "h" | "?" => Some(Command::Help),
		"quit" | "exit" | "q" => Some(Command::Quit),
		_ => None,
	}
}

pub const HELP: &str = "\
Commands:
  host [port]         host a game and wait for the other player
  join <host> [port]  join a hosted game
  disconnect          leave the current game
  place E5  (p)       place the current ship with its top-left cell at E5
  look E5   (l)       preview the current ship at E5
  rotate    (r)       turn the current ship
  fire E5   (f)       attack E5 on the enemy board
  board     (b)       show the boards
  quit      (q)       exit";

fn ship_at(ships: &[Ship], at: Coord) -> Option<&Ship> {
	ships.iter().find(|s| s.occupied().contains(&at))
}

fn own_cell(snapshot: &Snapshot, at: Coord) -> char {
	if let Some(preview) = snapshot
		.preview
		.as_ref()
		.filter(|p| p.board == BoardSide::Own && p.cells.contains(&at))
	{
		return if preview.valid { '+' } else { '!' };
	}
	match (snapshot.received.get(at), ship_at(&snapshot.own, at)) {
		(Cell::Hit, _) => 'X',
		(Cell::Miss, _) => '?',
		(Cell::Empty, Some(ship)) => (b'0' + ship.length()) as char,
		(Cell::Empty, None) => ' ',
	}
}

fn enemy_cell(snapshot: &Snapshot, at: Coord) -> char {
	if snapshot
		.preview
		.as_ref()
		.map_or(false, |p| p.board == BoardSide::Opponent && p.cells.contains(&at))
	{
		return '!';
	}
	match (snapshot.attacks.get(at), ship_at(&snapshot.sunk, at)) {
		(Cell::Hit, Some(ship)) => (b'0' + ship.length()) as char,
		(cell, _) => cell.into(),
	}
}

fn label(text: &str) -> String {
	let mut out: String = text.chars().take(GRID_SIZE as usize).collect();
	while out.chars().count() < GRID_SIZE as usize {
		out.push(' ');
	}
	out
}

/// Both boards side by side: ours on the left, theirs on the right.
#[must_use]
pub fn render(snapshot: &Snapshot) -> String {
	let them = snapshot.peer.as_deref().unwrap_or("ENEMY").to_uppercase();
	let mut out = String::new();
	out += &format!(" |{}|{}|\n", label("YOU"), label(&them));
	out += " |0123456789|0123456789|\n";
	for row in 0..GRID_SIZE {
		out.push((b'A' + row) as char);
		out += "|";
		let mut left = String::new();
		let mut right = String::new();
		for col in 0..GRID_SIZE {
			let at = Coord::new(col, row);
			left.push(own_cell(snapshot, at));
			right.push(enemy_cell(snapshot, at));
		}
		out.push_str(&left);
		out += "|";
		out.push_str(&right);
		out += "|\n";
	}
	out += &status(snapshot);
	out
}

/// One line telling the player what to do next.
#[must_use]
pub fn status(snapshot: &Snapshot) -> String {
	match snapshot.phase {
		Phase::Disconnected if snapshot.role == Some(Role::Listener) => {
			"Waiting for a connection.".to_string()
		}
		Phase::Disconnected => "Host a game or join a game to start.".to_string(),
		Phase::Connected | Phase::Placing => {
			"Place your boats in the left grid.".to_string()
		}
		Phase::WaitingForOpponent => {
			"All placed. Waiting for your opponent to place their ships.".to_string()
		}
		Phase::Battle if snapshot.my_turn => {
			"Choose a tile in the rightmost grid to attack.".to_string()
		}
		Phase::Battle => "Waiting for your opponent to take their turn.".to_string(),
		Phase::GameOver(Outcome::Won) => "GAME WON! Disconnect to play again.".to_string(),
		Phase::GameOver(Outcome::Lost) => "GAME LOST... Disconnect to play again.".to_string(),
	}
}

#[must_use]
pub fn describe(notice: &Notice) -> String {
	match notice {
		Notice::Connected(Role::Listener) => "Someone joined your game.".to_string(),
		Notice::Connected(Role::Initiator) => "Connected.".to_string(),
		Notice::ConnectionFailed(why) => format!(
			"Error connecting: {}. Ensure the other player is hosting and check the address and port.",
			why
		),
		Notice::PeerIdentified(name) => format!("You are playing against {}.", name),
		Notice::PlaceShip(length) => format!("Place your ship of length {}.", length),
		Notice::FleetPlaced => "Fleet placed.".to_string(),
		Notice::OpponentPlaced => "Your opponent has placed their ships.".to_string(),
		Notice::BattleStarted { my_turn: true } => "The battle begins. You go first!".to_string(),
		Notice::BattleStarted { my_turn: false } => {
			"The battle begins. Your opponent goes first.".to_string()
		}
		Notice::Fired {
			at,
			outcome: Cell::Hit,
			sunk: Some(length),
		} => format!("Hit at {}! You sunk the enemy ship of length {}!", at, length),
		Notice::Fired {
			at,
			outcome: Cell::Hit,
			..
		} => format!("Hit at {}!", at),
		Notice::Fired { at, .. } => format!("Miss at {}...", at),
		Notice::Attacked { hits, .. } => {
			format!("The enemy fired. They have hit you {} times. Your turn!", hits)
		}
		Notice::GameOver(Outcome::Won) => "GAME WON!".to_string(),
		Notice::GameOver(Outcome::Lost) => "GAME LOST...".to_string(),
		Notice::Disconnected => "Disconnected.".to_string(),
		Notice::Rejected(why) => format!("Can't do that: {}.", why),
		Notice::ProtocolViolation(why) => {
			format!("The other game sent something unexpected ({}), disconnected.", why)
		}
	}
}

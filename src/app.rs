//! The event loop tying a [`GameController`] to real sockets.
//!
//! Transport events and player commands arrive on two channels and are handled
//! one at a time on a single task, so the controller never sees two events at
//! once.

use log::{debug, warn};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::{
	config::Settings,
	flow::{BoardSide, GameController, GameError, Intent, View},
	net::{ConnId, Role, TcpTransport, TransportEvent},
	ui::{self, Command},
};

/// Extra things a front-end can show that don't come from the game itself.
pub trait Console: View {
	fn show_board(&mut self);
	fn show_help(&mut self);
	fn say(&mut self, text: &str);
}

pub struct App<V: Console> {
	settings: Settings,
	game: GameController<TcpTransport, V>,
	events_tx: UnboundedSender<TransportEvent>,
	events: UnboundedReceiver<TransportEvent>,
	next_conn: ConnId,
}

impl<V: Console> App<V> {
	pub fn new(settings: Settings, view: V) -> Self {
		let (events_tx, events) = unbounded_channel();
		Self {
			game: GameController::new(settings.name.clone(), view),
			settings,
			events_tx,
			events,
			next_conn: 0,
		}
	}

	#[must_use]
	pub const fn game(&self) -> &GameController<TcpTransport, V> {
		&self.game
	}

	/// Runs until the player quits or the command channel closes.
	pub async fn run(mut self, mut commands: UnboundedReceiver<Command>) {
		loop {
			tokio::select! {
				Some(event) = self.events.recv() => {
					if let Err(e) = self.game.handle(event) {
						warn!("{}", e);
					}
				}
				command = commands.recv() => match command {
					Some(command) => {
						if !self.dispatch(command).await {
							break;
						}
					}
					None => break,
				},
			}
		}
		self.game.disconnect();
	}

	/// Handles one command. Returns `false` when it's time to stop.
	pub async fn dispatch(&mut self, command: Command) -> bool {
		debug!("command {:?}", command);
		let result = match command {
			Command::Host(port) => self.host(port).await,
			Command::Join(host, port) => self.join(&host, port).await,
			Command::Disconnect => {
				self.game.disconnect();
				Ok(())
			}
			Command::Place(at) => self.game.intent(Intent::Select {
				board: BoardSide::Own,
				at,
			}),
			Command::Look(at) => self.game.intent(Intent::Hover {
				board: BoardSide::Own,
				at,
			}),
			Command::Rotate => self.game.intent(Intent::Rotate),
			Command::Fire(at) => self.game.intent(Intent::Select {
				board: BoardSide::Opponent,
				at,
			}),
			Command::Board => {
				self.game.view_mut().show_board();
				Ok(())
			}
			Command::Help => {
				self.game.view_mut().show_help();
				Ok(())
			}
			Command::Quit => return false,
		};

		match result {
			// The view has already been told about refused moves.
			Ok(()) | Err(GameError::Rejected(_)) => {}
			Err(e) => {
				warn!("{}", e);
				self.game.view_mut().say(&e.to_string());
			}
		}
		true
	}

	fn conn_id(&mut self) -> ConnId {
		self.next_conn += 1;
		self.next_conn
	}

	async fn host(&mut self, port: Option<u16>) -> Result<(), GameError> {
		if self.game.is_attached() {
			self.game.view_mut().say("Disconnect first.");
			return Ok(());
		}
		let id = self.conn_id();
		let addr = self.settings.listen_addr(port);
		let transport = TcpTransport::listen(id, addr, self.events_tx.clone()).await?;
		let local = transport.local_addr();
		self.game.attach(transport, Role::Listener)?;
		self.game
			.view_mut()
			.say(&format!("Hosting on port {}. Waiting for a connection.", local.port()));
		Ok(())
	}

	async fn join(&mut self, host: &str, port: Option<u16>) -> Result<(), GameError> {
		if self.game.is_attached() {
			self.game.view_mut().say("Disconnect first.");
			return Ok(());
		}
		let id = self.conn_id();
		let port = port.unwrap_or(self.settings.port);
		match TcpTransport::connect(id, host, port, self.events_tx.clone()).await {
			Ok(transport) => self.game.attach(transport, Role::Initiator),
			Err(e) => {
				self.game.connection_failed(&e);
				Ok(())
			}
		}
	}
}

/// Reads lines from a blocking source on its own thread and forwards every
/// command it understands. Unknown lines get the help text. `open` runs on the
/// reader thread, so the line source itself needn't be `Send`.
pub fn spawn_reader<O, F>(open: O) -> UnboundedReceiver<Command>
where
	O: FnOnce() -> F + Send + 'static,
	F: FnMut() -> Option<String>,
{
	let (tx, rx) = unbounded_channel();
	std::thread::spawn(move || {
		let mut next_line = open();
		while let Some(line) = next_line() {
			if line.trim().is_empty() {
				continue;
			}
			let command = ui::parse_command(&line).unwrap_or(Command::Help);
			let quit = command == Command::Quit;
			if tx.send(command).is_err() || quit {
				return;
			}
		}
		let _ = tx.send(Command::Quit);
	});
	rx
}

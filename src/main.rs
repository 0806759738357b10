use fleetduel::{
	app::{spawn_reader, App, Console},
	config::Settings,
	ui,
	Notice, Snapshot, View,
};
use rustyline::{error::ReadlineError, Editor};
use structopt::StructOpt;

#[derive(StructOpt)]
struct Args {
	/// Host a game and wait for the other player.
	#[structopt(short, long)]
	pub serve: bool,
	/// Join the game hosted at this address.
	#[structopt(short, long, conflicts_with = "serve")]
	pub connect: Option<String>,
	/// Port both players use.
	#[structopt(short, long)]
	pub port: Option<u16>,
	/// Name shown to the other player.
	#[structopt(short, long)]
	pub name: Option<String>,
}

#[derive(Default)]
struct Terminal {
	last: Option<Snapshot>,
}

impl View for Terminal {
	fn render(&mut self, snapshot: &Snapshot) {
		if self.last.as_ref() != Some(snapshot) {
			println!("{}", ui::render(snapshot));
			self.last = Some(snapshot.clone());
		}
	}

	fn notify(&mut self, notice: Notice) {
		if let Notice::BattleStarted { my_turn: true } | Notice::Attacked { .. } = notice {
			print!("\x07");
		}
		println!("{}", ui::describe(&notice));
	}
}

impl Console for Terminal {
	fn show_board(&mut self) {
		match &self.last {
			Some(snapshot) => println!("{}", ui::render(snapshot)),
			None => println!("Host a game or join a game to start."),
		}
	}

	fn show_help(&mut self) {
		println!("{}", ui::HELP);
	}

	fn say(&mut self, text: &str) {
		println!("{}", text);
	}
}

#[tokio::main]
async fn main() {
	env_logger::init();
	let args = Args::from_args();

	let mut settings = Settings::from_env();
	if let Some(name) = args.name {
		settings.name = name;
	}
	if let Some(port) = args.port {
		settings.port = port;
	}

	let mut first = if args.serve {
		Some("host".to_string())
	} else {
		args.connect.map(|host| format!("join {}", host))
	};
	let commands = spawn_reader(move || {
		let mut rl = Editor::<()>::new().expect("Failed to open prompt");
		move || {
			if let Some(line) = first.take() {
				return Some(line);
			}
			match rl.readline("> ") {
				Ok(line) => {
					rl.add_history_entry(line.as_str());
					Some(line)
				}
				Err(ReadlineError::Interrupted | ReadlineError::Eof) => None,
				Err(e) => {
					eprintln!("Reading failed with {}", e);
					None
				}
			}
		}
	});

	println!("Battleship as {}. Type 'help' for commands.", settings.name);
	App::new(settings, Terminal::default())
		.run(commands)
		.await;

	// The prompt thread stays blocked on stdin; don't wait for it.
	std::process::exit(0);
}

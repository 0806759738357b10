//! Battleship for two players over a LAN.
//!
//! Each side places a fleet of four ships (lengths 1 to 4) on its own 10x10
//! board, tells the other side where they are, then the two take turns firing.
//! The attacker works out hits itself and sends its whole record of shots after
//! every turn.

pub mod app;
pub mod board;
pub mod config;
pub mod flow;
pub mod net;
pub mod ship;
pub mod ui;

pub use board::{Cell, Coord, Grid, Orientation, GRID_SIZE};
pub use flow::{
	BoardSide, GameController, GameError, Intent, Notice, Outcome, Phase, Rejection, Snapshot,
	View,
};
pub use net::{Msg, Role, TcpTransport, Transport, TransportEvent};

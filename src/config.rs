//! Player settings.
//!
//! Defaults can be overridden from the environment and then from the command
//! line:
//! - `FLEETDUEL_NAME`: name shown to the other player
//! - `FLEETDUEL_BIND`: address to host games on
//! - `FLEETDUEL_PORT`: port both players use

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Port both players use unless told otherwise.
pub const DEFAULT_PORT: u16 = 42069;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
	pub name: String,
	pub bind: IpAddr,
	pub port: u16,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			name: login_name(),
			bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
			port: DEFAULT_PORT,
		}
	}
}

impl Settings {
	pub fn from_env() -> Self {
		Self::from_lookup(|key| env::var(key).ok())
	}

	/// Builds settings from any key lookup. Values that are missing, blank or
	/// don't parse keep their defaults.
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
		let defaults = Self::default();
		let get = |key: &str| {
			lookup(key)
				.map(|v| v.trim().to_string())
				.filter(|v| !v.is_empty())
		};

		Self {
			name: get("FLEETDUEL_NAME").unwrap_or(defaults.name),
			bind: get("FLEETDUEL_BIND")
				.and_then(|v| v.parse().ok())
				.unwrap_or(defaults.bind),
			port: get("FLEETDUEL_PORT")
				.and_then(|v| v.parse().ok())
				.unwrap_or(defaults.port),
		}
	}

	/// Where to listen when hosting on `port`, or on the configured port.
	#[must_use]
	pub fn listen_addr(&self, port: Option<u16>) -> SocketAddr {
		SocketAddr::new(self.bind, port.unwrap_or(self.port))
	}
}

fn login_name() -> String {
	env::var("USER")
		.or_else(|_| env::var("USERNAME"))
		.ok()
		.filter(|v| !v.trim().is_empty())
		.unwrap_or_else(|| "player".to_string())
}

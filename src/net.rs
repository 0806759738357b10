use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::{board::Grid, flow::GameError, ship::ShipRecord};

/// Largest frame either side will accept.
pub const MAX_FRAME: usize = 64 * 1024;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Msg {
	Identity(String),
	Fleet([ShipRecord; 4]),
	Attacks(Grid),
}

/// Identifies one transport instance, so events from a closed connection can
/// be told apart from the current one.
pub type ConnId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
	Listener,
	Initiator,
}

#[derive(Debug)]
pub enum TransportEvent {
	Connected(ConnId),
	Received(ConnId, Msg),
	Disconnected(ConnId),
}

impl TransportEvent {
	#[must_use]
	pub const fn conn(&self) -> ConnId {
		match self {
			TransportEvent::Connected(id)
			| TransportEvent::Received(id, _)
			| TransportEvent::Disconnected(id) => *id,
		}
	}
}

/// What the game needs from a connection. Inbound traffic arrives separately as
/// [`TransportEvent`]s.
pub trait Transport {
	fn id(&self) -> ConnId;
	/// Queues a message. There is no delivery confirmation.
	fn send(&mut self, msg: Msg);
	/// Closes the connection. Safe to call more than once.
	fn close(&mut self);
}

/// Writes one length-prefixed CBOR frame.
pub async fn write_frame<T: Serialize, W: AsyncWrite + AsyncWriteExt + Unpin>(
	value: &T,
	into: &mut W,
) -> Result<(), GameError> {
	let d = serde_cbor::to_vec(value)?;
	if d.len() > MAX_FRAME {
		return Err(GameError::FrameTooLarge(d.len()));
	}
	into.write_u32(d.len() as u32).await?;
	into.write_all(&d).await?;
	into.flush().await?;
	Ok(())
}

/// Reads one length-prefixed CBOR frame.
pub async fn read_frame<T: DeserializeOwned, R: AsyncRead + AsyncReadExt + Unpin>(
	from: &mut R,
) -> Result<T, GameError> {
	let len = from.read_u32().await? as usize;
	if len > MAX_FRAME {
		return Err(GameError::FrameTooLarge(len));
	}
	let mut d = vec![0; len];
	from.read_exact(&mut d).await?;
	Ok(serde_cbor::from_slice(&d)?)
}

/// A TCP connection to the other player. Reading and writing happen on their
/// own tasks; everything inbound is posted to the `events` channel.
pub struct TcpTransport {
	id: ConnId,
	role: Role,
	local_addr: SocketAddr,
	outbox: Option<UnboundedSender<Msg>>,
	accept: Option<JoinHandle<()>>,
	hangup: Arc<Notify>,
	closed: Arc<AtomicBool>,
	events: UnboundedSender<TransportEvent>,
}

impl TcpTransport {
	/// Binds `addr` and waits in the background for exactly one peer.
	pub async fn listen(
		id: ConnId,
		addr: SocketAddr,
		events: UnboundedSender<TransportEvent>,
	) -> Result<TcpTransport, GameError> {
		let listener = TcpListener::bind(addr).await?;
		let local_addr = listener.local_addr()?;
		info!("listening on {}", local_addr);

		let (outbox, outbound) = unbounded_channel();
		let closed = Arc::new(AtomicBool::new(false));
		let hangup = Arc::new(Notify::new());
		let accept = {
			let events = events.clone();
			let closed = closed.clone();
			let hangup = hangup.clone();
			tokio::spawn(async move {
				match listener.accept().await {
					Ok((socket, peer)) => {
						// Only one peer per game; later callers get refused.
						drop(listener);
						info!("accepted {}", peer);
						start(id, socket, outbound, events, closed, hangup);
					}
					Err(e) => {
						warn!("accept failed: {}", e);
						disconnected(id, &events, &closed);
					}
				}
			})
		};

		Ok(TcpTransport {
			id,
			role: Role::Listener,
			local_addr,
			outbox: Some(outbox),
			accept: Some(accept),
			hangup,
			closed,
			events,
		})
	}

	/// Dials a listener. Fails with [`GameError::ConnectionRefused`] if nobody
	/// is listening there.
	pub async fn connect(
		id: ConnId,
		host: &str,
		port: u16,
		events: UnboundedSender<TransportEvent>,
	) -> Result<TcpTransport, GameError> {
		let socket = TcpStream::connect((host, port))
			.await
			.map_err(|e| match e.kind() {
				std::io::ErrorKind::ConnectionRefused => GameError::ConnectionRefused,
				_ => GameError::Network(e),
			})?;
		let local_addr = socket.local_addr()?;
		info!("connected to {}:{}", host, port);

		let (outbox, outbound) = unbounded_channel();
		let closed = Arc::new(AtomicBool::new(false));
		let hangup = Arc::new(Notify::new());
		start(
			id,
			socket,
			outbound,
			events.clone(),
			closed.clone(),
			hangup.clone(),
		);

		Ok(TcpTransport {
			id,
			role: Role::Initiator,
			local_addr,
			outbox: Some(outbox),
			accept: None,
			hangup,
			closed,
			events,
		})
	}

	#[must_use]
	pub const fn role(&self) -> Role {
		self.role
	}

	#[must_use]
	pub const fn local_addr(&self) -> SocketAddr {
		self.local_addr
	}
}

impl Transport for TcpTransport {
	fn id(&self) -> ConnId {
		self.id
	}

	fn send(&mut self, msg: Msg) {
		match &self.outbox {
			Some(outbox) => {
				if outbox.send(msg).is_err() {
					warn!("connection {} is gone, dropping message", self.id);
				}
			}
			None => warn!("send on closed connection {}", self.id),
		}
	}

	fn close(&mut self) {
		// Dropping the outbox lets the writer flush what's queued and hang up.
		self.outbox = None;
		if let Some(accept) = self.accept.take() {
			accept.abort();
		}
		self.hangup.notify_one();
		disconnected(self.id, &self.events, &self.closed);
	}
}

impl Drop for TcpTransport {
	fn drop(&mut self) {
		self.close();
	}
}

/// Splits `socket` into a writer task and a reader task and announces the
/// connection. The reader stops on EOF, on a bad frame or on `hangup`.
fn start(
	id: ConnId,
	socket: TcpStream,
	mut outbound: UnboundedReceiver<Msg>,
	events: UnboundedSender<TransportEvent>,
	closed: Arc<AtomicBool>,
	hangup: Arc<Notify>,
) {
	let (mut read_half, mut write_half) = socket.into_split();

	tokio::spawn(async move {
		while let Some(msg) = outbound.recv().await {
			debug!("-> {:?}", msg);
			if let Err(e) = write_frame(&msg, &mut write_half).await {
				warn!("write failed: {}", e);
				return;
			}
		}
		let _ = write_half.shutdown().await;
	});

	let _ = events.send(TransportEvent::Connected(id));

	tokio::spawn(async move {
		loop {
			let frame = tokio::select! {
				frame = read_frame::<Msg, _>(&mut read_half) => frame,
				_ = hangup.notified() => break,
			};
			match frame {
				Ok(msg) => {
					debug!("<- {:?}", msg);
					if events.send(TransportEvent::Received(id, msg)).is_err() {
						break;
					}
				}
				Err(GameError::Network(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
					info!("peer hung up");
					break;
				}
				Err(e) => {
					warn!("read failed: {}", e);
					break;
				}
			}
		}
		disconnected(id, &events, &closed);
	});
}

fn disconnected(id: ConnId, events: &UnboundedSender<TransportEvent>, closed: &AtomicBool) {
	if !closed.swap(true, Ordering::SeqCst) {
		let _ = events.send(TransportEvent::Disconnected(id));
	}
}

//! Network integration — IPv4 TCP with readiness-driven tasks
//!
//! Sockets are non-blocking `std::net` objects keyed by raw fd. Accept,
//! read, and write are task kinds: their drivers attempt the syscall once
//! and, on `WouldBlock`, park on the fd's waker key after registering
//! interest with the readiness poller. The poller is a dedicated thread
//! multiplexing `poll(2)` over every watched fd; readiness is translated
//! into ordinary waker-key wakes under the executor lock. This is the one
//! place wall-clock time enters the runtime.

use crate::exec::executor::Shared;
use crossbeam::channel::{self, Receiver, Sender};
use rustc_hash::FxHashMap;
use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::os::fd::AsRawFd;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use surge_sdk::SocketFd;

/// Closed error-code enum for socket failures.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum NetErrorKind {
    /// Address already bound.
    AddrInUse = 1,
    /// Address not available on this host.
    AddrNotAvailable = 2,
    /// Peer refused the connection.
    ConnectionRefused = 3,
    /// Peer reset the connection.
    ConnectionReset = 4,
    /// Write on a closed peer.
    BrokenPipe = 5,
    /// Malformed address or argument.
    InvalidInput = 6,
    /// Operation timed out.
    TimedOut = 7,
    /// Anything the closed set does not name.
    Other = 8,
}

impl NetErrorKind {
    fn from_io(err: &io::Error) -> Self {
        use io::ErrorKind;
        match err.kind() {
            ErrorKind::AddrInUse => NetErrorKind::AddrInUse,
            ErrorKind::AddrNotAvailable => NetErrorKind::AddrNotAvailable,
            ErrorKind::ConnectionRefused => NetErrorKind::ConnectionRefused,
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
                NetErrorKind::ConnectionReset
            }
            ErrorKind::BrokenPipe => NetErrorKind::BrokenPipe,
            ErrorKind::InvalidInput | ErrorKind::InvalidData => NetErrorKind::InvalidInput,
            ErrorKind::TimedOut => NetErrorKind::TimedOut,
            _ => NetErrorKind::Other,
        }
    }

    fn from_code(code: u8) -> Self {
        match code {
            1 => NetErrorKind::AddrInUse,
            2 => NetErrorKind::AddrNotAvailable,
            3 => NetErrorKind::ConnectionRefused,
            4 => NetErrorKind::ConnectionReset,
            5 => NetErrorKind::BrokenPipe,
            6 => NetErrorKind::InvalidInput,
            7 => NetErrorKind::TimedOut,
            _ => NetErrorKind::Other,
        }
    }
}

/// Recoverable socket operation failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("net error ({kind:?}): {message}")]
pub struct NetError {
    /// Closed error class.
    pub kind: NetErrorKind,
    /// Human-readable OS message.
    pub message: String,
}

impl NetError {
    fn from_io(err: io::Error) -> Self {
        Self {
            kind: NetErrorKind::from_io(&err),
            message: err.to_string(),
        }
    }
}

// ============================================================================
// Result-bits encoding
// ============================================================================

const ERR_FLAG: u64 = 1 << 63;

/// Encode a successful net-task result (accepted fd or byte count).
pub fn encode_ok(value: u64) -> u64 {
    value
}

/// Encode a socket failure into result bits.
pub fn encode_error(kind: NetErrorKind) -> u64 {
    ERR_FLAG | kind as u64
}

/// Decode net-task result bits.
pub fn decode_result(bits: u64) -> Result<u64, NetErrorKind> {
    if bits & ERR_FLAG == 0 {
        Ok(bits)
    } else {
        Err(NetErrorKind::from_code((bits & 0xFF) as u8))
    }
}

// ============================================================================
// Socket registry
// ============================================================================

pub(crate) enum AcceptOutcome {
    Ready(SocketFd),
    WouldBlock,
    Failed(NetErrorKind),
}

pub(crate) enum ReadOutcome {
    Data(Vec<u8>),
    Eof,
    WouldBlock,
    Failed(NetErrorKind),
}

pub(crate) enum WriteOutcome {
    Wrote(usize),
    WouldBlock,
    Failed(NetErrorKind),
}

/// Non-blocking sockets keyed by raw fd, owned by the executor state.
#[derive(Default)]
pub(crate) struct NetRegistry {
    listeners: FxHashMap<SocketFd, TcpListener>,
    streams: FxHashMap<SocketFd, TcpStream>,
}

impl NetRegistry {
    /// Bind an IPv4 listener and register it non-blocking.
    pub(crate) fn listen(&mut self, addr: &str, port: u16) -> Result<SocketFd, NetError> {
        let ip: Ipv4Addr = addr.parse().map_err(|_| NetError {
            kind: NetErrorKind::InvalidInput,
            message: format!("invalid IPv4 address: {addr}"),
        })?;
        let listener = TcpListener::bind((ip, port)).map_err(NetError::from_io)?;
        listener.set_nonblocking(true).map_err(NetError::from_io)?;
        let fd = listener.as_raw_fd();
        self.listeners.insert(fd, listener);
        Ok(fd)
    }

    /// Local address of a registered listener.
    pub(crate) fn local_addr(&self, fd: SocketFd) -> Result<SocketAddr, NetError> {
        let listener = self
            .listeners
            .get(&fd)
            .unwrap_or_else(|| panic!("invalid socket handle {fd}"));
        listener.local_addr().map_err(NetError::from_io)
    }

    /// One non-blocking accept attempt; a fresh connection is registered
    /// non-blocking and returned by fd.
    pub(crate) fn accept_once(&mut self, fd: SocketFd) -> AcceptOutcome {
        let listener = self
            .listeners
            .get(&fd)
            .unwrap_or_else(|| panic!("invalid socket handle {fd}"));
        match listener.accept() {
            Ok((stream, _peer)) => {
                if let Err(err) = stream.set_nonblocking(true) {
                    return AcceptOutcome::Failed(NetErrorKind::from_io(&err));
                }
                let stream_fd = stream.as_raw_fd();
                self.streams.insert(stream_fd, stream);
                AcceptOutcome::Ready(stream_fd)
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => AcceptOutcome::WouldBlock,
            Err(err) => AcceptOutcome::Failed(NetErrorKind::from_io(&err)),
        }
    }

    /// One non-blocking read attempt of up to `max_bytes`.
    pub(crate) fn read_once(&mut self, fd: SocketFd, max_bytes: usize) -> ReadOutcome {
        let stream = self
            .streams
            .get_mut(&fd)
            .unwrap_or_else(|| panic!("invalid socket handle {fd}"));
        let mut buf = vec![0u8; max_bytes.max(1)];
        match stream.read(&mut buf) {
            Ok(0) => ReadOutcome::Eof,
            Ok(n) => {
                buf.truncate(n);
                ReadOutcome::Data(buf)
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => ReadOutcome::WouldBlock,
            Err(err) => ReadOutcome::Failed(NetErrorKind::from_io(&err)),
        }
    }

    /// One non-blocking write attempt.
    pub(crate) fn write_once(&mut self, fd: SocketFd, data: &[u8]) -> WriteOutcome {
        let stream = self
            .streams
            .get_mut(&fd)
            .unwrap_or_else(|| panic!("invalid socket handle {fd}"));
        match stream.write(data) {
            Ok(n) => WriteOutcome::Wrote(n),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => WriteOutcome::WouldBlock,
            Err(err) => WriteOutcome::Failed(NetErrorKind::from_io(&err)),
        }
    }

    /// Register an already-connected stream (used by tests and by hosts
    /// that dial out synchronously).
    pub(crate) fn adopt_stream(&mut self, stream: TcpStream) -> Result<SocketFd, NetError> {
        stream.set_nonblocking(true).map_err(NetError::from_io)?;
        let fd = stream.as_raw_fd();
        self.streams.insert(fd, stream);
        Ok(fd)
    }

    /// Drop a socket (closing it). Returns false for an unknown fd.
    pub(crate) fn close(&mut self, fd: SocketFd) -> bool {
        self.listeners.remove(&fd).is_some() || self.streams.remove(&fd).is_some()
    }
}

// ============================================================================
// Readiness poller
// ============================================================================

#[derive(Default, Clone, Copy)]
struct Interest {
    readable: bool,
    writable: bool,
}

enum WatchCmd {
    Watch { fd: SocketFd, writable: bool },
    Unwatch { fd: SocketFd },
    Shutdown,
}

/// How long one `poll(2)` blocks before re-checking the command channel.
const POLL_TICK_MS: i32 = 50;

/// Dedicated thread translating fd readiness into waker-key wakes.
pub(crate) struct NetPoller {
    commands: Sender<WatchCmd>,
    handle: Option<JoinHandle<()>>,
}

impl NetPoller {
    pub(crate) fn start(shared: Arc<Shared>) -> Self {
        let (tx, rx) = channel::unbounded();
        let handle = thread::Builder::new()
            .name("surge-net-poller".to_string())
            .spawn(move || {
                Self::run_loop(rx, shared);
            })
            .expect("Failed to spawn net poller thread");
        Self {
            commands: tx,
            handle: Some(handle),
        }
    }

    /// Watch `fd` for read readiness.
    pub(crate) fn watch_read(&self, fd: SocketFd) {
        let _ = self.commands.send(WatchCmd::Watch {
            fd,
            writable: false,
        });
    }

    /// Watch `fd` for write readiness.
    pub(crate) fn watch_write(&self, fd: SocketFd) {
        let _ = self.commands.send(WatchCmd::Watch { fd, writable: true });
    }

    /// Stop watching `fd` (it was closed).
    pub(crate) fn unwatch(&self, fd: SocketFd) {
        let _ = self.commands.send(WatchCmd::Unwatch { fd });
    }

    fn run_loop(rx: Receiver<WatchCmd>, shared: Arc<Shared>) {
        let mut watches: FxHashMap<SocketFd, Interest> = FxHashMap::default();

        loop {
            // With nothing to poll, block until the executor registers
            // interest (or shuts the poller down).
            if watches.is_empty() {
                match rx.recv() {
                    Ok(cmd) => {
                        if Self::apply(&mut watches, cmd) {
                            return;
                        }
                    }
                    Err(_) => return,
                }
            }
            loop {
                match rx.try_recv() {
                    Ok(cmd) => {
                        if Self::apply(&mut watches, cmd) {
                            return;
                        }
                    }
                    Err(channel::TryRecvError::Empty) => break,
                    Err(channel::TryRecvError::Disconnected) => return,
                }
            }
            if watches.is_empty() {
                continue;
            }

            let mut fds: Vec<libc::pollfd> = watches
                .iter()
                .map(|(&fd, interest)| {
                    let mut events: libc::c_short = 0;
                    if interest.readable {
                        events |= libc::POLLIN;
                    }
                    if interest.writable {
                        events |= libc::POLLOUT;
                    }
                    libc::pollfd {
                        fd,
                        events,
                        revents: 0,
                    }
                })
                .collect();

            let ready =
                unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, POLL_TICK_MS) };
            if ready <= 0 {
                continue;
            }

            for pfd in &fds {
                if pfd.revents == 0 {
                    continue;
                }
                // Hangup/error wake both directions so the task can observe
                // the condition through its own syscall.
                let fault = pfd.revents & (libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) != 0;
                let readable = fault || pfd.revents & libc::POLLIN != 0;
                let writable = fault || pfd.revents & libc::POLLOUT != 0;

                if let Some(interest) = watches.get_mut(&pfd.fd) {
                    if readable {
                        interest.readable = false;
                    }
                    if writable {
                        interest.writable = false;
                    }
                    if !interest.readable && !interest.writable {
                        watches.remove(&pfd.fd);
                    }
                }
                shared.wake_net(pfd.fd, readable, writable);
            }
        }
    }

    pub(crate) fn shutdown(&mut self) {
        let _ = self.commands.send(WatchCmd::Shutdown);
        if let Some(handle) = self.handle.take() {
            let start = Instant::now();
            let timeout = Duration::from_secs(2);
            loop {
                if handle.is_finished() {
                    let _ = handle.join();
                    return;
                }
                if start.elapsed() > timeout {
                    drop(handle);
                    return;
                }
                thread::sleep(Duration::from_millis(5));
            }
        }
    }

    /// Apply one command; returns true on shutdown.
    fn apply(watches: &mut FxHashMap<SocketFd, Interest>, cmd: WatchCmd) -> bool {
        match cmd {
            WatchCmd::Watch { fd, writable } => {
                let interest = watches.entry(fd).or_default();
                if writable {
                    interest.writable = true;
                } else {
                    interest.readable = true;
                }
                false
            }
            WatchCmd::Unwatch { fd } => {
                watches.remove(&fd);
                false
            }
            WatchCmd::Shutdown => true,
        }
    }
}

impl Drop for NetPoller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_and_local_addr() {
        let mut reg = NetRegistry::default();
        let fd = reg.listen("127.0.0.1", 0).unwrap();
        let addr = reg.local_addr(fd).unwrap();
        assert!(addr.port() > 0);
        assert!(reg.close(fd));
        assert!(!reg.close(fd));
    }

    #[test]
    fn test_listen_invalid_address() {
        let mut reg = NetRegistry::default();
        let err = reg.listen("not-an-ip", 0).unwrap_err();
        assert_eq!(err.kind, NetErrorKind::InvalidInput);
    }

    #[test]
    fn test_accept_would_block_then_ready() {
        let mut reg = NetRegistry::default();
        let fd = reg.listen("127.0.0.1", 0).unwrap();
        assert!(matches!(reg.accept_once(fd), AcceptOutcome::WouldBlock));

        let addr = reg.local_addr(fd).unwrap();
        let client = TcpStream::connect(addr).unwrap();

        // The connection lands in the backlog; retry until visible.
        let start = Instant::now();
        let stream_fd = loop {
            match reg.accept_once(fd) {
                AcceptOutcome::Ready(sfd) => break sfd,
                AcceptOutcome::WouldBlock => {
                    assert!(start.elapsed() < Duration::from_secs(2), "accept timed out");
                    thread::sleep(Duration::from_millis(5));
                }
                AcceptOutcome::Failed(kind) => panic!("accept failed: {kind:?}"),
            }
        };

        drop(client);
        assert!(reg.close(stream_fd));
        assert!(reg.close(fd));
    }

    #[test]
    fn test_read_write_round_trip() {
        let mut reg = NetRegistry::default();
        let fd = reg.listen("127.0.0.1", 0).unwrap();
        let addr = reg.local_addr(fd).unwrap();

        let mut client = TcpStream::connect(addr).unwrap();
        let start = Instant::now();
        let server_fd = loop {
            match reg.accept_once(fd) {
                AcceptOutcome::Ready(sfd) => break sfd,
                AcceptOutcome::WouldBlock => {
                    assert!(start.elapsed() < Duration::from_secs(2), "accept timed out");
                    thread::sleep(Duration::from_millis(5));
                }
                AcceptOutcome::Failed(kind) => panic!("accept failed: {kind:?}"),
            }
        };

        client.write_all(b"ping").unwrap();
        let start = Instant::now();
        let data = loop {
            match reg.read_once(server_fd, 64) {
                ReadOutcome::Data(data) => break data,
                ReadOutcome::WouldBlock => {
                    assert!(start.elapsed() < Duration::from_secs(2), "read timed out");
                    thread::sleep(Duration::from_millis(5));
                }
                other => panic!(
                    "unexpected read outcome: {}",
                    match other {
                        ReadOutcome::Eof => "eof",
                        ReadOutcome::Failed(_) => "failed",
                        _ => "?",
                    }
                ),
            }
        };
        assert_eq!(data, b"ping");

        match reg.write_once(server_fd, b"pong") {
            WriteOutcome::Wrote(n) => assert_eq!(n, 4),
            _ => panic!("write failed"),
        }
        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[test]
    fn test_result_bits_round_trip() {
        assert_eq!(decode_result(encode_ok(42)), Ok(42));
        assert_eq!(
            decode_result(encode_error(NetErrorKind::ConnectionReset)),
            Err(NetErrorKind::ConnectionReset)
        );
        assert_eq!(
            decode_result(encode_error(NetErrorKind::BrokenPipe)),
            Err(NetErrorKind::BrokenPipe)
        );
    }
}

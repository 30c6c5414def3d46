//! The core [`RdbStub`] type, which serves the remote debug protocol for a
//! particular [`Target`] over TCP.
//!
//! The stub is driven from two places in the host:
//!
//! - [`RdbStub::poll`], called once per emulated frame while the target runs
//!   at full speed. It never blocks.
//! - [`RdbStub::break_loop`], called once execution halts. It services the
//!   connection until a command resumes execution, calling back into the
//!   host's [`HostEventLoop`] so the host stays responsive.
//!
//! ```rust,ignore
//! let mut stub = RdbStub::<MyEmu>::builder().build()?;
//! stub.listen()?;
//!
//! loop {
//!     emu.run_frame();
//!     if stub.poll(&mut emu) {
//!         continue;
//!     }
//!     stub.check_remote_break::<MyEventLoop>(&mut emu);
//! }
//! ```

use std::io::{self, Read};
use std::net::{SocketAddr, SocketAddrV4, TcpListener, TcpStream};
use std::time::{Duration, Instant};

use log::*;
use managed::ManagedSlice;

use crate::conn::Connection;
use crate::protocol::{ResponseWriter, TERMINATOR};
use crate::target::Target;
use crate::util::grow_buf::GrowBuf;

mod builder;
mod core_impl;
mod error;

pub mod capture;

pub use builder::{
    RdbStubBuilder, RdbStubBuilderError, DEFAULT_RECV_CHUNK_SIZE, DEFAULT_SELECT_TIMEOUT,
    DEFAULT_SEND_BUFFER_SIZE,
};
pub use capture::{CaptureGuard, OutputCapture};
pub use error::RdbStubError;

use builder::StubConfig;
use capture::OutputCapture as Capture;
use core_impl::{InternalError, RdbStubImpl};

/// How long a timed accept sleeps between attempts.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A set of user-provided methods the stub calls back into while it holds
/// control in [`RdbStub::break_loop`].
pub trait HostEventLoop {
    /// The Target being debugged.
    type Target: Target;

    /// Run the host's own event handling (UI, input...). Called whenever the
    /// break loop has waited a full select timeout without activity.
    fn process_events(target: &mut Self::Target);

    /// Whether the host wants to exit. Checked once per break loop iteration.
    fn quit_requested(target: &Self::Target) -> bool;

    /// Called on break loop entry, and whenever a client connects or
    /// disconnects while execution is halted.
    ///
    /// The default implementation does nothing.
    fn connection_status(target: &mut Self::Target, connected: bool) {
        let _ = (target, connected);
    }
}

/// Lifecycle of the stub's sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubState {
    /// `listen` hasn't been called, or it failed.
    Unbound,
    /// Waiting for a client.
    Listening,
    /// A client is connected.
    Connected,
    /// The stub has been torn down.
    Closed,
}

/// How reads on the accepted connection behave. Writes always block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// Reads return immediately. Used while the target runs.
    Polling,
    /// Reads wait up to the select timeout. Used inside the break loop.
    Blocking,
}

enum Activity {
    Data,
    Idle,
    Disconnected,
}

struct Session {
    stream: TcpStream,
    mode: TransportMode,
    // restores the host's output once the session ends
    _capture: Option<CaptureGuard>,
}

impl Session {
    fn set_mode(&mut self, mode: TransportMode, select_timeout: Duration) -> io::Result<()> {
        // accepted sockets inherit the listener's O_NONBLOCK on some
        // platforms, and writes must always block
        self.stream.set_nonblocking(false)?;
        match mode {
            TransportMode::Polling => self.stream.set_read_timeout(None)?,
            TransportMode::Blocking => {
                // a zero timeout is rejected by the OS
                let timeout = select_timeout.max(Duration::from_millis(1));
                self.stream.set_read_timeout(Some(timeout))?
            }
        }
        if self.mode != mode {
            debug!("transport mode: {:?}", mode);
        }
        self.mode = mode;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.mode {
            TransportMode::Blocking => self.stream.read(buf),
            TransportMode::Polling => {
                self.stream.set_nonblocking(true)?;
                let res = self.stream.read(buf);
                self.stream.set_nonblocking(false)?;
                res
            }
        }
    }
}

/// Serves the remote debug protocol for a [`Target`], one client at a time.
pub struct RdbStub<'a, T: Target> {
    config: StubConfig,
    listener: Option<TcpListener>,
    session: Option<Session>,
    closed: bool,

    input: GrowBuf,
    recv_buf: Vec<u8>,
    send_buffer: ManagedSlice<'a, u8>,

    inner: RdbStubImpl<'a, T, TcpStream>,
}

impl<'a, T: Target> RdbStub<'a, T> {
    /// Create a [`RdbStubBuilder`].
    pub fn builder() -> RdbStubBuilder<'a, T> {
        RdbStubBuilder::new()
    }

    /// Create a new `RdbStub` with the default settings.
    ///
    /// For fine-grained control over the port, buffers and timeouts, use the
    /// [`RdbStub::builder`] method instead.
    pub fn new() -> RdbStub<'a, T> {
        let config = StubConfig {
            port: crate::DEFAULT_PORT,
            bind_addr: std::net::Ipv4Addr::LOCALHOST,
            select_timeout: DEFAULT_SELECT_TIMEOUT,
            recv_chunk_size: DEFAULT_RECV_CHUNK_SIZE,
        };
        let send_buffer = ManagedSlice::Owned(vec![0; DEFAULT_SEND_BUFFER_SIZE]);
        RdbStub::from_parts(config, send_buffer, None)
    }

    pub(crate) fn from_parts(
        config: StubConfig,
        send_buffer: ManagedSlice<'a, u8>,
        capture: Option<Box<dyn Capture + 'a>>,
    ) -> RdbStub<'a, T> {
        RdbStub {
            recv_buf: vec![0; config.recv_chunk_size],
            config,
            listener: None,
            session: None,
            closed: false,

            input: GrowBuf::new(crate::util::grow_buf::GROW_SLACK),
            send_buffer,

            inner: RdbStubImpl::new(capture),
        }
    }

    /// Bind the listening socket. Clients are accepted from `poll` and
    /// `break_loop`.
    ///
    /// On failure the stub stays unbound: `poll` does nothing, and
    /// `break_loop` returns immediately.
    pub fn listen(&mut self) -> Result<SocketAddr, RdbStubError> {
        let addr = SocketAddrV4::new(self.config.bind_addr, self.config.port);

        let listener = TcpListener::bind(addr).map_err(|e| {
            error!("failed to bind {}: {}", addr, e);
            RdbStubError::Bind(e)
        })?;
        listener.set_nonblocking(true).map_err(|e| {
            error!("failed to listen on {}: {}", addr, e);
            RdbStubError::Listen(e)
        })?;
        let local_addr = listener.local_addr().map_err(RdbStubError::Listen)?;

        info!(
            "listening on {}, protocol {:x}",
            local_addr,
            crate::PROTOCOL_ID
        );
        self.listener = Some(listener);
        self.closed = false;
        Ok(local_addr)
    }

    /// Close the connection (if any) and the listening socket.
    pub fn teardown(&mut self) {
        self.end_session();
        if self.listener.take().is_some() {
            info!("stopped listening");
        }
        self.closed = true;
    }

    pub fn state(&self) -> StubState {
        match (&self.listener, &self.session) {
            (_, Some(_)) => StubState::Connected,
            (Some(_), None) => StubState::Listening,
            (None, None) if self.closed => StubState::Closed,
            (None, None) => StubState::Unbound,
        }
    }

    /// The address the stub is listening on.
    pub fn local_addr(&self) -> Result<SocketAddr, RdbStubError> {
        match &self.listener {
            Some(listener) => listener.local_addr().map_err(RdbStubError::Listen),
            None => Err(RdbStubError::NotListening),
        }
    }

    /// Mode of the accepted connection, if any.
    pub fn transport_mode(&self) -> Option<TransportMode> {
        self.session.as_ref().map(|s| s.mode)
    }

    /// Execution is halted, and the break loop owns the connection.
    pub fn is_break_active(&self) -> bool {
        self.inner.break_active
    }

    /// Per-frame update while the target runs: accept a client, or handle
    /// whatever commands have arrived, then forward captured output.
    ///
    /// Returns whether execution is halted.
    pub fn poll(&mut self, target: &mut T) -> bool {
        if self.listener.is_none() {
            return self.inner.break_active;
        }

        if !self.inner.break_active {
            if self.session.is_some() {
                self.read_connection(target);
            } else {
                self.try_accept(target, TransportMode::Polling);
            }
        }

        self.send(target, |inner, res, _| inner.notify_log(res));
        self.inner.break_active
    }

    /// Enter the break loop if the client asked for a break since the last
    /// call.
    pub fn check_remote_break<E>(&mut self, target: &mut T)
    where
        E: HostEventLoop<Target = T>,
    {
        if self.inner.break_requested {
            self.inner.break_requested = false;
            debug!("servicing remote break request");
            self.break_loop::<E>(target);
        }
    }

    /// Service the connection while execution is halted.
    ///
    /// Returns once a command resumes execution, the listening socket goes
    /// away, or the host asks to quit.
    pub fn break_loop<E>(&mut self, target: &mut T)
    where
        E: HostEventLoop<Target = T>,
    {
        if self.inner.break_active {
            return;
        }
        self.inner.break_active = true;
        debug!("entering break loop");

        self.send(target, |inner, res, target| {
            inner.notify_config(res, target)?;
            inner.notify_status(res, target)?;
            inner.notify_profile(res, target)?;
            inner.notify_log(res)
        });

        target.sync_hardware();
        E::connection_status(target, self.session.is_some());
        self.set_mode(TransportMode::Blocking);

        while self.inner.break_active {
            if self.listener.is_none() || E::quit_requested(target) {
                break;
            }

            if self.session.is_none() {
                if self.try_accept(target, TransportMode::Blocking) {
                    E::connection_status(target, true);
                } else {
                    E::process_events(target);
                }
                continue;
            }

            match self.read_connection(target) {
                Activity::Data => {}
                Activity::Idle => E::process_events(target),
                Activity::Disconnected => E::connection_status(target, false),
            }
        }

        self.inner.break_active = false;
        self.inner.break_requested = false;

        self.send(target, |inner, res, target| {
            inner.notify_config(res, target)?;
            inner.notify_status(res, target)?;
            inner.notify_log(res)
        });
        self.set_mode(TransportMode::Polling);
        debug!("leaving break loop");
    }

    fn set_mode(&mut self, mode: TransportMode) {
        let timeout = self.config.select_timeout;
        let result = match self.session.as_mut() {
            Some(session) => session.set_mode(mode, timeout),
            None => return,
        };
        if let Err(e) = result {
            warn!("could not switch connection to {:?} mode: {}", mode, e);
            self.end_session();
        }
    }

    /// Accept a pending client. In blocking mode, wait up to the select
    /// timeout for one to show up.
    fn try_accept(&mut self, target: &mut T, mode: TransportMode) -> bool {
        let listener = match &self.listener {
            Some(listener) => listener,
            None => return false,
        };

        let deadline = match mode {
            TransportMode::Polling => None,
            TransportMode::Blocking => Some(Instant::now() + self.config.select_timeout),
        };

        let stream = loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    info!("connection accepted from {}", peer);
                    break stream;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => match deadline {
                    Some(deadline) if Instant::now() < deadline => {
                        std::thread::sleep(ACCEPT_POLL_INTERVAL)
                    }
                    _ => return false,
                },
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!("accept failed: {}", e);
                    return false;
                }
            }
        };

        self.start_session(target, stream, mode)
    }

    fn start_session(&mut self, target: &mut T, stream: TcpStream, mode: TransportMode) -> bool {
        let mut session = Session {
            stream,
            mode: TransportMode::Polling,
            _capture: None,
        };
        let configured = session
            .stream
            .on_session_start()
            .and_then(|()| session.set_mode(mode, self.config.select_timeout));
        if let Err(e) = configured {
            warn!("could not configure connection: {}", e);
            return false;
        }

        self.input.clear();
        self.session = Some(session);

        // the handshake goes out on its own, so the client can tell stale
        // responses from fresh ones
        self.send(target, |inner, res, _| inner.notify_connected(res));

        let guard = match self.inner.capture_mut() {
            Some(capture) => match capture.begin() {
                Ok(guard) => Some(guard),
                Err(e) => {
                    warn!("could not capture output: {}", e);
                    None
                }
            },
            None => None,
        };
        match self.session.as_mut() {
            Some(session) => session._capture = guard,
            None => return false,
        }

        self.send(target, |inner, res, target| {
            inner.notify_config(res, target)?;
            inner.notify_status(res, target)?;
            inner.notify_log(res)
        });
        self.session.is_some()
    }

    fn end_session(&mut self) {
        if self.session.take().is_some() {
            info!("connection closed");
        }
        self.input.clear();
    }

    fn read_connection(&mut self, target: &mut T) -> Activity {
        let session = match self.session.as_mut() {
            Some(session) => session,
            None => return Activity::Disconnected,
        };

        let n = match session.read(&mut self.recv_buf) {
            Ok(0) => {
                debug!("client closed the connection");
                self.end_session();
                return Activity::Disconnected;
            }
            Ok(n) => n,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                return Activity::Idle
            }
            Err(e) => {
                warn!("{}", RdbStubError::ConnectionRead(e));
                self.end_session();
                return Activity::Disconnected;
            }
        };

        self.input.push_slice(&self.recv_buf[..n]);
        self.process_input(target);

        if self.session.is_some() {
            Activity::Data
        } else {
            Activity::Disconnected
        }
    }

    /// Handle every complete command in the input buffer. Responses are
    /// flushed once, after the last one.
    fn process_input(&mut self, target: &mut T) {
        let result = {
            let session = match self.session.as_mut() {
                Some(session) => session,
                None => return,
            };
            let mut res = ResponseWriter::new(&mut session.stream, &mut self.send_buffer[..]);

            let mut handled = false;
            let result = loop {
                let end = match self.input.position(TERMINATOR) {
                    Some(end) => end,
                    None => break Ok(()),
                };
                let frame = &self.input.as_slice()[..end];
                if let Err(e) = self.inner.handle_frame(&mut res, target, frame) {
                    break Err(e);
                }
                self.input.remove_front(end + 1);
                handled = true;
            };

            match result {
                Ok(()) if handled => res.flush().map_err(InternalError::from),
                other => other,
            }
        };

        if let Err(e) = result {
            self.write_failed(e);
        }
    }

    /// Write some notifications and flush them.
    fn send<F>(&mut self, target: &mut T, frames: F)
    where
        F: FnOnce(
            &mut RdbStubImpl<'a, T, TcpStream>,
            &mut ResponseWriter<'_, TcpStream>,
            &mut T,
        ) -> Result<(), InternalError<io::Error>>,
    {
        let result = {
            let session = match self.session.as_mut() {
                Some(session) => session,
                None => return,
            };
            let mut res = ResponseWriter::new(&mut session.stream, &mut self.send_buffer[..]);
            frames(&mut self.inner, &mut res, target)
                .and_then(|()| res.flush().map_err(InternalError::from))
        };

        if let Err(e) = result {
            self.write_failed(e);
        }
    }

    fn write_failed(&mut self, e: InternalError<io::Error>) {
        match e {
            InternalError::ConnectionWrite(e) => warn!("{}", RdbStubError::ConnectionWrite(e)),
            InternalError::Rejected => warn!("unexpected rejection while writing"),
        }
        self.end_session();
    }
}

impl<'a, T: Target> Default for RdbStub<'a, T> {
    fn default() -> Self {
        RdbStub::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::core_impl::tests::MockTarget;
    use std::io::Write;
    use std::sync::mpsc;

    /// Listen on an ephemeral port and accept one client through `poll`.
    fn connect(stub: &mut RdbStub<'_, MockTarget>, target: &mut MockTarget) -> TcpStream {
        let addr = stub.listen().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        client
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while stub.state() != StubState::Connected {
            assert!(Instant::now() < deadline, "client never accepted");
            stub.poll(target);
            std::thread::sleep(Duration::from_millis(1));
        }
        client
    }

    /// Read whatever arrives until the client has been quiet for one read
    /// timeout, split into frames.
    fn read_frames(client: &mut TcpStream) -> Vec<Vec<u8>> {
        let mut data = Vec::new();
        let mut buf = [0; 4096];
        loop {
            match client.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => data.extend_from_slice(&buf[..n]),
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    break
                }
                Err(e) => panic!("read failed: {}", e),
            }
        }
        data.split(|&b| b == TERMINATOR)
            .filter(|frame| !frame.is_empty())
            .map(|frame| frame.to_vec())
            .collect()
    }

    #[test]
    fn lifecycle_states() {
        let mut stub = RdbStub::<MockTarget>::builder().port(0).build().unwrap();
        assert_eq!(stub.state(), StubState::Unbound);
        assert!(matches!(stub.local_addr(), Err(RdbStubError::NotListening)));

        let addr = stub.listen().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
        assert_eq!(stub.local_addr().unwrap(), addr);
        assert_eq!(stub.state(), StubState::Listening);

        stub.teardown();
        assert_eq!(stub.state(), StubState::Closed);
    }

    #[test]
    fn unbound_stub_ignores_polls() {
        let mut target = MockTarget::new();
        let mut stub = RdbStub::<MockTarget>::new();
        assert!(!stub.poll(&mut target));
        assert_eq!(stub.state(), StubState::Unbound);
    }

    #[test]
    fn bind_conflict_leaves_stub_unbound() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let mut stub = RdbStub::<MockTarget>::builder().port(port).build().unwrap();
        assert!(matches!(stub.listen(), Err(RdbStubError::Bind(_))));
        assert_eq!(stub.state(), StubState::Unbound);
    }

    #[test]
    fn commands_reassembled_across_reads() {
        let mut target = MockTarget::new();
        let mut stub = RdbStub::<MockTarget>::builder().port(0).build().unwrap();
        let mut client = connect(&mut stub, &mut target);
        assert!(read_frames(&mut client)[0].starts_with(b"!connected"));

        Write::write_all(&mut client, b"sta").unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while stub.input.len() < 3 {
            assert!(Instant::now() < deadline, "partial command never arrived");
            stub.poll(&mut target);
        }
        // nothing is answered until the terminator shows up
        assert!(read_frames(&mut client).is_empty());
        assert_eq!(stub.input.as_slice(), b"sta");

        Write::write_all(&mut client, b"tus\0regs\0").unwrap();
        let mut frames = Vec::new();
        while frames.len() < 2 {
            assert!(Instant::now() < deadline, "replies never arrived");
            stub.poll(&mut target);
            frames.extend(read_frames(&mut client));
        }

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], b"OK\x011\x01E00030");
        assert!(frames[1].starts_with(b"OK\x01\x01D0\x01"));
        assert!(stub.input.is_empty());
        assert_eq!(stub.state(), StubState::Connected);
    }

    #[test]
    fn blocking_mode_waits_and_streams_large_replies() {
        let mut target = MockTarget::new();
        let mut stub = RdbStub::<MockTarget>::builder()
            .port(0)
            .select_timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        let mut client = connect(&mut stub, &mut target);
        read_frames(&mut client);

        // as if the accepted socket had inherited the listener's O_NONBLOCK
        if let Some(session) = stub.session.as_ref() {
            session.stream.set_nonblocking(true).unwrap();
        }
        stub.set_mode(TransportMode::Blocking);
        assert_eq!(stub.transport_mode(), Some(TransportMode::Blocking));

        // an idle read waits out the select timeout
        let start = Instant::now();
        assert!(matches!(stub.read_connection(&mut target), Activity::Idle));
        assert!(start.elapsed() >= Duration::from_millis(50));

        let (tx, rx) = mpsc::channel();
        let reader = std::thread::spawn(move || {
            Write::write_all(&mut client, b"mem 0 $30000\0").unwrap();
            client
                .set_read_timeout(Some(Duration::from_secs(5)))
                .unwrap();

            let mut reply = Vec::new();
            let mut buf = [0; 8192];
            while !reply.ends_with(&[TERMINATOR]) {
                let n = client.read(&mut buf).unwrap();
                assert_ne!(n, 0, "stub hung up mid-reply");
                reply.extend_from_slice(&buf[..n]);
            }
            // hand the client back, so the stub never sees a hangup
            tx.send((reply, client)).unwrap();
        });

        let deadline = Instant::now() + Duration::from_secs(10);
        let (reply, _client) = loop {
            if let Ok(done) = rx.try_recv() {
                break done;
            }
            assert!(Instant::now() < deadline, "reply never completed");
            assert_eq!(stub.state(), StubState::Connected);
            stub.read_connection(&mut target);
        };
        reader.join().unwrap();

        let header = b"OK\x010\x0130000\x01";
        assert!(reply.starts_with(header));
        assert_eq!(reply.len(), header.len() + 0x30000 / 3 * 4 + 1);
        assert_eq!(stub.state(), StubState::Connected);
    }
}

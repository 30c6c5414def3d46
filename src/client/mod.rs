//! The debugger side of the protocol.
//!
//! A [`Dispatcher`] sends commands over a [`Connection`], and matches the
//! target's answers up with them. Responses carry no identifier of their
//! own: the target answers in the order commands were sent, so the oldest
//! pending command is always the one being answered.
//!
//! Reading from the transport is left to the owner of the connection, which
//! hands received bytes to [`Dispatcher::receive`]. Everything the target
//! says is reported to an [`Observer`].
//!
//! ```rust,ignore
//! let stream = TcpStream::connect(("127.0.0.1", rdbstub::DEFAULT_PORT))?;
//! let mut reader = stream.try_clone()?;
//!
//! let mut dispatcher = Dispatcher::new(TargetModel::new());
//! dispatcher.attach(stream)?;
//! let uid = dispatcher.read_registers();
//!
//! let mut buf = [0; 4096];
//! while dispatcher.pending_count() != 0 {
//!     let n = reader.read(&mut buf)?;
//!     dispatcher.receive(&buf[..n]);
//! }
//! ```

use std::collections::VecDeque;

use log::*;

use crate::conn::Connection;
use crate::expr::Register;
use crate::protocol::{is_notification, MemFlags, Notification, TERMINATOR};
use crate::util::grow_buf::{GrowBuf, GROW_SLACK};

mod model;
mod request;
mod response;

pub use model::{Changed, ProfileCounts, SearchResults, TargetModel};
pub use request::{BpFlags, MemorySlot, Request, RequestKind};
pub use response::{parse as parse_response, MemoryBlock, RegisterDump, Response, ResponseError};

/// Receives everything the target sends.
///
/// All methods have empty default implementations.
pub trait Observer {
    /// The target completed the `!connected` handshake (`true`), or a
    /// trusted connection went away (`false`).
    fn connection_changed(&mut self, connected: bool) {
        let _ = connected;
    }

    /// An unsolicited notification arrived.
    fn notification(&mut self, notification: &Notification) {
        let _ = notification;
    }

    /// The command `uid` (sent as `command`) was answered.
    fn response(&mut self, uid: u64, command: &str, response: Result<Response, ResponseError>) {
        let _ = (uid, command, response);
    }
}

impl Observer for () {}

struct PendingCommand {
    uid: u64,
    kind: RequestKind,
    text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handshake {
    /// Frames left over from a previous connection may still arrive.
    Waiting,
    Trusted,
    /// The target announced an unexpected protocol id.
    Rejected,
}

/// Sends commands to a target, and routes what comes back to an
/// [`Observer`].
pub struct Dispatcher<C: Connection, O: Observer> {
    conn: Option<C>,
    observer: O,

    pending: VecDeque<PendingCommand>,
    input: GrowBuf,
    next_uid: u64,
    handshake: Handshake,
}

impl<C, O> Dispatcher<C, O>
where
    C: Connection,
    C::Error: core::fmt::Debug,
    O: Observer,
{
    pub fn new(observer: O) -> Dispatcher<C, O> {
        Dispatcher {
            conn: None,
            observer,

            pending: VecDeque::new(),
            input: GrowBuf::new(GROW_SLACK),
            next_uid: 1,
            handshake: Handshake::Waiting,
        }
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn into_observer(self) -> O {
        self.observer
    }

    /// Start talking over a freshly opened connection, replacing the current
    /// one (if any).
    ///
    /// Everything received before the target's `!connected` handshake is
    /// dropped.
    pub fn attach(&mut self, mut conn: C) -> Result<(), C::Error> {
        self.detach();
        conn.on_session_start()?;
        self.conn = Some(conn);
        Ok(())
    }

    /// Drop the connection. Pending commands are discarded without being
    /// completed.
    pub fn detach(&mut self) {
        if self.conn.take().is_none() {
            return;
        }

        if !self.pending.is_empty() {
            debug!("discarding {} pending commands", self.pending.len());
        }
        self.pending.clear();
        self.input.clear();

        let was_trusted = self.handshake == Handshake::Trusted;
        self.handshake = Handshake::Waiting;
        if was_trusted {
            self.observer.connection_changed(false);
        }
    }

    /// A connection is attached and the target's handshake was accepted.
    pub fn is_connected(&self) -> bool {
        self.conn.is_some() && self.handshake == Handshake::Trusted
    }

    /// Number of commands sent but not answered yet.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Feed bytes read from the connection. Every complete frame is routed
    /// to the observer; a partial frame stays buffered until the rest
    /// arrives.
    pub fn receive(&mut self, data: &[u8]) {
        if self.conn.is_none() {
            return;
        }

        self.input.push_slice(data);
        while let Some(end) = self.input.position(TERMINATOR) {
            let frame = self.input.as_slice()[..end].to_vec();
            self.input.remove_front(end + 1);
            self.handle_frame(&frame);
        }
    }

    fn handle_frame(&mut self, frame: &[u8]) {
        #[cfg(feature = "trace-pkt")]
        if !frame.starts_with(b"!log") {
            trace!("<-- {}", crate::protocol::display_frame(frame));
        }

        match self.handshake {
            Handshake::Trusted => {}
            Handshake::Rejected => return,
            Handshake::Waiting => {
                match Notification::parse(frame) {
                    Ok(Notification::Connected { protocol_id })
                        if protocol_id == crate::PROTOCOL_ID =>
                    {
                        info!("connected, protocol {:x}", protocol_id);
                        self.handshake = Handshake::Trusted;
                        self.observer.connection_changed(true);
                    }
                    Ok(Notification::Connected { protocol_id }) => {
                        warn!(
                            "target speaks protocol {:x}, expected {:x}",
                            protocol_id,
                            crate::PROTOCOL_ID
                        );
                        self.handshake = Handshake::Rejected;
                    }
                    _ => debug!("dropping frame from a previous connection"),
                }
                return;
            }
        }

        if is_notification(frame) {
            match Notification::parse(frame) {
                Ok(n) => self.observer.notification(&n),
                Err(e) => warn!("dropping notification: {}", e),
            }
            return;
        }

        let cmd = match self.pending.pop_front() {
            Some(cmd) => cmd,
            None => {
                warn!("dropping response with no pending command");
                return;
            }
        };

        let response = response::parse(cmd.kind, frame);
        if let Err(e) = &response {
            debug!("`{}`: {}", cmd.text, e);
        }
        self.observer.response(cmd.uid, &cmd.text, response);
    }

    /// Send a request. Returns its uid, which the observer gets back along
    /// with the response.
    ///
    /// Without a connection, the uid is still allocated but nothing is sent,
    /// and no response will ever arrive.
    pub fn send(&mut self, request: Request) -> u64 {
        let uid = self.next_uid;
        self.next_uid += 1;

        let conn = match self.conn.as_mut() {
            Some(conn) => conn,
            None => {
                debug!("not connected, dropping `{}`", request.text);
                return uid;
            }
        };

        #[cfg(feature = "trace-pkt")]
        trace!("--> {}", request.text);

        let written = conn
            .write_all(request.text.as_bytes())
            .and_then(|()| conn.write(TERMINATOR))
            .and_then(|()| conn.flush());
        match written {
            Ok(()) => self.pending.push_back(PendingCommand {
                uid,
                kind: request.kind,
                text: request.text,
            }),
            Err(e) => {
                warn!("could not send `{}`: {:?}", request.text, e);
                self.detach();
            }
        }
        uid
    }

    /// Queue a `status` round-trip. Its completion (as [`Response::Flush`])
    /// marks that every request sent before it has been answered.
    pub fn insert_flush(&mut self) -> u64 {
        self.send(Request::flush())
    }

    pub fn read_status(&mut self) -> u64 {
        self.send(Request::status())
    }

    pub fn read_memory(&mut self, slot: MemorySlot, addr: u32, size: u32, flags: MemFlags) -> u64 {
        self.send(Request::read_memory(slot, addr, size, flags))
    }

    pub fn read_registers(&mut self) -> u64 {
        self.send(Request::read_registers())
    }

    pub fn read_info_ym(&mut self) -> u64 {
        self.send(Request::read_info_ym())
    }

    pub fn read_breakpoints(&mut self) -> u64 {
        self.send(Request::read_breakpoints())
    }

    pub fn read_exception_mask(&mut self) -> u64 {
        self.send(Request::read_exception_mask())
    }

    pub fn read_symbols(&mut self) -> u64 {
        self.send(Request::read_symbols())
    }

    pub fn write_memory(&mut self, addr: u32, data: &[u8], flags: MemFlags) -> u64 {
        self.send(Request::write_memory(addr, data, flags))
    }

    pub fn reset_warm(&mut self) -> u64 {
        self.send(Request::reset_warm())
    }

    pub fn reset_cold(&mut self) -> u64 {
        self.send(Request::reset_cold())
    }

    pub fn break_(&mut self) -> u64 {
        self.send(Request::break_())
    }

    pub fn run(&mut self) -> u64 {
        self.send(Request::run())
    }

    pub fn step(&mut self) -> u64 {
        self.send(Request::step())
    }

    /// Set a one-shot breakpoint on `pc`, then resume. Returns the uid of
    /// the `run`.
    pub fn run_to_pc(&mut self, pc: u32) -> u64 {
        self.send(Request::set_breakpoint(
            &format!("pc = ${:X}", pc),
            BpFlags::ONCE,
        ));
        self.run()
    }

    pub fn set_breakpoint(&mut self, expression: &str, flags: BpFlags) -> u64 {
        self.send(Request::set_breakpoint(expression, flags))
    }

    pub fn delete_breakpoint(&mut self, index: u32) -> u64 {
        self.send(Request::delete_breakpoint(index))
    }

    pub fn set_register(&mut self, reg: Register, val: u32) -> u64 {
        self.send(Request::set_register(reg, val))
    }

    pub fn set_exception_mask(&mut self, mask: u32) -> u64 {
        self.send(Request::set_exception_mask(mask))
    }

    pub fn set_profile_enable(&mut self, enable: bool) -> u64 {
        self.send(Request::set_profile_enable(enable))
    }

    pub fn set_fast_forward(&mut self, enable: bool) -> u64 {
        self.send(Request::set_fast_forward(enable))
    }

    pub fn send_console_command(&mut self, line: &str) -> u64 {
        self.send(Request::console(line))
    }

    pub fn send_mem_find(&mut self, pattern: &[(u8, u8)], start: u32, end: u32) -> u64 {
        self.send(Request::mem_find(pattern, start, end))
    }

    /// Send `text` verbatim. The response is reported as [`Response::Raw`].
    pub fn send_raw_command(&mut self, text: &str) -> u64 {
        self.send(Request::raw(text))
    }
}

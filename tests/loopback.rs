//! Drives a real stub over a loopback socket with a real client dispatcher.

use std::io::{self, Read};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use rdbstub::client::{Dispatcher, MemorySlot, Observer, Response, ResponseError};
use rdbstub::expr::{Register, RegisterSnapshot, Registers};
use rdbstub::protocol::{MemFlags, Notification};
use rdbstub::stub::{HostEventLoop, RdbStub, StubState};
use rdbstub::target::{CpuModel, MachineConfig, Target};

struct LoopbackTarget {
    regs: Registers,
    mem: Vec<u8>,
    ffwd: bool,
    stop: Arc<AtomicBool>,
}

impl Target for LoopbackTarget {
    fn read_register(&self, reg: Register) -> u32 {
        self.regs.get(reg)
    }

    fn for_each_variable(&self, f: &mut dyn FnMut(&str, u32)) {
        f("VBL", 7);
    }

    fn cpu_model(&self) -> CpuModel {
        CpuModel { cpu: 68000, mmu: 0 }
    }

    fn machine_config(&self) -> MachineConfig {
        MachineConfig {
            machine_type: 0,
            cpu_level: 0,
            st_ram_end: self.mem.len() as u32,
        }
    }

    fn read_byte(&mut self, _flags: MemFlags, addr: u32) -> u8 {
        self.mem.get(addr as usize).copied().unwrap_or(0)
    }

    fn write_byte(&mut self, _flags: MemFlags, addr: u32, val: u8) {
        if let Some(b) = self.mem.get_mut(addr as usize) {
            *b = val;
        }
    }

    fn fast_forward(&self) -> bool {
        self.ffwd
    }

    fn set_fast_forward(&mut self, enabled: bool) {
        self.ffwd = enabled;
    }

    fn request_single_step(&mut self) {
        let pc = self.regs.get(Register::Pc);
        self.regs.set(Register::Pc, pc + 2);
    }
}

enum Events {}

impl HostEventLoop for Events {
    type Target = LoopbackTarget;

    fn process_events(_target: &mut LoopbackTarget) {}

    fn quit_requested(target: &LoopbackTarget) -> bool {
        target.stop.load(Ordering::SeqCst)
    }
}

/// Run a stub on an ephemeral port until `stop` is raised.
fn spawn_target(stop: Arc<AtomicBool>) -> (SocketAddr, thread::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel();

    let handle = thread::spawn(move || {
        let mut regs = Registers::new();
        regs.set(Register::Pc, 0xe00030);
        regs.set(Register::A7, 0x7fffe);
        let mut target = LoopbackTarget {
            regs,
            mem: (0..0x10000).map(|i| i as u8).collect(),
            ffwd: false,
            stop,
        };

        let mut stub = RdbStub::<LoopbackTarget>::builder()
            .port(0)
            .select_timeout(Duration::from_millis(20))
            .build()
            .unwrap();
        tx.send(stub.listen().unwrap()).unwrap();

        while !target.stop.load(Ordering::SeqCst) {
            stub.poll(&mut target);
            stub.check_remote_break::<Events>(&mut target);
            thread::sleep(Duration::from_millis(2));
        }

        stub.teardown();
        assert_eq!(stub.state(), StubState::Closed);
    });

    (rx.recv().unwrap(), handle)
}

#[derive(Default)]
struct Recorder {
    connected: Vec<bool>,
    notifications: Vec<Notification>,
    responses: Vec<(u64, Result<Response, ResponseError>)>,
}

impl Recorder {
    fn answer(&self, uid: u64) -> Option<&Result<Response, ResponseError>> {
        self.responses.iter().find(|(u, _)| *u == uid).map(|(_, r)| r)
    }

    fn last_status(&self) -> Option<bool> {
        self.notifications.iter().rev().find_map(|n| match n {
            Notification::Status { running, .. } => Some(*running),
            _ => None,
        })
    }
}

impl Observer for Recorder {
    fn connection_changed(&mut self, connected: bool) {
        self.connected.push(connected);
    }

    fn notification(&mut self, notification: &Notification) {
        self.notifications.push(notification.clone());
    }

    fn response(&mut self, uid: u64, _command: &str, response: Result<Response, ResponseError>) {
        self.responses.push((uid, response));
    }
}

struct Client {
    dispatcher: Dispatcher<TcpStream, Recorder>,
    reader: TcpStream,
}

impl Client {
    fn connect(addr: SocketAddr) -> Client {
        let stream = TcpStream::connect(addr).unwrap();
        let reader = stream.try_clone().unwrap();
        reader
            .set_read_timeout(Some(Duration::from_millis(10)))
            .unwrap();

        let mut dispatcher = Dispatcher::new(Recorder::default());
        dispatcher.attach(stream).unwrap();
        let mut client = Client { dispatcher, reader };
        client.pump_until(|d| d.is_connected());
        client
    }

    fn obs(&self) -> &Recorder {
        self.dispatcher.observer()
    }

    /// Feed the dispatcher until `done` holds. Panics after 5 seconds.
    fn pump_until(&mut self, done: impl Fn(&Dispatcher<TcpStream, Recorder>) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut buf = [0; 1024];
        while !done(&self.dispatcher) {
            assert!(Instant::now() < deadline, "timed out");
            match self.reader.read(&mut buf) {
                Ok(0) => panic!("target closed the connection"),
                Ok(n) => self.dispatcher.receive(&buf[..n]),
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
                Err(e) => panic!("read failed: {}", e),
            }
        }
    }

    fn wait(&mut self, uid: u64) -> Result<Response, ResponseError> {
        self.pump_until(|d| d.observer().answer(uid).is_some());
        self.obs().answer(uid).cloned().unwrap()
    }
}

#[test]
fn full_session() {
    let stop = Arc::new(AtomicBool::new(false));
    let (addr, handle) = spawn_target(stop.clone());
    let mut client = Client::connect(addr);

    // accept sends config and status right after the handshake
    client.pump_until(|d| d.observer().last_status().is_some());
    assert_eq!(client.obs().connected, vec![true]);
    assert!(client.obs().notifications.contains(&Notification::Config {
        machine_type: 0,
        cpu_level: 0,
        st_ram_end: 0x10000,
    }));
    assert_eq!(client.obs().last_status(), Some(true));

    let uid = client.dispatcher.read_status();
    assert_eq!(
        client.wait(uid),
        Ok(Response::Status {
            running: true,
            pc: 0xe00030
        })
    );

    // halt; the break loop announces itself
    let uid = client.dispatcher.break_();
    assert_eq!(client.wait(uid), Ok(Response::Ok));
    client.pump_until(|d| d.observer().last_status() == Some(false));
    assert!(client
        .obs()
        .notifications
        .iter()
        .any(|n| matches!(n, Notification::Profile { enabled: false, .. })));

    // several commands in flight at once are answered in order
    let regs = client.dispatcher.read_registers();
    let write = client
        .dispatcher
        .write_memory(0x100, &[0xca, 0xfe], MemFlags::PHYSICAL);
    let read = client
        .dispatcher
        .read_memory(MemorySlot(1), 0xfe, 6, MemFlags::default());
    let find = client
        .dispatcher
        .send_mem_find(&[(0xff, 0xca), (0xff, 0xfe)], 0, 0x1000);
    let bps = client.dispatcher.read_breakpoints();
    let mask = client.dispatcher.set_exception_mask(4);
    let flush = client.dispatcher.insert_flush();
    client.pump_until(|d| d.observer().answer(flush).is_some());

    match client.obs().answer(regs) {
        Some(Ok(Response::Registers(dump))) => {
            assert_eq!(dump.regs.get(Register::Pc), 0xe00030);
            assert_eq!(dump.regs.get(Register::A7), 0x7fffe);
            assert_eq!(dump.regs.get(Register::Vbl), 7);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(
        client.obs().answer(write),
        Some(&Ok(Response::MemoryWritten { addr: 0x100, size: 2 }))
    );
    match client.obs().answer(read) {
        Some(Ok(Response::Memory(block))) => {
            assert_eq!(block.slot, MemorySlot(1));
            assert_eq!(block.addr, 0xfe);
            assert_eq!(block.data, vec![0xfe, 0xff, 0xca, 0xfe, 0x02, 0x03]);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(
        client.obs().answer(find),
        Some(&Ok(Response::MemFind(Some(0x100))))
    );
    assert_eq!(
        client.obs().answer(bps),
        Some(&Ok(Response::Breakpoints(Vec::new())))
    );
    // no exception mask support on this target
    assert_eq!(client.obs().answer(mask), Some(&Err(ResponseError::Failed)));
    assert_eq!(client.obs().answer(flush), Some(&Ok(Response::Flush)));

    // a big read spans several unbuffered blocks
    let uid = client
        .dispatcher
        .read_memory(MemorySlot(2), 0, 0x8000, MemFlags::PHYSICAL);
    match client.wait(uid) {
        Ok(Response::Memory(block)) => {
            assert_eq!(block.data.len(), 0x8000);
            assert_eq!(block.data[0x1234], 0x34);
        }
        other => panic!("unexpected {:?}", other),
    }

    let uid = client.dispatcher.step();
    assert_eq!(client.wait(uid), Ok(Response::Ok));
    client.pump_until(|d| d.observer().last_status() == Some(true));

    stop.store(true, Ordering::SeqCst);
    handle.join().unwrap();
}

#[test]
fn reconnect_after_disconnect() {
    let stop = Arc::new(AtomicBool::new(false));
    let (addr, handle) = spawn_target(stop.clone());

    let mut first = Client::connect(addr);
    let uid = first.dispatcher.read_status();
    assert!(first.wait(uid).is_ok());
    drop(first);

    // the stub notices the hangup, and accepts the next client
    let mut second = Client::connect(addr);
    assert_eq!(second.obs().connected, vec![true]);
    let uid = second.dispatcher.send_raw_command("nosuchcommand");
    assert_eq!(second.wait(uid), Err(ResponseError::Failed));
    let uid = second.dispatcher.send_raw_command("status");
    match second.wait(uid) {
        Ok(Response::Raw(frame)) => assert!(frame.starts_with(b"OK\x01")),
        other => panic!("unexpected {:?}", other),
    }

    stop.store(true, Ordering::SeqCst);
    handle.join().unwrap();
}

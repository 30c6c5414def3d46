//! A line-based client: every line typed on stdin is sent to the target as a
//! raw command, and everything the target says is printed.
//!
//! `regs`, `bplist` and `symlist` are sent as typed requests, so their
//! responses are shown parsed.

use std::io::{self, BufRead, Read};
use std::net::TcpStream;
use std::time::Duration;

use rdbstub::client::{Dispatcher, Observer, Response, ResponseError};
use rdbstub::protocol::Notification;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error>>;

struct Printer;

impl Observer for Printer {
    fn connection_changed(&mut self, connected: bool) {
        println!("* {}", if connected { "connected" } else { "disconnected" });
    }

    fn notification(&mut self, notification: &Notification) {
        match notification {
            Notification::Log(text) => print!("{}", text),
            other => println!("* {:?}", other),
        }
    }

    fn response(&mut self, uid: u64, command: &str, response: Result<Response, ResponseError>) {
        match response {
            Ok(Response::Raw(frame)) => {
                let text: String = frame
                    .iter()
                    .map(|&b| if b == 1 { ',' } else { b as char })
                    .collect();
                println!("[{}] {}: {}", uid, command, text)
            }
            Ok(response) => println!("[{}] {}: {:#?}", uid, command, response),
            Err(e) => println!("[{}] {}: {}", uid, command, e),
        }
    }
}

/// Read from the target until every pending command is answered, or it
/// goes quiet.
fn drain(dispatcher: &mut Dispatcher<TcpStream, Printer>, reader: &mut TcpStream) -> DynResult<()> {
    let mut buf = [0; 4096];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                dispatcher.detach();
                return Err("target closed the connection".into());
            }
            Ok(n) => dispatcher.receive(&buf[..n]),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                if dispatcher.pending_count() == 0 {
                    return Ok(());
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn main() -> DynResult<()> {
    pretty_env_logger::init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| format!("127.0.0.1:{}", rdbstub::DEFAULT_PORT));

    let stream = TcpStream::connect(&addr)?;
    let mut reader = stream.try_clone()?;
    reader.set_read_timeout(Some(Duration::from_millis(200)))?;

    let mut dispatcher = Dispatcher::new(Printer);
    dispatcher.attach(stream)?;
    drain(&mut dispatcher, &mut reader)?;

    for line in io::stdin().lock().lines() {
        let line = line?;
        match line.trim() {
            "" => {}
            "regs" => {
                dispatcher.read_registers();
            }
            "bplist" => {
                dispatcher.read_breakpoints();
            }
            "symlist" => {
                dispatcher.read_symbols();
            }
            cmd => {
                dispatcher.send_raw_command(cmd);
            }
        }
        drain(&mut dispatcher, &mut reader)?;
    }

    Ok(())
}

use std::time::Duration;

use rdbstub::stub::RdbStub;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error>>;

mod emu;
mod rdb;

use emu::Emu;
use rdb::EmuEvents;

/// Roughly 50 frames per second.
const FRAME_TIME: Duration = Duration::from_millis(20);

fn main() -> DynResult<()> {
    pretty_env_logger::init();

    let port = match std::env::args().nth(1) {
        Some(port) => port.parse()?,
        None => rdbstub::DEFAULT_PORT,
    };

    let mut emu = Emu::new();

    let builder = RdbStub::<Emu>::builder().port(port);
    #[cfg(unix)]
    let builder = builder.with_output_capture(Box::new(rdbstub::stub::capture::StdioCapture::new()?));
    let mut stub = builder.build()?;

    let addr = stub.listen()?;
    eprintln!("Waiting for a debugger on {}...", addr);

    while !emu.quit {
        if !stub.poll(&mut emu) {
            if emu.run_frame().is_some() {
                stub.break_loop::<EmuEvents>(&mut emu);
            }
            stub.check_remote_break::<EmuEvents>(&mut emu);
        }
        std::thread::sleep(FRAME_TIME);
    }

    stub.teardown();
    Ok(())
}

//! Unsolicited `!` frames. Unlike command responses, each notification is a
//! complete frame, terminator included.

use super::prelude::*;
use crate::protocol::{Notification, ResponseWriterError};
use crate::target::ext::profiler::ProfileLine;

/// Captured output is forwarded in chunks of at most this many bytes.
const LOG_CHUNK: usize = 127;

fn write_profile_line<C: Connection>(
    res: &mut ResponseWriter<'_, C>,
    delta: u32,
    line: &ProfileLine,
) -> Result<(), ResponseWriterError<C::Error>> {
    res.write_num(delta)?;
    res.write_sep()?;
    res.write_num(line.count)?;
    res.write_sep()?;
    res.write_num(line.cycles)?;
    res.write_sep()
}

impl<'a, T: Target, C: Connection> RdbStubImpl<'a, T, C> {
    pub(crate) fn notify_connected(
        &mut self,
        res: &mut ResponseWriter<'_, C>,
    ) -> Result<(), Error<C::Error>> {
        res.write_str(Notification::CONNECTED)?;
        res.write_sep()?;
        res.write_num(crate::PROTOCOL_ID)?;
        res.write_term()?;
        Ok(())
    }

    pub(crate) fn notify_status(
        &mut self,
        res: &mut ResponseWriter<'_, C>,
        target: &T,
    ) -> Result<(), Error<C::Error>> {
        res.write_str(Notification::STATUS)?;
        res.write_sep()?;
        res.write_num(!self.break_active as u8)?;
        res.write_sep()?;
        res.write_num(target.pc())?;
        res.write_sep()?;
        res.write_num(target.fast_forward() as u8)?;
        res.write_term()?;
        Ok(())
    }

    pub(crate) fn notify_config(
        &mut self,
        res: &mut ResponseWriter<'_, C>,
        target: &T,
    ) -> Result<(), Error<C::Error>> {
        let config = target.machine_config();
        res.write_str(Notification::CONFIG)?;
        res.write_sep()?;
        res.write_num(config.machine_type)?;
        res.write_sep()?;
        res.write_num(config.cpu_level)?;
        res.write_sep()?;
        res.write_num(config.st_ram_end)?;
        res.write_term()?;
        Ok(())
    }

    /// Addresses are sent as deltas from the previous reported line,
    /// starting from 0. Lines with no hits are skipped.
    pub(crate) fn notify_profile(
        &mut self,
        res: &mut ResponseWriter<'_, C>,
        target: &mut T,
    ) -> Result<(), Error<C::Error>> {
        res.write_str(Notification::PROFILE)?;
        res.write_sep()?;

        match target.support_profiler() {
            None => {
                res.write_num(0u8)?;
                res.write_sep()?;
            }
            Some(ops) => {
                res.write_num(ops.profiler_enabled() as u8)?;
                res.write_sep()?;

                let mut last_addr = 0u32;
                let mut err = None;
                ops.for_each_line(&mut |line: ProfileLine| {
                    if err.is_some() || line.count == 0 {
                        return;
                    }
                    let delta = line.addr.wrapping_sub(last_addr);
                    last_addr = line.addr;
                    err = write_profile_line(res, delta, &line).err();
                });
                if let Some(e) = err {
                    return Err(e.into());
                }
            }
        }

        res.write_term()?;
        Ok(())
    }

    /// Forward whatever output was captured since the last call, as one or
    /// more `!log` frames.
    pub(crate) fn notify_log(
        &mut self,
        res: &mut ResponseWriter<'_, C>,
    ) -> Result<(), Error<C::Error>> {
        let capture = match self.capture_mut() {
            Some(capture) => capture,
            None => return Ok(()),
        };

        let mut buf = [0; LOG_CHUNK];
        loop {
            let n = capture.read_pending(&mut buf);
            if n == 0 {
                break;
            }
            // the text ends at the first NUL, like any other C string
            let text = &buf[..n];
            let text = match text.iter().position(|&b| b == 0) {
                Some(end) => &text[..end],
                None => text,
            };

            res.write_str(Notification::LOG)?;
            res.write_sep()?;
            res.write_bytes(text)?;
            res.write_term()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::*;
    use crate::protocol::ResponseWriter;
    use crate::stub::core_impl::RdbStubImpl;

    fn notify(
        stub: &mut TestStub,
        f: impl FnOnce(&mut TestStub, &mut ResponseWriter<'_, Vec<u8>>),
    ) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0; 64];
        {
            let mut res = ResponseWriter::new(&mut out, &mut buf);
            f(stub, &mut res);
            res.flush().unwrap();
        }
        out
    }

    #[test]
    fn connected_status_config() {
        let mut target = MockTarget::new();
        let mut stub = stub();

        let out = notify(&mut stub, |stub, res| stub.notify_connected(res).unwrap());
        assert_eq!(out, b"!connected\x011005\0");

        target.ffwd = true;
        let out = notify(&mut stub, |stub, res| stub.notify_status(res, &target).unwrap());
        assert_eq!(out, b"!status\x011\x01E00030\x011\0");

        stub.break_active = true;
        target.ffwd = false;
        let out = notify(&mut stub, |stub, res| stub.notify_status(res, &target).unwrap());
        assert_eq!(out, b"!status\x010\x01E00030\x010\0");

        let out = notify(&mut stub, |stub, res| stub.notify_config(res, &target).unwrap());
        assert_eq!(out, b"!config\x010\x010\x0180000\0");
    }

    #[test]
    fn profile_skips_empty_lines_and_delta_encodes() {
        let mut target = MockTarget::new();
        let mut stub = stub();
        target.profiling = true;

        let out = notify(&mut stub, |stub, res| {
            stub.notify_profile(res, &mut target).unwrap()
        });
        assert_eq!(
            out,
            b"!profile\x011\x01E00000\x013\x0110\x014\x011\x018\x01\0".to_vec()
        );
    }

    #[test]
    fn log_is_chunked_and_cut_at_nul() {
        let mut long = vec![b'x'; 130];
        long.extend_from_slice(b"\0ignored");
        let mut stub: TestStub = RdbStubImpl::new(Some(Box::new(ScriptedCapture(long))));

        let out = notify(&mut stub, |stub, res| stub.notify_log(res).unwrap());
        let mut expected = b"!log\x01".to_vec();
        expected.extend_from_slice(&[b'x'; 127]);
        expected.extend_from_slice(b"\0!log\x01xxx\0");
        assert_eq!(out, expected);

        // nothing left to forward
        let out = notify(&mut stub, |stub, res| stub.notify_log(res).unwrap());
        assert!(out.is_empty());
    }

    #[test]
    fn log_without_capture_is_silent() {
        let mut stub = stub();
        let out = notify(&mut stub, |stub, res| stub.notify_log(res).unwrap());
        assert!(out.is_empty());
    }
}

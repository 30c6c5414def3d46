//! Scoped capture of the host's console output, forwarded to the client as
//! `!log` notifications.

use std::io;

/// A source of captured console output.
///
/// Capture starts with [`begin`](OutputCapture::begin), and lasts until the
/// returned [`CaptureGuard`] is dropped. The stub starts a capture for every
/// accepted connection, and holds the guard for as long as the connection
/// lives.
pub trait OutputCapture {
    /// Start redirecting output.
    fn begin(&mut self) -> io::Result<CaptureGuard>;

    /// Copy pending captured output into `buf`, without blocking. Returns `0`
    /// once nothing is pending.
    fn read_pending(&mut self, buf: &mut [u8]) -> usize;
}

/// Undoes a redirection when dropped.
#[must_use = "output is only captured while the guard is alive"]
pub struct CaptureGuard {
    restore: Option<Box<dyn FnOnce()>>,
}

impl CaptureGuard {
    pub fn new(restore: impl FnOnce() + 'static) -> CaptureGuard {
        CaptureGuard {
            restore: Some(Box::new(restore)),
        }
    }

    /// A guard with nothing to restore.
    pub fn noop() -> CaptureGuard {
        CaptureGuard { restore: None }
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        if let Some(restore) = self.restore.take() {
            restore()
        }
    }
}

impl core::fmt::Debug for CaptureGuard {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CaptureGuard")
            .field("active", &self.restore.is_some())
            .finish()
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        pub use self::stdio::StdioCapture;

        mod stdio {
            use std::io::{self, Read, Write};
            use std::os::unix::io::{AsRawFd, RawFd};

            use nix::fcntl::{fcntl, FcntlArg, OFlag};
            use nix::libc::{STDERR_FILENO, STDOUT_FILENO};
            use nix::unistd::{close, dup, dup2};

            use super::{CaptureGuard, OutputCapture};

            /// Captures the process' stdout and stderr through a pipe.
            pub struct StdioCapture {
                reader: os_pipe::PipeReader,
                writer: os_pipe::PipeWriter,
            }

            impl StdioCapture {
                pub fn new() -> io::Result<StdioCapture> {
                    let (reader, writer) = os_pipe::pipe()?;

                    let fd = reader.as_raw_fd();
                    let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
                    fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;

                    Ok(StdioCapture { reader, writer })
                }
            }

            fn redirect(pipe: RawFd) -> nix::Result<()> {
                dup2(pipe, STDOUT_FILENO)?;
                dup2(pipe, STDERR_FILENO)?;
                Ok(())
            }

            fn restore(saved_out: RawFd, saved_err: RawFd) {
                let _ = io::stdout().flush();
                let _ = dup2(saved_out, STDOUT_FILENO);
                let _ = dup2(saved_err, STDERR_FILENO);
                let _ = close(saved_out);
                let _ = close(saved_err);
            }

            impl OutputCapture for StdioCapture {
                fn begin(&mut self) -> io::Result<CaptureGuard> {
                    io::stdout().flush()?;

                    let saved_out = dup(STDOUT_FILENO)?;
                    let saved_err = match dup(STDERR_FILENO) {
                        Ok(fd) => fd,
                        Err(e) => {
                            let _ = close(saved_out);
                            return Err(e.into());
                        }
                    };

                    if let Err(e) = redirect(self.writer.as_raw_fd()) {
                        restore(saved_out, saved_err);
                        return Err(e.into());
                    }

                    Ok(CaptureGuard::new(move || restore(saved_out, saved_err)))
                }

                fn read_pending(&mut self, buf: &mut [u8]) -> usize {
                    // Rust's stdout is line buffered
                    let _ = io::stdout().flush();
                    self.reader.read(buf).unwrap_or(0)
                }
            }

            #[cfg(test)]
            mod tests {
                use super::*;

                fn drain(capture: &mut StdioCapture) -> Vec<u8> {
                    let mut out = Vec::new();
                    let mut buf = [0; 64];
                    loop {
                        let n = capture.read_pending(&mut buf);
                        if n == 0 {
                            break out;
                        }
                        out.extend_from_slice(&buf[..n]);
                    }
                }

                #[test]
                fn captures_until_guard_drops() {
                    let mut capture = StdioCapture::new().unwrap();
                    assert!(drain(&mut capture).is_empty());

                    let guard = capture.begin().unwrap();
                    io::stdout().write_all(b"captured-line\n").unwrap();
                    let text = String::from_utf8_lossy(&drain(&mut capture)).into_owned();
                    assert!(text.contains("captured-line"));

                    drop(guard);
                    io::stdout().write_all(b"not-captured\n").unwrap();
                    let text = String::from_utf8_lossy(&drain(&mut capture)).into_owned();
                    assert!(!text.contains("not-captured"));
                }
            }
        }
    }
}

use crate::conn::Connection;
use alloc::boxed::Box;

impl<E> Connection for Box<dyn Connection<Error = E>> {
    type Error = E;

    fn write(&mut self, byte: u8) -> Result<(), Self::Error> {
        (**self).write(byte)
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        (**self).write_all(buf)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        (**self).flush()
    }

    fn on_session_start(&mut self) -> Result<(), Self::Error> {
        (**self).on_session_start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    #[test]
    fn forwards_to_inner() {
        let mut conn: Box<dyn Connection<Error = Infallible>> = Box::new(Vec::new());
        conn.write_all(b"status").unwrap();
        conn.write(0).unwrap();
        conn.flush().unwrap();
        conn.on_session_start().unwrap();
    }
}

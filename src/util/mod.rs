//! Private utility types used internally within `rdbstub`.

pub(crate) mod grow_buf;

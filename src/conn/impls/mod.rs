mod boxed;
mod tcpstream;
mod vec;

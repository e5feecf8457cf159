pub mod file_io;

pub mod fingerprint;

pub mod pool;

pub mod time;

#[cfg(test)]
mod file_io_test;

// src/constants.rs

/// Capacity of the control-connection receive buffer.
pub const SOCKBUF_CAPACITY: usize = 1024;

/// Longest command argument the server will accept before declaring a
/// syntax error.
pub const MAX_ARG_LEN: usize = 2048;

pub const DEFAULT_FTP_PORT: u16 = 21;

/// Copy-buffer size for data-channel transfers.
pub const TRANSFER_BUF_SIZE: usize = 8192;

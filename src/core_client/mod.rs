// Client-side protocol engine: the user-PI command wrappers, the client
// half of the data-channel negotiator, and the interactive loop.

pub mod data;
pub mod ftp;
pub mod repl;

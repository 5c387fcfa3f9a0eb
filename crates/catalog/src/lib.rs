pub mod code;
pub mod feeds;
pub mod ranks;
pub mod sync;

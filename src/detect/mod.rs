// Format probing for downloaded assets.

pub mod ninepatch;

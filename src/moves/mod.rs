pub mod execute;
pub mod magic;
pub mod movegen;
pub mod perft;
pub mod san;
pub mod tables;
pub mod types;

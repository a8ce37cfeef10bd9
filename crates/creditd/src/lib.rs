pub mod cli;
pub mod drift;
pub mod logging;
pub mod server;
pub mod workspace;

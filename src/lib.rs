pub mod payload;
pub mod signal;
pub mod simulator;
pub mod hands;
pub mod net;
pub mod feed;
pub mod traits;
pub mod controller;
pub mod status;
pub mod config;

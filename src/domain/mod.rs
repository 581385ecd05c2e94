pub mod context;
pub mod payment;
pub mod pending;
pub mod ports;
pub mod session;

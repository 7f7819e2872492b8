pub mod client_ip;
pub mod countries;
pub mod signal;

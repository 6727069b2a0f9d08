pub mod errors;
pub mod stats;

pub mod inject;
pub mod schedule;
pub mod snmp;
pub mod tls;

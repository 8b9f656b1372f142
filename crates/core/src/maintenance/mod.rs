//! Housekeeping, reporting and change-request application

pub mod ports;

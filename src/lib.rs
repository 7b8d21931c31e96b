//! GlucoWatch bridge library
//! Acquires blood-glucose readings and device metadata from a GlucoWatch
//! sensor over BLE and reports them to an observer.

pub mod config;
pub mod core;
pub mod logging;
pub mod utils;

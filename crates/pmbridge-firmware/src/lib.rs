#![no_std]

extern crate alloc;

pub mod clock;
pub mod config;
pub mod hardware;
pub mod mqtt;
pub mod ota;
pub mod sensors;
pub mod wifi;

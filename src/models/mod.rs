pub mod device;
pub mod mount;
pub mod usage;
pub mod volume;

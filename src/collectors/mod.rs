pub mod capacity;
pub mod df;
pub mod lsblk;
pub mod mounts;
pub mod udev;
pub mod usb;

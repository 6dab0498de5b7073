mod activation_log;
mod credit;
mod device;
mod license;

pub use activation_log::*;
pub use credit::*;
pub use device::*;
pub use license::*;

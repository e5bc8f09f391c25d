pub mod adb;
pub mod encode;
pub mod overlay;
#[cfg(feature = "desktop")]
pub mod screenshot;
pub mod traits;
pub mod types;
#[cfg(feature = "desktop")]
pub mod window;

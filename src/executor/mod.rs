pub mod actions;
pub mod adb;
pub mod device;
#[cfg(feature = "desktop")]
pub mod input;
pub mod registry;
pub mod text_input;

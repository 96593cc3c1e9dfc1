pub mod dsl;
pub mod error;
pub mod logging;
pub mod settings;

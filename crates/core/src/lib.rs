#![forbid(unsafe_code)]

pub mod builder;
pub mod error;
pub mod model;
pub mod notify;
pub mod quiz;
pub mod scorm;
pub mod time;
pub mod tracking;

pub use error::Error;
pub use time::Clock;

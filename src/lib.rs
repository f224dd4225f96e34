pub mod config;
pub mod error;
pub mod gateway;
pub mod location;
pub mod report;
pub mod util;

pub use error::{ReporterError, TransmitError};
pub use location::LocationReading;
pub use report::{Reporter, ReportSettings};

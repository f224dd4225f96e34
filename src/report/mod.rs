pub mod reporter;
pub mod state;
pub mod transmitter;


pub use reporter::{Reporter, ReporterStatus, StartupSeed, SubscriptionParams};
pub use state::{ReportSettings, ReportingState, StateSnapshot};
pub use transmitter::{HttpTransmitter, LocationPayload, Transmit};

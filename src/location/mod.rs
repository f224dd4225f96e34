pub mod arbiter;
pub mod reading;

pub use arbiter::{
    on_new_reading, select_best, Decision, FreshnessCheck, ProviderSnapshot, SelectionPolicy,
};
pub use reading::LocationReading;

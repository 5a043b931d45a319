pub mod apikey;
pub mod device_session;
pub mod janitor;

pub use apikey::ApiKeyRegistry;
pub use device_session::{DevicePollOutcome, DeviceSessionStore};

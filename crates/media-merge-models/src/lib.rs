pub mod media;
pub mod name_key;
pub mod record;
pub mod server_state;
pub mod snapshot;

pub use media::MediaType;
pub use name_key::NameKeyCache;
pub use record::{MediaRecord, SyncStatus};
pub use server_state::{ServerMediaState, UserDataPayload, TICKS_PER_MSEC};
pub use snapshot::{ItemSnapshot, ServerSnapshot, SnapshotError, UserDataSnapshot};

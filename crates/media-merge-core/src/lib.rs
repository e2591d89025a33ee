pub mod arena;
pub mod merge;
pub mod progress;
pub mod report;

pub use arena::{RecordArena, RecordId};
pub use merge::{MergeError, MergeMedia, MergeStats, MergedMedia, ServerIndex, MERGE_TITLE};
pub use progress::{CancelToken, Cancellable, NoopSink, Progress, ProgressSink};
pub use report::{find_name_collisions, MergeReport, NameCollision};

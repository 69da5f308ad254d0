pub mod error;
pub mod layout;
pub mod digits;
pub mod frame;
pub mod plan;
pub mod store;
pub mod carrier;
pub mod recovery;
pub mod channel;

pub use error::{Error, Result};
pub use layout::Layout;
pub use frame::{Frame, FrameCodec};
pub use plan::{ChunkPlanner, DigitString, Plan, Reassembled};
pub use store::{CarrierTimes, FsStore, MemoryStore, TimestampStore};
pub use carrier::CarrierMapper;
pub use recovery::ScanReport;
pub use channel::{ChannelOptions, CovertChannel, ExtractReport, HideReport, Recovered};

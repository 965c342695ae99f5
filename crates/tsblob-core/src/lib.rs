pub mod config;
pub mod logging;

pub mod checksum;
pub mod engine;
pub mod error;
pub mod meta;
pub mod storage;
pub mod volume;
pub mod z85;

pub use engine::{
    BlockDownloader, BlockOutcome, BlockStatus, BlockTransferContext, BlockUploader, Engine,
    FileTransferContext, TransferStats,
};
pub use error::{BackendError, ErrorKind, TransferError};
pub use meta::{BlockMeta, BlockRange, FileMeta};
pub use storage::{ReadAt, WriteAt};
pub use volume::{BlockLister, InfluxVolume, MemoryVolume};

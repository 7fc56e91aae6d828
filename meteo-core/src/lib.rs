//! Weather-station core: sample types, frame codec, protocol contracts, the
//! persistent device log and config block, the host mirror log, and window
//! aggregation. No I/O; both node daemons build on this.

pub mod aggregate;
pub mod config;
pub mod devlog;
pub mod mirror;
pub mod protocol;
pub mod sample;
pub mod store;
pub mod wire;

pub use aggregate::{summarize, Aggregates, Stats, TimeWindow};
pub use config::{ConfigBlock, Restore, MAGIC_MARKER};
pub use devlog::{Append, DeviceLog, LogError, LogInfo};
pub use mirror::{MirrorInfo, MirrorLog};
pub use protocol::{
    DecodeError, Opcode, Request, Response, TransferKind, STATUS_ERROR, STATUS_OK,
};
pub use sample::{Sample, TimeOfDay, LUMINOSITY_MAX, SAMPLE_WIRE_SIZE};
pub use store::{MemStore, NvStore, StoreError};
pub use wire::{encode_frame, FrameReassembler, FRAME_END, FRAME_START, MAX_FRAME_BODY};

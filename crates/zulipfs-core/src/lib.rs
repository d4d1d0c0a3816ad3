mod adapter;
mod error;
mod hierarchy;
mod memory;
mod messages;
mod names;
mod path;
mod render;
mod transport;

pub use adapter::{AdapterSettings, Attributes, FilesystemAdapter, NodeKind, DIRECTORY_SIZE};
pub use error::{FsError, TransportError};
pub use hierarchy::{Channel, HierarchyCache, HierarchySettings, Topic};
pub use memory::{CallCounts, MemoryTransport, SentMessage};
pub use messages::{ContentSnapshot, MessageCache};
pub use names::{NameCodec, COLON_ESCAPE, SEPARATOR_ESCAPE};
pub use path::FsPath;
pub use render::{MessageRenderer, ACCUMULATE_SEPARATOR};
pub use transport::{ChannelRecord, MessageRecord, MessagingTransport, SendReceipt, TopicRecord};

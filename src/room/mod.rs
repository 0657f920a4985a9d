mod archive;
mod code;
mod coordinator;
mod model;
mod store;

pub use archive::{ArchiveStore, ArchivedRoom};
pub use coordinator::{RoomCoordinator, UserProfile};
pub use model::{now_ms, ChatMessage, Player, Room, RoomStatus, SolvedEntry};
pub use store::RoomStore;

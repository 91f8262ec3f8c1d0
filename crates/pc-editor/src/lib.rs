pub mod controller;
pub mod input;
pub mod loader;
pub mod persist;
pub mod remote;
pub mod scene;
pub mod session;
pub mod shortcuts;

pub use controller::{Controller, Cursor, Mutation, Overlay, Tool};
pub use input::{FocusTarget, InputEvent, Modifiers, PointerButton};
pub use persist::{MemoryStorage, Persistence, StorageBackend, StorageError};
pub use remote::{HttpRequest, Method, RemoteError, RemoteSync};
pub use scene::{ImageInfo, NodeKind, SceneGraph, SceneNode};
pub use session::{Editor, EventOutcome};

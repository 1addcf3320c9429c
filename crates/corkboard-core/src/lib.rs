//! Corkboard Core Library
//!
//! Platform-agnostic canvas state engine for the Corkboard collaborative
//! whiteboard: the node collection, its history, pointer manipulation,
//! connector geometry, freehand capture and snapshot sync.

pub mod board;
pub mod camera;
pub mod canvas;
pub mod collaboration;
pub mod config;
pub mod connector;
pub mod drawing;
pub mod history;
pub mod input;
pub mod insertion;
pub mod manipulation;
pub mod nodes;
pub mod presence;
pub mod scene;
pub mod selection;
pub mod snap;
pub mod storage;
pub mod store;
pub mod sync;
pub mod transport;

pub use board::{Board, BoardStatus};
pub use camera::Camera;
pub use canvas::{Canvas, Tool};
pub use collaboration::{CollaborationSync, PeerProfile};
pub use config::EngineConfig;
pub use connector::{ConnectorHandle, ResolvedConnector, resolve_connector};
pub use drawing::DrawingCapture;
pub use history::{HistoryItem, HistoryManager, NodeMap};
pub use input::{Key, Modifiers, PointerEvent, ViewportAction};
pub use insertion::{InsertionCallback, InsertionOutcome, InsertionQueue};
pub use manipulation::{Alignment, ManipulationEngine, ManipulationState};
pub use nodes::{Geometry, NodeId, NodeKind, NodePayload, NodeStyle, ValidationError, VisualNode};
pub use scene::{Scene, build_scene};
pub use selection::{ResizeHandle, SelectionSet};
pub use snap::{AlignmentGuide, SnapResult, snap_to_grid};
pub use store::{NodeDraft, NodePatch, NodeStore};
pub use sync::{ConnectionState, DeliveryStatus, PeerId, SyncEvent, SyncMessage};
pub use transport::{MemoryRelay, MemoryTransport, Transport, TransportError};

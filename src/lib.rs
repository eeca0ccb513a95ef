//! # scene-depot
//!
//! A file-backed storage backend for 3D model comparison scenes: uploaded
//! mesh/material/texture batches, named scene documents, per-model reference
//! photos ("original images"), and zip export of whole scenes.
//!
//! The filesystem is the sole source of truth. Scenes are JSON documents in
//! a flat directory; uploads live in timestamp-named batch directories; the
//! scene/image association is encoded in filename prefixes and kept in sync
//! by the rename/delete/migrate operations in [`depot::Depot`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use scene_depot::prelude::*;
//!
//! let depot = Depot::open(DepotConfig::default()).unwrap();
//! let receipt = depot
//!     .accept_upload("session-1", "chair.obj", b"o chair\n")
//!     .unwrap();
//! println!("stored at {}", receipt.filepath);
//! ```

pub mod depot;
pub mod error;
pub mod export;
pub mod naming;
pub mod obj;
#[cfg(feature = "server")]
pub mod server;
pub mod session;
pub mod store;
pub mod types;

pub mod prelude {
    //! Commonly used types
    pub use crate::depot::{Depot, DepotConfig};
    pub use crate::error::{DepotError, Result};
    pub use crate::types::{
        DeleteOutcome, ExportArchive, ModelEntry, OriginalImageEntry, RenameOutcome,
        SceneDocument, SceneSummary, UploadReceipt,
    };
}

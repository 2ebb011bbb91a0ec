//! Read and rewrite the part names (`trackName`) stored in MuseScore `.mscz` files.

pub mod backup;
pub mod config;
pub mod document;
pub mod error;
pub mod hash;
pub mod numbering;
pub mod reader;
pub mod record;
pub mod rewriter;
pub mod session;

pub use config::EditorSettings;
pub use error::{DocumentError, EditError};
pub use numbering::apply_bulk_numbering;
pub use reader::{load, load_with};
pub use record::{PartRecord, PartSet};
pub use rewriter::{save, SaveReport};
pub use session::{EditorSession, PendingDecision, Resolution};

//! Foreground side of the offload protocol: per-panel workflow state
//! machines, the pure result presenter, file import/export of parameter
//! blobs, and the session router that demultiplexes executor messages to
//! their panels.

mod artifacts;
mod controller;
mod error;
mod presenter;
mod session;

pub use artifacts::{export_params, import_params_file};
pub use controller::{OpState, PanelController, ParamsOrigin};
pub use error::PanelError;
pub use presenter::{PresentationUpdate, Presenter};
pub use session::{Session, SessionUpdate};

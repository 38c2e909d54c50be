pub mod cloud;
pub mod detect;
pub mod device;
pub mod error;
pub mod history;
pub mod hr;
pub mod io;
pub mod metrics;
pub mod offline;
pub mod queue;
pub mod session;
pub mod signal;

pub use error::PulseError;
pub use session::{AcquisitionConfig, MeasureMode, Phase, Session, SessionEvent};
pub use signal::{Beats, HrvSummary, PpgSeries, PpiSeries, RawSample};

//! The scan pipeline: locate, extract, enrich, render, advance.

pub mod describe;
pub mod extract;
pub mod fetch;
pub mod harvest;
pub mod locator;
pub mod navigate;
pub mod orchestrator;
pub mod record;
pub mod session;
pub mod sink;

pub use describe::{DescriptionService, OllamaClient};
pub use fetch::{HttpImageFetcher, ImageFetcher};
pub use harvest::{harvest, DirectorySink, HarvestReport, ImageSink};
pub use orchestrator::{DescribeInputs, Orchestrator, RunOutcome, StopReason};
pub use record::{DetailGroup, ImageInfo, MapLocation, PhotoRecord};
pub use session::{ScanPhase, ScanState, ScanStatus, SessionContext};
pub use sink::{RecordSink, TracingSink};

pub mod call;
pub mod enrichment;
pub mod record;
pub mod schedule;

pub use call::{normalize, CallDirection, CallEvent, NormalizedKey};
pub use enrichment::EnrichmentResult;
pub use record::{Medications, RecordMatch, DETAIL_FIELDS};
pub use schedule::ScheduleEntry;

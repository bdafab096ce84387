//! Domain model (IDs, tile projection, hazard data, records, jobs, errors).

pub mod errors;
pub mod hazard;
pub mod ids;
pub mod job;
pub mod record;
pub mod tile;

pub use self::errors::ErrorKind;
pub use self::hazard::{HazardData, HazardLayer, build_hazard_data};
pub use self::ids::{DedupKey, JobId, LookupId};
pub use self::job::LookupJob;
pub use self::record::{FailureReason, LookupRecord, LookupStatus};
pub use self::tile::{DEFAULT_ZOOM, MAX_ZOOM, TileCoord, tile_x, tile_y};

//! Core types for the stream connectivity kernel.

pub mod ids;
pub mod geometry;
pub mod species;
pub mod barrier;
pub mod record;
pub mod accessibility;

pub use ids::{EdgeId, BarrierId, MainstemId, SpeciesCode};
pub use geometry::{Coord, CoordKey, Vertex, is_nodata, planar_length};
pub use species::{Species, SpeciesTable, SpeciesIndex, HabitatEnvelope, Range};
pub use barrier::{Barrier, BarrierKind, Passability, BreakPoint, SplitPoint};
pub use record::StreamRecord;
pub use accessibility::Accessibility;

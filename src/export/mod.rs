//! Exporting a project: the shared save context, target writers and the
//! scheduler that drives them.

pub mod context;
pub mod error;
pub mod hook;
pub mod reclaim;
pub mod scheduler;
pub mod writer;

pub use context::{CreatedFileSet, ErrorList, SaveContext};
pub use error::{SaveError, SaveFailure};
pub use scheduler::{select_targets, LiveProject, SaveMode, ScheduleInputs, Scheduler};
pub use writer::{TargetSummary, TargetWriter, WriteContext, WriterRegistry};

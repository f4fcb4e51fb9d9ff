pub mod error;
pub mod executor;
pub mod ops;
pub mod stage;
pub mod store;
pub mod table;
pub mod validate;
pub mod value;

pub use error::{PipelineError, StoreError, Warning, Warnings};
pub use executor::{ExecutionReport, Pipeline, PipelineRunner, StageLogEntry};
pub use stage::{StageDef, StageKind};
pub use store::{DatasetId, DatasetStore, MemoryStore};
pub use table::{Record, Table, cell};
pub use validate::validate;
pub use value::{GroupKey, Value};

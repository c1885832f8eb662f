//! ConvertHub: unit conversions and file conversion jobs.
//!
//! Two halves share this crate. The conversion engine evaluates
//! administrator-written formulas against a read-only catalog of unit
//! conversion types. The file pipeline drives conversion jobs through
//! a small state machine with an atomic claim, so a job is converted
//! at most once no matter how many workers race for it.

mod catalog;
mod converter;
mod engine;
mod formula;
mod history;
mod job;
mod pipeline;
mod properties;
mod registry;
mod units;
mod worker;

pub use catalog::{Catalog, CategoryDef, TypeDef};
pub use converter::{ConvertError, Converter, ConverterDecl, normalize_format};
pub use engine::{ConversionEngine, ConversionError, ConversionResult};
pub use formula::{Formula, FormulaError, RESULT_SCALE, evaluate};
pub use history::{
    ClientInfo, ConversionRecord, HistoryError, HistoryStore, MemoryHistoryStore, NewRecord,
};
pub use job::{FileJob, JobError, JobOutcome, JobStatus, JobStore, MemoryJobStore, NewFileJob};
pub use pipeline::{FileConversionPipeline, PipelineError};
pub use properties::{Properties, PropertiesExt, Value};
pub use registry::ConverterRegistry;
pub use units::{CatalogError, ConversionCategory, ConversionType, RegistryError, UnitRegistry};
pub use worker::PipelineWorker;

//! # charter-guard
//!
//! Request-level enforcement on top of `charter-core`: the SQL safety
//! analyzer with its write-confirmation handshake, and the three-stage
//! validation pipeline that checks a farmer's query, the SQL generated for
//! it and the response before it is sent.
//!
//! ```rust,no_run
//! use charter_guard::{PipelineContext, ValidationPipeline};
//!
//! let pipeline = ValidationPipeline::standard().unwrap();
//! let mut request = pipeline.start(PipelineContext::for_farmer("1")).unwrap();
//!
//! request.query("Which fields need irrigation this week?").unwrap();
//! let sql = request.sql("UPDATE fields SET irrigated = true WHERE farmer_id = 1").unwrap();
//! assert!(sql.flags.needs_confirmation);
//!
//! request.confirm_write("UPDATE").unwrap();
//! request.sql("UPDATE fields SET irrigated = true WHERE farmer_id = 1").unwrap();
//! request.response("Fields 3 and 7 are scheduled for irrigation.").unwrap();
//! assert!(request.is_done());
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod sql;

pub use config::{CharterConfig, GuardSettings};
pub use context::PipelineContext;
pub use error::GuardError;
pub use pipeline::{GuardedRequest, Stage, StageFlags, StageResult, ValidationPipeline};
pub use sql::{SqlAnalyzer, SqlAssessment, StatementKind};

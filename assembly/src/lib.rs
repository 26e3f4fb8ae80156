//! Message assembly and batch stem provisioning.
//!
//! This crate ties the stem pipeline together:
//!
//! - [`Template`]: validated phrasing/timing documents
//! - [`resolve`]: placeholder substitution into concrete stem requests
//! - [`Assembler`]: single-message assembly (resolve → cache → merge)
//! - [`run_batch`]: bounded-concurrency cache population with retry and
//!   partial-failure isolation
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stemline_assembly::{bindings, Assembler, Template};
//! use stemline_store::{FsStemStore, StemCache};
//! use stemline_synth::HttpSynthesizer;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(FsStemStore::open("stems")?);
//! let synth = Arc::new(HttpSynthesizer::new("https://tts.example.com", "key")?);
//! let assembler = Assembler::new(Arc::new(StemCache::new(store, synth)));
//!
//! let template = Template::from_json(&std::fs::read_to_string("templates/double_anchor.json")?)?;
//! let output = assembler
//!     .assemble(&template, &bindings([("name", "John"), ("developer", "Hilton")]))
//!     .await?;
//! println!("{} stems, {:?}", output.stems.len(), output.duration());
//! # Ok(())
//! # }
//! ```

pub mod assemble;
pub mod batch;
pub mod resolve;
pub mod template;

pub use assemble::{Assembler, AssemblyError, AssemblyOutput, StemReport};
pub use batch::{
    cartesian, run_batch, BatchOptions, BatchReport, JobReport, JobStatus, RetryPolicy,
};
pub use resolve::{bindings, resolve, AssemblyRequest, Bindings, ResolvedSegment};
pub use template::{Segment, Template, TemplateError, TimingEntry};

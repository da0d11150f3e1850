#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::doc_markdown,
    clippy::module_name_repetitions
)]

//! statewire
//!
//! statewire compiles one description of an interactive exhibit (named
//! states, each assigning typed values and events to the exhibit's boards
//! and its control surface) into firmware for the primary and secondary
//! boards, a browser control-surface table and a maintenance console. All
//! of them share one wire protocol whose ids come from declaration order
//! and whose compatibility token is the model's BuildId.
//!
//! Main pieces:
//! - description parsing and validation (`parser`, `model`)
//! - BuildId and board topology (`build_id`, `topology`)
//! - code generators (`codegen`, orchestrated by `compile`)
//! - the wire protocol (`frame`, `decoder`, `handshake`, `transport`)
//! - the maintenance console runtime (`console`)
//!
//! ```no_run
//! use statewire::compile::{compile, write_outputs, CompileOptions};
//! let text = std::fs::read_to_string("exhibit.states")?;
//! let options = CompileOptions { deployment: "Exhibit".into(), flat: false };
//! let compilation = compile(&text, &options)?;
//! write_outputs(&compilation, std::path::Path::new("out"))?;
//! # Ok::<(), statewire::StatewireError>(())
//! ```

pub mod build_id;
pub mod codegen;
pub mod compile;
pub mod config;
pub mod console;
pub mod decoder;
pub mod deployment;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod model;
pub mod parser;
pub mod scalar;
pub mod toml_helpers;
pub mod topology;
pub mod transport;

pub use build_id::build_id;
pub use error::StatewireError;
pub use model::{Device, DeviceRole, Model};
pub use parser::parse_description;
pub use scalar::{ScalarType, ScalarValue};

//! Intrudr Engine - request templating and ordered concurrent HTTP fuzzing
//!
//! A raw HTTP request is parsed into a template whose parameters and
//! `^^wrapped^^` spans become tokens. Value lists for the tokens are combined
//! by an attack mode into jobs, the jobs are sent by a pool of workers, and
//! the results are handed to sinks strictly in job order.

pub mod types;
pub mod traits;
pub mod error;
pub mod parser;
pub mod substitution;
pub mod payload;
pub mod attack_modes;
pub mod execution;
pub mod sequencer;
pub mod sink;


pub use types::{
    ConcreteRequest, HttpHeaders, Job, RequestTemplate, ResultRecord, Token, TokenKind,
};

pub use traits::{format_duration, AttackSummary, ResultSink};

pub use error::{AttackError, AttackResult};

pub use parser::{RequestParser, PLACEHOLDER_MARKER};

pub use substitution::{determine_scheme, resolve_url, substitute, RequestBuilder};

pub use payload::{
    DetectedGenerator, ManualGenerator, ValueGenerator, ValueGeneratorFactory, ValueResolver,
    ValueSource, WordlistGenerator,
};

pub use attack_modes::{
    AttackMode, AttackModeExecutor, AttackModeFactory, AttackPlan, BatteringRamMode,
    ClusterBombMode, PitchforkMode, SniperMode, MAX_JOBS,
};

pub use execution::{AttackEngine, AttackReport, DispatchConfig, Dispatcher, USER_AGENTS};

pub use sequencer::Sequencer;

pub use sink::{sanitize_filename, DirectorySink, SUMMARY_FILENAME};

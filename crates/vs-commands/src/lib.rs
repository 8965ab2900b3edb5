//! vs-commands: the variant study command engine.
//!
//! A variant is a base study plus an ordered log of [`Command`]s. This crate
//! defines the command kinds, their wire format, and the engines that revert,
//! extract and diff them. Replaying a log is done by `vs-app`.

pub mod command;
pub mod common;
pub mod context;
pub mod diff;
pub mod dto;
pub mod error;
pub mod extractor;
pub mod factory;
pub mod reverter;
pub mod utils;

pub use command::Command;
pub use common::{
    BindingConstraintOperator, CommandName, CommandOutput, DistrictBaseFilter, ExtraData,
    TimeStep,
};
pub use context::{CommandContext, HOURS_IN_YEAR, MatrixConstants};
pub use diff::{DiffOutcome, compact, diff};
pub use dto::{COMMAND_VERSION, CommandArgs, CommandDTO};
pub use error::{CommandError, CommandResult};
pub use extractor::CommandExtractor;
pub use factory::CommandFactory;
pub use reverter::CommandReverter;

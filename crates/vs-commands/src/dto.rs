//! Wire format of a command log entry.

use crate::common::CommandName;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Argument schema version this build reads and writes.
pub const COMMAND_VERSION: u32 = 1;

/// One argument bag, or a batch of bags for consecutive commands of one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandArgs {
    One(Map<String, Value>),
    Many(Vec<Map<String, Value>>),
}

impl CommandArgs {
    pub fn len(&self) -> usize {
        match self {
            CommandArgs::One(_) => 1,
            CommandArgs::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_vec(self) -> Vec<Map<String, Value>> {
        match self {
            CommandArgs::One(args) => vec![args],
            CommandArgs::Many(items) => items,
        }
    }

    /// Append another bag, turning a single bag into a batch.
    pub fn push(&mut self, args: Map<String, Value>) {
        match self {
            CommandArgs::Many(items) => items.push(args),
            CommandArgs::One(first) => {
                let first = std::mem::take(first);
                *self = CommandArgs::Many(vec![first, args]);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDTO {
    pub action: String,
    pub args: CommandArgs,
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    COMMAND_VERSION
}

impl CommandDTO {
    pub fn new(action: CommandName, args: CommandArgs) -> Self {
        Self {
            action: action.as_str().to_string(),
            args,
            version: COMMAND_VERSION,
        }
    }
}

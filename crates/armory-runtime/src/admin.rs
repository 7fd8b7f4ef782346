//! Administrative facade and the `<allow|forbid|is> <sword|weapon> <id>`
//! command surface
//!
//! Administrative callers always win conflicts: every change goes in with
//! override set and the caller's name as origin.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use armory_core::{Category, Identifier, WeaponKind};
use armory_state::{RegisterOutcome, Registration, WeaponRegistry};

/// Command usage line
pub const USAGE: &str = "<allow|forbid|is> <sword|weapon> <namespace:name>";

const ACTIONS: [&str; 3] = ["allow", "forbid", "is"];
const KINDS: [&str; 2] = ["sword", "weapon"];

/// Command failures reported back to the caller
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Usage: <allow|forbid|is> <sword|weapon> <namespace:name>")]
    Usage,

    #[error("Usage: <allow|forbid|is> <sword|weapon> <namespace:name> ({0})")]
    InvalidIdentifier(String),

    #[error("Unknown item {0}")]
    UnknownItem(Identifier),

    #[error("Unknown action {0:?}")]
    UnknownAction(String),

    #[error("Unknown kind {0:?}, expected sword or weapon")]
    UnknownKind(String),
}

impl CommandError {
    /// Should the caller be shown the usage line?
    pub fn is_usage(&self) -> bool {
        matches!(self, CommandError::Usage | CommandError::InvalidIdentifier(_))
    }
}

/// Command verb
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandAction {
    Allow,
    Forbid,
    Is,
}

impl CommandAction {
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("allow") {
            Some(CommandAction::Allow)
        } else if s.eq_ignore_ascii_case("forbid") {
            Some(CommandAction::Forbid)
        } else if s.eq_ignore_ascii_case("is") {
            Some(CommandAction::Is)
        } else {
            None
        }
    }
}

/// How a command ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    Failure,
    /// Answer to an `is` query
    Answer(bool),
}

/// Reply to a command
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandReply {
    pub status: CommandStatus,
    pub message: String,
}

impl fmt::Display for CommandReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Entry point for administrative callers
#[derive(Clone, Debug)]
pub struct AdminFacade {
    registry: Arc<WeaponRegistry>,
    caller: String,
}

impl AdminFacade {
    /// Facade acting as `caller`, e.g. "Command"
    pub fn new(registry: Arc<WeaponRegistry>, caller: impl Into<String>) -> Self {
        AdminFacade {
            registry,
            caller: caller.into(),
        }
    }

    pub fn caller(&self) -> &str {
        &self.caller
    }

    /// Put `id` into `category`, relocating it if needed
    pub fn set_category(&self, category: Category, id: Identifier) -> RegisterOutcome {
        let request = Registration::new(self.caller.as_str(), id, category).with_override(true);
        self.registry.register(&request)
    }

    pub fn query(&self, kind: WeaponKind, id: &Identifier) -> bool {
        self.registry.query(kind, id)
    }

    /// Run `<allow|forbid|is> <sword|weapon> <namespace:name>`
    pub fn execute(&self, args: &[&str]) -> Result<CommandReply, CommandError> {
        let [action, kind, raw] = args else {
            return Err(CommandError::Usage);
        };
        let id = Identifier::parse(raw)
            .map_err(|e| CommandError::InvalidIdentifier(e.to_string()))?;
        if !self.registry.catalog().contains(&id) {
            return Err(CommandError::UnknownItem(id));
        }
        let kind = WeaponKind::parse(kind).ok_or_else(|| CommandError::UnknownKind(kind.to_string()))?;
        let action =
            CommandAction::parse(action).ok_or_else(|| CommandError::UnknownAction(action.to_string()))?;

        let reply = match action {
            CommandAction::Is => {
                let answer = self.query(kind, &id);
                let message = if answer {
                    format!("{} is a {}", id, kind)
                } else {
                    format!("{} is not a {}", id, kind)
                };
                CommandReply {
                    status: CommandStatus::Answer(answer),
                    message,
                }
            }
            CommandAction::Allow => {
                let changed = self.set_category(Category::allowed(kind), id.clone()).changed();
                change_reply(changed, "allowed", "allow", &id, kind)
            }
            CommandAction::Forbid => {
                let changed = self.set_category(Category::forbidden(kind), id.clone()).changed();
                change_reply(changed, "forbade", "forbid", &id, kind)
            }
        };
        Ok(reply)
    }
}

fn change_reply(
    changed: bool,
    done: &str,
    verb: &str,
    id: &Identifier,
    kind: WeaponKind,
) -> CommandReply {
    if changed {
        CommandReply {
            status: CommandStatus::Success,
            message: format!("{} {} as a {}", done, id, kind),
        }
    } else {
        CommandReply {
            status: CommandStatus::Failure,
            message: format!("could not {} {} as a {}", verb, id, kind),
        }
    }
}

/// Tab completion for the word being typed
pub fn complete(args: &[&str]) -> Vec<&'static str> {
    let candidates: &[&'static str] = match args.len() {
        1 => &ACTIONS,
        2 => &KINDS,
        _ => return Vec::new(),
    };
    let last = args[args.len() - 1];
    candidates
        .iter()
        .copied()
        .filter(|candidate| {
            candidate.len() >= last.len()
                && candidate.as_bytes()[..last.len()].eq_ignore_ascii_case(last.as_bytes())
        })
        .collect()
}

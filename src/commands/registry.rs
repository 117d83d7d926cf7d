//! Command table.
//!
//! Every supported command is one `CommandSpec` row in `COMMANDS`. The lookup
//! index over it is built the first time it's needed and never changes
//! afterwards.

use super::{hashes, lists, server, strings};
use crate::protocol::RespValue;
use crate::storage::StorageEngine;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::OnceLock;

/// A command implementation. `args` excludes the command name and has already
/// passed the arity check.
pub type HandlerFn = fn(&StorageEngine, &[Bytes]) -> RespValue;

/// Number of arguments a command accepts, not counting its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Between(usize, usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Between(min, max) => (min..=max).contains(&count),
        }
    }
}

#[derive(Clone, Copy)]
pub struct CommandSpec {
    /// Upper-case command name
    pub name: &'static str,
    pub arity: Arity,
    /// Whether the command is written to the append-only log
    pub mutates: bool,
    pub handler: HandlerFn,
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("mutates", &self.mutates)
            .finish_non_exhaustive()
    }
}

const fn spec(name: &'static str, arity: Arity, mutates: bool, handler: HandlerFn) -> CommandSpec {
    CommandSpec {
        name,
        arity,
        mutates,
        handler,
    }
}

static COMMANDS: &[CommandSpec] = &[
    spec("PING", Arity::Between(0, 1), false, server::ping),
    // Strings
    spec("GET", Arity::Exact(1), false, strings::get),
    spec("SET", Arity::Exact(2), true, strings::set),
    spec("EXISTS", Arity::AtLeast(1), false, strings::exists),
    spec("DEL", Arity::AtLeast(1), true, strings::del),
    spec("APPEND", Arity::Exact(2), true, strings::append),
    spec("INCR", Arity::Exact(1), true, strings::incr),
    spec("COPY", Arity::Exact(2), true, strings::copy),
    // Hashes
    spec("HSET", Arity::Exact(3), true, hashes::hset),
    spec("HGET", Arity::Exact(2), false, hashes::hget),
    spec("HGETALL", Arity::Exact(1), false, hashes::hgetall),
    spec("HDEL", Arity::AtLeast(2), true, hashes::hdel),
    // Lists
    spec("RPUSH", Arity::AtLeast(2), true, lists::rpush),
    spec("LPUSH", Arity::AtLeast(2), true, lists::lpush),
    spec("LLEN", Arity::Exact(1), false, lists::llen),
    spec("LSET", Arity::Exact(3), true, lists::lset),
    spec("LRANGE", Arity::Exact(3), false, lists::lrange),
];

fn index() -> &'static HashMap<&'static str, &'static CommandSpec> {
    static INDEX: OnceLock<HashMap<&'static str, &'static CommandSpec>> = OnceLock::new();
    INDEX.get_or_init(|| COMMANDS.iter().map(|spec| (spec.name, spec)).collect())
}

/// Finds a command by its upper-case name.
pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    index().get(name).copied()
}

/// All registered commands, in table order.
pub fn commands() -> &'static [CommandSpec] {
    COMMANDS
}

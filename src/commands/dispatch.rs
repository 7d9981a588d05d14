//! Command Dispatch
//!
//! Maps a recognized frame onto a storage operation. The mapping is a
//! fixed, name-sorted table built at compile time; lookups binary-search
//! it with a case-folding comparator, so resolving a command allocates
//! nothing and stays O(log n) no matter how hard a pipelined client
//! pushes.
//!
//! Two things can go wrong before a command runs, and neither one is
//! allowed to poison the rest of the buffer:
//!
//! - the name is not in the table ([`CommandError::UnknownCommand`])
//! - the argument count is off ([`CommandError::WrongArity`])
//!
//! Both leave the frame boundary intact, so the session reports them as
//! error replies and keeps consuming. The backend is invoked exactly once
//! per frame that clears both checks.

use crate::protocol::reply::Reply;
use crate::protocol::scanner::Frame;
use crate::storage::StorageEngine;
use bytes::Bytes;
use std::cmp::Ordering;
use std::sync::Arc;
use thiserror::Error;

/// Per-frame dispatch failures.
///
/// These are application-level: the input stream is still well-framed,
/// so processing continues with the next frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The command name matched nothing in the dispatch table.
    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    /// The argument count is outside the command's declared arity.
    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),
}

/// Handler signature shared by every entry in the dispatch table.
type CommandFn = fn(&StorageEngine, &[&[u8]]) -> Reply;

/// One entry of the dispatch table.
struct CommandSpec {
    /// Uppercase command name. The table is sorted on this field.
    name: &'static str,
    /// Minimum number of arguments after the command name.
    min_args: usize,
    /// Maximum number of arguments, or `None` for variadic commands.
    max_args: Option<usize>,
    run: CommandFn,
}

impl CommandSpec {
    const fn exact(name: &'static str, args: usize, run: CommandFn) -> Self {
        Self {
            name,
            min_args: args,
            max_args: Some(args),
            run,
        }
    }

    const fn at_least(name: &'static str, min_args: usize, run: CommandFn) -> Self {
        Self {
            name,
            min_args,
            max_args: None,
            run,
        }
    }

    fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map_or(true, |max| count <= max)
    }
}

/// The fixed dispatch table. Must stay sorted by name for binary search.
static COMMANDS: &[CommandSpec] = &[
    CommandSpec::exact("APPEND", 2, cmd_append),
    CommandSpec::exact("DBSIZE", 0, cmd_dbsize),
    CommandSpec::exact("DECR", 1, cmd_decr),
    CommandSpec::exact("DECRBY", 2, cmd_decrby),
    CommandSpec::at_least("DEL", 1, cmd_del),
    CommandSpec::exact("ECHO", 1, cmd_echo),
    CommandSpec::at_least("EXISTS", 1, cmd_exists),
    CommandSpec::exact("FLUSHALL", 0, cmd_flushdb),
    CommandSpec::exact("FLUSHDB", 0, cmd_flushdb),
    CommandSpec::exact("GET", 1, cmd_get),
    CommandSpec::exact("INCR", 1, cmd_incr),
    CommandSpec::exact("INCRBY", 2, cmd_incrby),
    CommandSpec {
        name: "PING",
        min_args: 0,
        max_args: Some(1),
        run: cmd_ping,
    },
    CommandSpec::exact("QUIT", 0, cmd_quit),
    CommandSpec::exact("SET", 2, cmd_set),
    CommandSpec::exact("STRLEN", 1, cmd_strlen),
];

/// Resolves a raw command name against the table, case-insensitively.
fn lookup(name: &[u8]) -> Option<&'static CommandSpec> {
    COMMANDS
        .binary_search_by(|spec| cmp_folded(spec.name.as_bytes(), name))
        .ok()
        .map(|index| &COMMANDS[index])
}

/// Compares an (uppercase) table name against raw input as if the input
/// were ASCII-uppercased, without building the uppercased copy.
fn cmp_folded(table: &[u8], input: &[u8]) -> Ordering {
    let common = table.len().min(input.len());
    for i in 0..common {
        match table[i].cmp(&input[i].to_ascii_uppercase()) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    table.len().cmp(&input.len())
}

/// Executes frames against a storage engine.
///
/// One dispatcher serves one session; the engine behind it is typically
/// shared by many.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    storage: Arc<StorageEngine>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given storage engine.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    /// The engine this dispatcher executes against.
    pub fn storage(&self) -> &StorageEngine {
        &self.storage
    }

    /// Resolves and executes one frame, producing its reply.
    pub fn dispatch(&self, frame: &Frame<'_>) -> Result<Reply, CommandError> {
        let name = frame
            .name()
            .ok_or_else(|| CommandError::UnknownCommand(String::new()))?;

        let spec = lookup(name).ok_or_else(|| {
            CommandError::UnknownCommand(String::from_utf8_lossy(name).into_owned())
        })?;

        let args = frame.args();
        if !spec.accepts(args.len()) {
            return Err(CommandError::WrongArity(spec.name));
        }

        Ok((spec.run)(&self.storage, args))
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Parses a decimal i64 argument.
fn parse_i64(arg: &[u8]) -> Option<i64> {
    std::str::from_utf8(arg).ok()?.parse().ok()
}

// ============================================================================
// Command handlers
// ============================================================================

/// PING [message]
fn cmd_ping(_storage: &StorageEngine, args: &[&[u8]]) -> Reply {
    match args.first() {
        Some(message) => Reply::bulk(Bytes::copy_from_slice(message)),
        None => Reply::pong(),
    }
}

/// ECHO message
fn cmd_echo(_storage: &StorageEngine, args: &[&[u8]]) -> Reply {
    Reply::bulk(Bytes::copy_from_slice(args[0]))
}

/// SET key value
fn cmd_set(storage: &StorageEngine, args: &[&[u8]]) -> Reply {
    storage.set(
        Bytes::copy_from_slice(args[0]),
        Bytes::copy_from_slice(args[1]),
    );
    Reply::ok()
}

/// GET key
fn cmd_get(storage: &StorageEngine, args: &[&[u8]]) -> Reply {
    match storage.get(args[0]) {
        Some(value) => Reply::bulk(value),
        None => Reply::null(),
    }
}

/// DEL key [key ...]
fn cmd_del(storage: &StorageEngine, args: &[&[u8]]) -> Reply {
    Reply::integer(storage.delete_many(args) as i64)
}

/// EXISTS key [key ...]
fn cmd_exists(storage: &StorageEngine, args: &[&[u8]]) -> Reply {
    Reply::integer(storage.exists_many(args) as i64)
}

/// INCR key
fn cmd_incr(storage: &StorageEngine, args: &[&[u8]]) -> Reply {
    match storage.incr(args[0]) {
        Ok(n) => Reply::integer(n),
        Err(e) => Reply::error(format!("ERR {}", e)),
    }
}

/// INCRBY key increment
fn cmd_incrby(storage: &StorageEngine, args: &[&[u8]]) -> Reply {
    let Some(delta) = parse_i64(args[1]) else {
        return Reply::error("ERR value is not an integer or out of range");
    };
    match storage.incr_by(args[0], delta) {
        Ok(n) => Reply::integer(n),
        Err(e) => Reply::error(format!("ERR {}", e)),
    }
}

/// DECR key
fn cmd_decr(storage: &StorageEngine, args: &[&[u8]]) -> Reply {
    match storage.decr(args[0]) {
        Ok(n) => Reply::integer(n),
        Err(e) => Reply::error(format!("ERR {}", e)),
    }
}

/// DECRBY key decrement
fn cmd_decrby(storage: &StorageEngine, args: &[&[u8]]) -> Reply {
    let Some(delta) = parse_i64(args[1]) else {
        return Reply::error("ERR value is not an integer or out of range");
    };
    match storage.incr_by(args[0], delta.wrapping_neg()) {
        Ok(n) => Reply::integer(n),
        Err(e) => Reply::error(format!("ERR {}", e)),
    }
}

/// APPEND key value
fn cmd_append(storage: &StorageEngine, args: &[&[u8]]) -> Reply {
    Reply::integer(storage.append(args[0], args[1]) as i64)
}

/// STRLEN key
fn cmd_strlen(storage: &StorageEngine, args: &[&[u8]]) -> Reply {
    Reply::integer(storage.strlen(args[0]) as i64)
}

/// DBSIZE
fn cmd_dbsize(storage: &StorageEngine, _args: &[&[u8]]) -> Reply {
    Reply::integer(storage.len() as i64)
}

/// FLUSHDB / FLUSHALL
fn cmd_flushdb(storage: &StorageEngine, _args: &[&[u8]]) -> Reply {
    storage.flush();
    Reply::ok()
}

/// QUIT
fn cmd_quit(_storage: &StorageEngine, _args: &[&[u8]]) -> Reply {
    Reply::ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::scanner::scan;

    fn create_dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(StorageEngine::new()))
    }

    fn run(dispatcher: &Dispatcher, raw: &[u8]) -> Result<Reply, CommandError> {
        let (frame, _) = scan(raw).unwrap().expect("test frame must be complete");
        dispatcher.dispatch(&frame)
    }

    #[test]
    fn table_is_sorted_for_binary_search() {
        for pair in COMMANDS.windows(2) {
            assert!(
                pair[0].name < pair[1].name,
                "{} must sort before {}",
                pair[0].name,
                pair[1].name
            );
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let dispatcher = create_dispatcher();
        assert_eq!(run(&dispatcher, b"PING\r\n"), Ok(Reply::pong()));
        assert_eq!(run(&dispatcher, b"ping\r\n"), Ok(Reply::pong()));
        assert_eq!(run(&dispatcher, b"PiNg\r\n"), Ok(Reply::pong()));
    }

    #[test]
    fn ping_with_message_echoes_it() {
        let dispatcher = create_dispatcher();
        assert_eq!(
            run(&dispatcher, b"PING hello\r\n"),
            Ok(Reply::bulk(Bytes::from("hello")))
        );
    }

    #[test]
    fn echo() {
        let dispatcher = create_dispatcher();
        assert_eq!(
            run(&dispatcher, b"*2\r\n$4\r\nECHO\r\n$5\r\nhello\r\n"),
            Ok(Reply::bulk(Bytes::from("hello")))
        );
    }

    #[test]
    fn unknown_command() {
        let dispatcher = create_dispatcher();
        assert_eq!(
            run(&dispatcher, b"NOPE\r\n"),
            Err(CommandError::UnknownCommand("NOPE".to_string()))
        );
    }

    #[test]
    fn unknown_command_message_wording() {
        let err = CommandError::UnknownCommand("NOPE".to_string());
        assert_eq!(err.to_string(), "ERR unknown command 'NOPE'");
        let err = CommandError::WrongArity("GET");
        assert_eq!(
            err.to_string(),
            "ERR wrong number of arguments for 'GET' command"
        );
    }

    #[test]
    fn arity_too_few_and_too_many() {
        let dispatcher = create_dispatcher();
        assert_eq!(
            run(&dispatcher, b"*1\r\n$3\r\nGET\r\n"),
            Err(CommandError::WrongArity("GET"))
        );
        assert_eq!(
            run(&dispatcher, b"*3\r\n$3\r\nGET\r\n$1\r\na\r\n$1\r\nb\r\n"),
            Err(CommandError::WrongArity("GET"))
        );
        assert_eq!(
            run(&dispatcher, b"*2\r\n$4\r\nQUIT\r\n$1\r\nx\r\n"),
            Err(CommandError::WrongArity("QUIT"))
        );
    }

    #[test]
    fn variadic_commands_accept_many_keys() {
        let dispatcher = create_dispatcher();
        run(&dispatcher, b"*3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\n1\r\n").unwrap();
        run(&dispatcher, b"*3\r\n$3\r\nSET\r\n$1\r\nb\r\n$1\r\n2\r\n").unwrap();

        assert_eq!(
            run(&dispatcher, b"*4\r\n$6\r\nEXISTS\r\n$1\r\na\r\n$1\r\nb\r\n$1\r\nc\r\n"),
            Ok(Reply::integer(2))
        );
        assert_eq!(
            run(&dispatcher, b"*3\r\n$3\r\nDEL\r\n$1\r\na\r\n$1\r\nb\r\n"),
            Ok(Reply::integer(2))
        );
    }

    #[test]
    fn set_then_get_roundtrip() {
        let dispatcher = create_dispatcher();
        assert_eq!(
            run(&dispatcher, b"*3\r\n$3\r\nSET\r\n$4\r\nname\r\n$5\r\nrapid\r\n"),
            Ok(Reply::ok())
        );
        assert_eq!(
            run(&dispatcher, b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n"),
            Ok(Reply::bulk(Bytes::from("rapid")))
        );
        assert_eq!(
            run(&dispatcher, b"*2\r\n$3\r\nGET\r\n$7\r\nmissing\r\n"),
            Ok(Reply::null())
        );
    }

    #[test]
    fn counter_commands() {
        let dispatcher = create_dispatcher();
        assert_eq!(run(&dispatcher, b"INCR hits\r\n"), Ok(Reply::integer(1)));
        assert_eq!(run(&dispatcher, b"INCRBY hits 9\r\n"), Ok(Reply::integer(10)));
        assert_eq!(run(&dispatcher, b"DECR hits\r\n"), Ok(Reply::integer(9)));
        assert_eq!(run(&dispatcher, b"DECRBY hits 4\r\n"), Ok(Reply::integer(5)));
    }

    #[test]
    fn incrby_rejects_bad_delta() {
        let dispatcher = create_dispatcher();
        let reply = run(&dispatcher, b"INCRBY hits abc\r\n").unwrap();
        assert!(reply.is_error());
    }

    #[test]
    fn incr_on_non_integer_value_is_a_reply_error() {
        let dispatcher = create_dispatcher();
        run(&dispatcher, b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$3\r\nabc\r\n").unwrap();
        // Storage-level failure, not a dispatch failure: the frame ran.
        let reply = run(&dispatcher, b"INCR k\r\n").unwrap();
        assert!(reply.is_error());
    }

    #[test]
    fn append_and_strlen() {
        let dispatcher = create_dispatcher();
        assert_eq!(
            run(&dispatcher, b"APPEND key Hello\r\n"),
            Ok(Reply::integer(5))
        );
        assert_eq!(
            run(&dispatcher, b"STRLEN key\r\n"),
            Ok(Reply::integer(5))
        );
    }

    #[test]
    fn dbsize_and_flushdb() {
        let dispatcher = create_dispatcher();
        run(&dispatcher, b"SET a 1\r\n").unwrap();
        run(&dispatcher, b"SET b 2\r\n").unwrap();
        assert_eq!(run(&dispatcher, b"DBSIZE\r\n"), Ok(Reply::integer(2)));
        assert_eq!(run(&dispatcher, b"FLUSHDB\r\n"), Ok(Reply::ok()));
        assert_eq!(run(&dispatcher, b"DBSIZE\r\n"), Ok(Reply::integer(0)));
        assert_eq!(run(&dispatcher, b"FLUSHALL\r\n"), Ok(Reply::ok()));
    }

    #[test]
    fn binary_safe_arguments_flow_through() {
        let dispatcher = create_dispatcher();
        assert_eq!(
            run(&dispatcher, b"*3\r\n$3\r\nSET\r\n$3\r\nk\x00y\r\n$4\r\nv\r\nx\r\n"),
            Ok(Reply::ok())
        );
        assert_eq!(
            run(&dispatcher, b"*2\r\n$3\r\nGET\r\n$3\r\nk\x00y\r\n"),
            Ok(Reply::bulk(Bytes::from_static(b"v\r\nx")))
        );
    }
}

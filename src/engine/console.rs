use super::Command;
use crate::store::{CredentialStore, StoreError};

pub const HELP: &str = "/add  /delete <n>  /cancel  /users  /status  /help";

/// A `/`-prefixed operator line typed at the terminal.
#[derive(Debug, PartialEq, Eq)]
pub enum OperatorLine {
    Command(Command),
    ListUsers,
    Status,
    Help,
    Invalid(String),
}

/// Parse an operator line. User positions are 1-based, as printed by `/users`.
pub fn parse_operator_line(line: &str) -> OperatorLine {
    let mut words = line.trim().trim_start_matches('/').split_whitespace();
    let verb = words.next().unwrap_or("").to_ascii_lowercase();
    let arg = words.next();
    if words.next().is_some() {
        return OperatorLine::Invalid(format!("too many arguments: {line}"));
    }

    match (verb.as_str(), arg) {
        ("add", None) => OperatorLine::Command(Command::EnableAdd),
        ("cancel", None) => OperatorLine::Command(Command::Cancel),
        ("users", None) => OperatorLine::ListUsers,
        ("status", None) => OperatorLine::Status,
        ("help", None) => OperatorLine::Help,
        ("delete", Some(n)) => match n.parse::<usize>() {
            Ok(n) if n >= 1 => OperatorLine::Command(Command::RequestDelete(n - 1)),
            _ => OperatorLine::Invalid(format!("bad user number: {n}")),
        },
        ("delete", None) => OperatorLine::Invalid("usage: /delete <n>".into()),
        _ => OperatorLine::Invalid(format!("unknown command: {line}")),
    }
}

/// One numbered line per enrolled user, in store order. Unreadable names are
/// shown in place with their error.
pub fn user_lines(store: &CredentialStore) -> Result<Vec<String>, StoreError> {
    Ok(store
        .display_names()?
        .iter()
        .enumerate()
        .map(|(i, name)| match name {
            Ok(name) => format!("{:>3}. {name}", i + 1),
            Err(e) => format!("{:>3}. <{e}>", i + 1),
        })
        .collect())
}

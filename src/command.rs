//! Client command parsing
//!
//! Classifies one line received from a joined client. Command keywords
//! are matched case-insensitively; anything that is not a command is a
//! chat line.

use thiserror::Error;

const EXIT: &str = "/exit";
const USERS: &str = "/users";
const PRIVATE: &str = "/private";

/// One classified input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// `/exit`
    Exit,
    /// `/users`
    Users,
    /// `/private <recipient> <text>`
    Private { recipient: &'a str, text: &'a str },
    /// Plain chat line, kept as received
    Chat(&'a str),
    /// Blank line, nothing to do
    Empty,
}

/// Malformed `/private` input
///
/// The display text is what the client gets back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Recipient or separating space missing
    #[error("Usage: /private <nickname> <text>")]
    PrivateUsage,
    /// Text after the recipient is blank
    #[error("Message text cannot be empty")]
    EmptyText,
}

impl<'a> Command<'a> {
    /// Classify a line
    pub fn parse(line: &'a str) -> Result<Self, CommandError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Command::Empty);
        }
        if trimmed.eq_ignore_ascii_case(EXIT) {
            return Ok(Command::Exit);
        }
        if trimmed.eq_ignore_ascii_case(USERS) {
            return Ok(Command::Users);
        }
        if let Some(args) = strip_keyword(line, PRIVATE) {
            return parse_private(args);
        }
        Ok(Command::Chat(line))
    }
}

/// Text after `keyword` if the line starts with it as a whole word
///
/// `None` means the line is not this command at all (e.g. `/privately`).
fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let head = line.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = &line[keyword.len()..];
    if rest.is_empty() || rest.starts_with(' ') {
        Some(rest)
    } else {
        None
    }
}

fn parse_private(args: &str) -> Result<Command<'_>, CommandError> {
    // exactly one separator after the keyword
    let args = args.strip_prefix(' ').unwrap_or(args);
    let (recipient, text) = args.split_once(' ').ok_or(CommandError::PrivateUsage)?;
    if recipient.is_empty() {
        return Err(CommandError::PrivateUsage);
    }
    if text.trim().is_empty() {
        return Err(CommandError::EmptyText);
    }
    Ok(Command::Private { recipient, text })
}

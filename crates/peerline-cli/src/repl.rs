//! Interactive line parsing
//!
//! Each line is split on whitespace and the first word picks the command.
//! Engine commands become a [`Command`]; the rest drive the simulated network
//! or the terminal itself.

use uuid::Uuid;

use peerline_core::{Command, Contact, LocalAddress};

use crate::error::{CliError, Result};

/// Size reported for `download` when none is given
const DEFAULT_DOWNLOAD_BYTES: u64 = 1_048_576;

pub const HELP: &str = "\
Commands:
  dial <address|contact>         place a voice call
  accept                         answer the ringing call
  hangup                         end or reject the current call
  mute                           toggle the microphone
  record                         start or stop recording the call
  send <address|contact> <text>  send a chat message
  status                         show address, call and counters
  reconnect                      restart registration
  read <notification-id>         mark a notification read
  clear                          clear all chat logs
  download <name> [bytes]        report a finished download
  ring <address>                 simulate an incoming call
  drop                           simulate a dropped registration
  outage on|off                  take the rendezvous service down or up
  contacts                       list the address book
  help                           show this help
  quit                           shut down and exit";

/// One parsed interactive line
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    /// Forward to the engine
    Engine(Command),
    /// A scripted peer calls us
    Ring { from: LocalAddress },
    DropConnection,
    Outage { down: bool },
    Contacts,
    Help,
    Quit,
}

/// Parse one line; blank lines yield `None`
pub fn parse_line(line: &str, contacts: &[Contact]) -> Result<Option<ReplCommand>> {
    let line = line.trim();
    let Some((word, rest)) = split_word(line) else {
        return Ok(None);
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "dial" | "call" => ReplCommand::Engine(Command::Dial {
            target: resolve(required(rest, "dial <address|contact>")?, contacts)?,
        }),
        "accept" | "answer" => ReplCommand::Engine(Command::AcceptIncoming),
        "hangup" | "reject" => ReplCommand::Engine(Command::HangUp),
        "mute" => ReplCommand::Engine(Command::ToggleMute),
        "record" => ReplCommand::Engine(Command::ToggleRecord),
        "send" | "msg" => {
            let (target, text) = split_word(rest)
                .filter(|(_, text)| !text.is_empty())
                .ok_or_else(|| usage("send <address|contact> <text>"))?;
            ReplCommand::Engine(Command::SendMessage {
                target: resolve(target, contacts)?,
                text: text.to_string(),
            })
        }
        "status" => ReplCommand::Engine(Command::GetStatus),
        "reconnect" => ReplCommand::Engine(Command::Reconnect),
        "read" => {
            let id = required(rest, "read <notification-id>")?;
            let id = Uuid::parse_str(id)
                .map_err(|_| CliError::invalid_input(format!("not a notification id: {}", id)))?;
            ReplCommand::Engine(Command::MarkNotificationRead { id })
        }
        "clear" => ReplCommand::Engine(Command::ClearMessages),
        "download" => {
            let (name, size) = split_word(rest).ok_or_else(|| usage("download <name> [bytes]"))?;
            let size_bytes = if size.is_empty() {
                DEFAULT_DOWNLOAD_BYTES
            } else {
                size.parse()
                    .map_err(|_| CliError::invalid_input(format!("not a byte count: {}", size)))?
            };
            ReplCommand::Engine(Command::RecordDownload {
                name: name.to_string(),
                kind: file_kind(name),
                size_bytes,
            })
        }
        "ring" => ReplCommand::Ring {
            from: resolve(required(rest, "ring <address>")?, contacts)?,
        },
        "drop" => ReplCommand::DropConnection,
        "outage" => match rest {
            "on" => ReplCommand::Outage { down: true },
            "off" => ReplCommand::Outage { down: false },
            _ => return Err(usage("outage on|off")),
        },
        "contacts" => ReplCommand::Contacts,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" => ReplCommand::Quit,
        other => {
            return Err(CliError::invalid_input(format!(
                "unknown command: {} (try 'help')",
                other
            )))
        }
    };
    Ok(Some(command))
}

/// Contact name (case-insensitive) or a raw address
pub fn resolve(target: &str, contacts: &[Contact]) -> Result<LocalAddress> {
    if let Some(contact) = contacts
        .iter()
        .find(|contact| contact.name.eq_ignore_ascii_case(target))
    {
        return Ok(contact.address.clone());
    }
    Ok(LocalAddress::parse(target)?)
}

fn split_word(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => Some((word, rest.trim())),
        None => Some((input, "")),
    }
}

fn required<'a>(rest: &'a str, form: &str) -> Result<&'a str> {
    match rest.split_whitespace().next() {
        Some(arg) => Ok(arg),
        None => Err(usage(form)),
    }
}

fn usage(form: &str) -> CliError {
    CliError::invalid_input(format!("usage: {}", form))
}

fn file_kind(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_ascii_lowercase(),
        _ => "file".to_string(),
    }
}

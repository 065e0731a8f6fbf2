//! Line commands accepted on stdin.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join,
    Leave,
    Mute,
    Unmute,
    ToggleMute,
    Deafen,
    Camera,
    Screen,
    /// Push-to-talk key down (`true`) or up (`false`).
    Ptt(bool),
    /// Simulates a network drop on the current room.
    Drop,
    PeerJoin(String),
    PeerLeave(String),
    State,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCommandError(String);

impl fmt::Display for ParseCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ParseCommandError {}

pub const USAGE: &str = "commands: join | leave | mute | unmute | toggle-mute | deafen | camera | \
screen | ptt <down|up> | drop | peer <join|leave> <id> | state | quit";

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Err(ParseCommandError("empty command".to_string()));
        };
        let args: Vec<&str> = words.collect();

        let command = match (head.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("join", []) => Self::Join,
            ("leave", []) => Self::Leave,
            ("mute", []) => Self::Mute,
            ("unmute", []) => Self::Unmute,
            ("toggle-mute", []) => Self::ToggleMute,
            ("deafen", []) => Self::Deafen,
            ("camera", []) => Self::Camera,
            ("screen", []) => Self::Screen,
            ("ptt", ["down"]) => Self::Ptt(true),
            ("ptt", ["up"]) => Self::Ptt(false),
            ("drop", []) => Self::Drop,
            ("peer", ["join", id]) => Self::PeerJoin((*id).to_string()),
            ("peer", ["leave", id]) => Self::PeerLeave((*id).to_string()),
            ("state", []) => Self::State,
            ("quit" | "exit", []) => Self::Quit,
            _ => return Err(ParseCommandError(format!("unknown command: {line}"))),
        };
        Ok(command)
    }
}

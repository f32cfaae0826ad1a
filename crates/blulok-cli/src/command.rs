//! Line commands.
//!
//! Each input line is one command word followed by an optional argument.
//! Words are case-insensitive and most have a short alias.

use std::time::Duration;

use blulok_app::UserIntent;
use blulok_core::HostLifecycle;
use thiserror::Error;

/// Help text printed by `help`.
pub const HELP: &str = "\
commands:
  scan | s               scan for locks
  stop                   stop scanning
  connect <n> | c <n>    connect to the n-th listed lock
  cancel                 abandon a connection attempt
  disconnect | d         disconnect
  reconnect | r          reconnect to the last lock
  open | o               unlock
  eject | e              battery eject button
  lock | battery         switch command view
  search [text]          filter the lock list
  bg | fg                background or foreground the app
simulation:
  adv                    every lock advertises once
  drop                   the connected lock drops its link
  latch                  pull the latch of the connected lock
  remove                 the connected lock reports its battery is back in
  power on|off           switch the radio
  wait <ms>              pause before the next line
  help | quit";

/// Change to the simulated environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stimulus {
    /// Every lock advertises once.
    Advertise,
    /// The connected lock drops its link.
    DropLink,
    /// Someone pulls the latch of the connected lock.
    PullLatch,
    /// The connected lock reports its battery as not ready.
    BatteryNotReady,
    /// Radio on or off.
    Power(bool),
}

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Forward to the App.
    Intent(UserIntent),
    /// Host lifecycle signal.
    Lifecycle(HostLifecycle),
    /// Poke the simulated lock.
    Sim(Stimulus),
    /// Pause reading input.
    Wait(Duration),
    /// Print help.
    Help,
}

/// Reasons a line is not a command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Blank line.
    #[error("empty command")]
    Empty,

    /// First word not recognised.
    #[error("unknown command `{0}`, try `help`")]
    Unknown(String),

    /// Required argument absent.
    #[error("`{command}` needs {argument}")]
    MissingArgument {
        /// Command word
        command: &'static str,
        /// What is missing
        argument: &'static str,
    },

    /// Argument not understood.
    #[error("`{0}` is not a valid argument")]
    BadArgument(String),
}

impl Command {
    /// Parse one input line.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] describing what is wrong with the line.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        let command = match word.to_ascii_lowercase().as_str() {
            "" => return Err(ParseError::Empty),
            "scan" | "s" => Self::Intent(UserIntent::Scan),
            "stop" => Self::Intent(UserIntent::StopScan),
            "connect" | "c" => {
                if rest.is_empty() {
                    return Err(ParseError::MissingArgument { command: "connect", argument: "a list position" });
                }
                let index = rest.parse().map_err(|_| ParseError::BadArgument(rest.to_owned()))?;
                Self::Intent(UserIntent::Select(index))
            },
            "cancel" => Self::Intent(UserIntent::CancelConnecting),
            "disconnect" | "d" => Self::Intent(UserIntent::Disconnect),
            "reconnect" | "r" => Self::Intent(UserIntent::Reconnect),
            "open" | "o" => Self::Intent(UserIntent::Open),
            "eject" | "e" => Self::Intent(UserIntent::BatteryEject),
            "lock" => Self::Intent(UserIntent::ShowLock),
            "battery" => Self::Intent(UserIntent::ShowBattery),
            "search" | "/" => Self::Intent(UserIntent::Search(rest.to_owned())),
            "quit" | "q" | "exit" => Self::Intent(UserIntent::Quit),
            "bg" => Self::Lifecycle(HostLifecycle::Background),
            "fg" => Self::Lifecycle(HostLifecycle::Foreground),
            "adv" => Self::Sim(Stimulus::Advertise),
            "drop" => Self::Sim(Stimulus::DropLink),
            "latch" => Self::Sim(Stimulus::PullLatch),
            "remove" => Self::Sim(Stimulus::BatteryNotReady),
            "power" => match rest.to_ascii_lowercase().as_str() {
                "on" => Self::Sim(Stimulus::Power(true)),
                "off" => Self::Sim(Stimulus::Power(false)),
                "" => return Err(ParseError::MissingArgument { command: "power", argument: "on or off" }),
                other => return Err(ParseError::BadArgument(other.to_owned())),
            },
            "wait" => {
                if rest.is_empty() {
                    return Err(ParseError::MissingArgument { command: "wait", argument: "milliseconds" });
                }
                let millis = rest.parse().map_err(|_| ParseError::BadArgument(rest.to_owned()))?;
                Self::Wait(Duration::from_millis(millis))
            },
            "help" | "?" => Self::Help,
            other => return Err(ParseError::Unknown(other.to_owned())),
        };
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intents() {
        assert_eq!(Command::parse("scan"), Ok(Command::Intent(UserIntent::Scan)));
        assert_eq!(Command::parse("  C 2 "), Ok(Command::Intent(UserIntent::Select(2))));
        assert_eq!(Command::parse("search Front Door"), Ok(Command::Intent(UserIntent::Search("Front Door".into()))));
        assert_eq!(Command::parse("search"), Ok(Command::Intent(UserIntent::Search(String::new()))));
        assert_eq!(Command::parse("q"), Ok(Command::Intent(UserIntent::Quit)));
    }

    #[test]
    fn lifecycle_and_stimuli() {
        assert_eq!(Command::parse("bg"), Ok(Command::Lifecycle(HostLifecycle::Background)));
        assert_eq!(Command::parse("power OFF"), Ok(Command::Sim(Stimulus::Power(false))));
        assert_eq!(Command::parse("drop"), Ok(Command::Sim(Stimulus::DropLink)));
        assert_eq!(Command::parse("wait 250"), Ok(Command::Wait(Duration::from_millis(250))));
    }

    #[test]
    fn rejects() {
        assert_eq!(Command::parse("   "), Err(ParseError::Empty));
        assert_eq!(Command::parse("connect"), Err(ParseError::MissingArgument {
            command: "connect",
            argument: "a list position"
        }));
        assert_eq!(Command::parse("connect -1"), Err(ParseError::BadArgument("-1".into())));
        assert_eq!(Command::parse("power maybe"), Err(ParseError::BadArgument("maybe".into())));
        assert_eq!(
            Command::parse("unlock").unwrap_err().to_string(),
            "unknown command `unlock`, try `help`"
        );
    }
}

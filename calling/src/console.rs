//! Operator console.
//!
//! The command grammar read from stdin and plain-text renderings of an agent
//! view and of the authority's board.

use crate::agent::AgentState;
use crate::model::{Line, ParseLineError, Snapshot, StationId};
use std::fmt::Write as _;
use std::str::FromStr;
use thiserror::Error;

/// One console command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `next <line>`
    Next(Line),
    /// `recall <line>`
    Recall(Line),
    /// `reset <line>`
    Reset(Line),
    /// `station <n>`
    Station(StationId),
    /// `show`
    Show,
    /// `metrics`
    Metrics,
    /// `help`
    Help,
    /// `quit`
    Quit,
}

/// Why a console line was not understood.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Blank line
    #[error("empty command")]
    Empty,

    /// First word is not a command
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),

    /// Command needs an argument
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),

    /// Bad line name
    #[error(transparent)]
    Line(#[from] ParseLineError),

    /// Bad station number
    #[error("invalid station '{0}'")]
    Station(String),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(CommandError::Empty);
        };
        let argument = words.next();

        match verb.to_ascii_lowercase().as_str() {
            "next" | "panggil" => Ok(Self::Next(parse_line(argument, "next")?)),
            "recall" | "ulang" => Ok(Self::Recall(parse_line(argument, "recall")?)),
            "reset" => Ok(Self::Reset(parse_line(argument, "reset")?)),
            "station" | "loket" => {
                let raw = argument.ok_or(CommandError::MissingArgument("station"))?;
                raw.parse()
                    .map(Self::Station)
                    .map_err(|_| CommandError::Station(raw.to_string()))
            },
            "show" => Ok(Self::Show),
            "metrics" => Ok(Self::Metrics),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn parse_line(argument: Option<&str>, verb: &'static str) -> Result<Line, CommandError> {
    Ok(argument.ok_or(CommandError::MissingArgument(verb))?.parse()?)
}

/// Help text for the console.
pub const HELP: &str = "\
commands:
  next <visit|food>     call the next ticket to this station
  recall <visit|food>   call this station's ticket again
  reset <visit|food>    zero a line
  station <n>           switch station
  show                  print the current view
  metrics               print Prometheus metrics
  quit                  exit";

/// Render what an operator sees.
#[must_use]
pub fn render_agent(state: &AgentState) -> String {
    let mut out = String::new();
    let status = if state.is_connected() {
        "connected"
    } else {
        "not connected"
    };
    let _ = writeln!(out, "Loket {} ({status})", state.station);

    for line in Line::ALL {
        let next = state
            .next_number(line)
            .map_or_else(|| "-".to_string(), |n| format!("{}{n}", line.prefix()));
        let mine = state
            .my_last_number(line)
            .map_or_else(|| "-".to_string(), |n| format!("{}{n}", line.prefix()));
        let recall = if state.can_recall(line) { "yes" } else { "no" };
        let _ = writeln!(
            out,
            "  {:<10} next {next:<6} serving {mine:<6} recall {recall}",
            line.label()
        );
    }
    out
}

/// Render the waiting-room board.
#[must_use]
pub fn render_board(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    for line in Line::ALL {
        let counters = snapshot.line(line);
        let at = counters
            .active_counter
            .map_or_else(|| "-".to_string(), |station| format!("Loket {station}"));
        let when = counters.last_called.as_deref().unwrap_or("-");
        let _ = writeln!(
            out,
            "{:<10} {}{:<4} {at:<9} {when:<6} served {}",
            line.label(),
            line.prefix(),
            counters.current_number,
            counters.total_served
        );
    }
    for (station, record) in snapshot.stations.iter() {
        let holding = record.map_or_else(
            || "-".to_string(),
            |record| format!("{}{} ({})", record.service.prefix(), record.number, record.timestamp),
        );
        let _ = writeln!(out, "  Loket {station}: {holding}");
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::agent::Connectivity;
    use crate::model::{StationRecord, StationTable};

    #[test]
    fn test_parse_commands() {
        assert_eq!("next visit".parse::<Command>(), Ok(Command::Next(Line::Visit)));
        assert_eq!("RECALL food".parse::<Command>(), Ok(Command::Recall(Line::Food)));
        assert_eq!("reset Food".parse::<Command>(), Ok(Command::Reset(Line::Food)));
        assert_eq!(
            "station 3".parse::<Command>(),
            Ok(Command::Station(StationId::new(3).unwrap()))
        );
        assert_eq!("  show ".parse::<Command>(), Ok(Command::Show));
        assert_eq!("quit".parse::<Command>(), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<Command>(), Err(CommandError::Empty));
        assert_eq!(
            "next".parse::<Command>(),
            Err(CommandError::MissingArgument("next"))
        );
        assert!(matches!("next lunch".parse::<Command>(), Err(CommandError::Line(_))));
        assert_eq!(
            "station 0".parse::<Command>(),
            Err(CommandError::Station("0".to_string()))
        );
        assert_eq!(
            "dance".parse::<Command>(),
            Err(CommandError::Unknown("dance".to_string()))
        );
    }

    #[test]
    fn test_render_agent_before_and_after_connect() {
        let station = StationId::new(2).unwrap();
        let idle = AgentState::new(station);
        let text = render_agent(&idle);
        assert!(text.contains("Loket 2 (not connected)"));
        assert!(text.contains("next -"));

        let mut snapshot = Snapshot {
            stations: StationTable::with_stations(StationId::range(3)),
            ..Snapshot::default()
        };
        snapshot.visit.issue(station, "08.15".to_string()).unwrap();
        snapshot.stations.record(
            station,
            StationRecord {
                service: Line::Visit,
                number: 1,
                timestamp: "08.15".to_string(),
            },
        );
        let live = AgentState {
            view: Some(snapshot.clone()),
            connectivity: Connectivity::Connected,
            ..idle
        };
        let text = render_agent(&live);
        assert!(text.contains("(connected)"));
        assert!(text.contains("next D2"));
        assert!(text.contains("serving D1"));

        let board = render_board(&snapshot);
        assert!(board.contains("Loket 2: D1 (08.15)"));
        assert!(board.contains("Loket 1: -"));
    }
}

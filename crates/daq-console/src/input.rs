//! Console input parsing

use std::fmt;

/// One line typed at the console prompt
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Help,
    Ports,
    Connect {
        port: Option<String>,
        baud_rate: Option<u32>,
    },
    Disconnect,
    Status,
    Led(u8),
    Calibrate,
    FullTest {
        record: Option<bool>,
    },
    Log,
    Quit,
    /// Anything else goes to the device as typed
    Raw(String),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsageError(pub &'static str);

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "usage: {}", self.0)
    }
}

impl std::error::Error for UsageError {}

pub const HELP: &str = "\
Commands:
  help                         show this text
  ports                        list serial ports
  connect [port] [baud]        open the connection (defaults to the last port)
  disconnect                   close the connection
  status                       show connection state
  led <0-255>                  set LED brightness
  calibrate                    guided load-cell calibration
  fulltest [record|norecord]   run the automated system test
  log                          print the event log
  quit                         exit
Any other line is sent to the device as-is.";

impl Input {
    pub fn parse(line: &str) -> Result<Self, UsageError> {
        let line = line.trim();
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(Input::Empty);
        };
        let rest: Vec<&str> = words.collect();

        let input = match (head, rest.as_slice()) {
            ("help" | "?", []) => Input::Help,
            ("ports", []) => Input::Ports,
            ("connect", args) if args.len() <= 2 => {
                let baud_rate = match args.get(1) {
                    Some(b) => Some(b.parse().map_err(|_| UsageError("connect [port] [baud]"))?),
                    None => None,
                };
                Input::Connect {
                    port: args.first().map(|p| p.to_string()),
                    baud_rate,
                }
            }
            ("connect", _) => return Err(UsageError("connect [port] [baud]")),
            ("disconnect", []) => Input::Disconnect,
            ("status", []) => Input::Status,
            ("led", [level]) => Input::Led(level.parse().map_err(|_| UsageError("led <0-255>"))?),
            ("led", _) => return Err(UsageError("led <0-255>")),
            ("calibrate", []) => Input::Calibrate,
            ("fulltest", []) => Input::FullTest { record: None },
            ("fulltest", ["record"]) => Input::FullTest { record: Some(true) },
            ("fulltest", ["norecord"]) => Input::FullTest { record: Some(false) },
            ("fulltest", _) => return Err(UsageError("fulltest [record|norecord]")),
            ("log", []) => Input::Log,
            ("quit" | "exit", []) => Input::Quit,
            _ => Input::Raw(line.to_string()),
        };
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_console_commands() {
        assert_eq!(Input::parse("  "), Ok(Input::Empty));
        assert_eq!(Input::parse("help"), Ok(Input::Help));
        assert_eq!(Input::parse("quit"), Ok(Input::Quit));
        assert_eq!(Input::parse("led 128"), Ok(Input::Led(128)));
        assert_eq!(
            Input::parse("connect /dev/ttyACM0 9600"),
            Ok(Input::Connect {
                port: Some("/dev/ttyACM0".to_string()),
                baud_rate: Some(9600),
            })
        );
        assert_eq!(
            Input::parse("connect"),
            Ok(Input::Connect {
                port: None,
                baud_rate: None,
            })
        );
        assert_eq!(
            Input::parse("fulltest norecord"),
            Ok(Input::FullTest { record: Some(false) })
        );
    }

    #[test]
    fn test_bad_arguments() {
        assert!(Input::parse("led 256").is_err());
        assert!(Input::parse("led").is_err());
        assert!(Input::parse("connect COM3 fast").is_err());
        assert!(Input::parse("fulltest maybe").is_err());
    }

    #[test]
    fn test_device_commands_pass_through() {
        assert_eq!(Input::parse(" PING "), Ok(Input::Raw("PING".to_string())));
        assert_eq!(
            Input::parse("SET_LED 12"),
            Ok(Input::Raw("SET_LED 12".to_string()))
        );
        // Device verbs are upper case; console verbs are not.
        assert_eq!(Input::parse("STATUS"), Ok(Input::Raw("STATUS".to_string())));
        assert_eq!(
            Input::parse("status now"),
            Ok(Input::Raw("status now".to_string()))
        );
    }
}

//! Interactive console for driving pulse devices by hand

use crate::pulse::PulseController;
use crate::registry::DeviceRegistry;
use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use thiserror::Error;
use tokio::sync::mpsc;

pub const HELP: &str = "\
commands:
  on <device>            trigger a device (its active value)
  off <device>           force a device back to rest
  set <device> <bool>    request a raw value (true/false, 1/0, on/off)
  list                   show every device
  help                   show this text
  quit                   stop the adapter
<device> is an id or a unique device name";

/// A parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Drive a device to its active (`true`) or rest (`false`) value
    Trigger { device: String, active: bool },
    /// Request a raw boolean value
    Set { device: String, value: bool },
    List,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown command '{0}', try 'help'")]
    UnknownCommand(String),

    #[error("'{0}' needs a device")]
    MissingDevice(&'static str),

    #[error("'{0}' is not a boolean")]
    InvalidBool(String),

    #[error("'set' needs a value")]
    MissingValue,
}

fn parse_bool(word: &str) -> Result<bool, ParseError> {
    match word.to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        _ => Err(ParseError::InvalidBool(word.to_string())),
    }
}

/// Parse one console line, `None` for blank lines
///
/// Device names may contain spaces; for `set` the value is the last word.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, ParseError> {
    let line = line.trim();
    let Some((verb, rest)) = line
        .split_once(char::is_whitespace)
        .map(|(verb, rest)| (verb, rest.trim()))
        .or_else(|| (!line.is_empty()).then_some((line, "")))
    else {
        return Ok(None);
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "on" | "off" => {
            let active = verb.eq_ignore_ascii_case("on");
            if rest.is_empty() {
                return Err(ParseError::MissingDevice(if active { "on" } else { "off" }));
            }
            ConsoleCommand::Trigger {
                device: rest.to_string(),
                active,
            }
        }
        "set" => {
            let (device, value) = rest
                .rsplit_once(char::is_whitespace)
                .ok_or(if rest.is_empty() {
                    ParseError::MissingDevice("set")
                } else {
                    ParseError::MissingValue
                })?;
            ConsoleCommand::Set {
                device: device.trim().to_string(),
                value: parse_bool(value)?,
            }
        }
        "list" | "ls" => ConsoleCommand::List,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        _ => return Err(ParseError::UnknownCommand(verb.to_string())),
    };

    Ok(Some(command))
}

/// Execute one console command against the registry
///
/// Returns the text to show the user, `None` once the user asked to quit.
pub fn handle_command(registry: &DeviceRegistry, cmd: ConsoleCommand) -> Option<String> {
    let output = match cmd {
        ConsoleCommand::Trigger { device, active } => request(registry, &device, |c| {
            if active {
                c.on_value()
            } else {
                !c.on_value()
            }
        }),
        ConsoleCommand::Set { device, value } => request(registry, &device, |_| value),
        ConsoleCommand::List => {
            if registry.is_empty() {
                "no devices".to_string()
            } else {
                registry
                    .describe_all()
                    .iter()
                    .map(|device| {
                        format!(
                            "{}  {:<24} on={:<5} active={}",
                            device.id, device.name, device.on, device.active
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
        ConsoleCommand::Help => HELP.to_string(),
        ConsoleCommand::Quit => return None,
    };

    Some(output)
}

fn request(
    registry: &DeviceRegistry,
    device: &str,
    pick: impl Fn(&PulseController) -> bool,
) -> String {
    match registry.resolve(device) {
        Some(record) => {
            let controller = &record.controller;
            let value = controller.request_value(pick(controller));
            format!("{} -> {}", controller.name(), value)
        }
        None => format!("unknown device '{}'", device),
    }
}

/// Read console lines until quit or end of input
///
/// Blocking; run it on a blocking thread. Parse errors are printed and the
/// loop continues. Returns once the receiver is gone or the user quits.
pub fn run_repl(tx: mpsc::UnboundedSender<ConsoleCommand>) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    loop {
        match rl.readline("pulse> ") {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                match parse_command(&line) {
                    Ok(Some(command)) => {
                        let quit = command == ConsoleCommand::Quit;
                        if tx.send(command).is_err() || quit {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => println!("{}", e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                let _ = tx.send(ConsoleCommand::Quit);
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PulseSettings;
    use crate::notify::{Notification, NotificationSink};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    fn parse(line: &str) -> ConsoleCommand {
        parse_command(line).unwrap().unwrap()
    }

    #[test]
    fn test_parse_trigger() {
        assert_eq!(
            parse("on Porch"),
            ConsoleCommand::Trigger {
                device: "Porch".into(),
                active: true
            }
        );
        assert_eq!(
            parse("  OFF  Front door  "),
            ConsoleCommand::Trigger {
                device: "Front door".into(),
                active: false
            }
        );
    }

    #[test]
    fn test_parse_set() {
        assert_eq!(
            parse("set Front door true"),
            ConsoleCommand::Set {
                device: "Front door".into(),
                value: true
            }
        );
        assert_eq!(
            parse("set abc 0"),
            ConsoleCommand::Set {
                device: "abc".into(),
                value: false
            }
        );
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse("list"), ConsoleCommand::List);
        assert_eq!(parse("help"), ConsoleCommand::Help);
        assert_eq!(parse("exit"), ConsoleCommand::Quit);
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_command("on"), Err(ParseError::MissingDevice("on")));
        assert_eq!(parse_command("set"), Err(ParseError::MissingDevice("set")));
        assert_eq!(parse_command("set Porch"), Err(ParseError::MissingValue));
        assert_eq!(
            parse_command("set Porch maybe"),
            Err(ParseError::InvalidBool("maybe".into()))
        );
        assert_eq!(
            parse_command("blink Porch"),
            Err(ParseError::UnknownCommand("blink".into()))
        );
    }

    fn registry() -> (DeviceRegistry, Arc<Mutex<Vec<Notification>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let recorder = log.clone();
        let sink: Arc<dyn NotificationSink> =
            Arc::new(move |n: Notification| recorder.lock().push(n));
        let mut registry = DeviceRegistry::new(sink);
        for (id, name, invert) in [("p1", "Porch", false), ("g1", "Gate", true)] {
            registry
                .add(PulseSettings {
                    id: id.to_string(),
                    name: name.to_string(),
                    invert,
                    duration: Duration::from_secs(5),
                    extend_on_retrigger: false,
                })
                .unwrap();
        }
        (registry, log)
    }

    fn run(registry: &DeviceRegistry, line: &str) -> Option<String> {
        handle_command(registry, parse(line))
    }

    #[tokio::test]
    async fn test_handle_trigger_uses_active_value() {
        let (registry, log) = registry();

        assert_eq!(run(&registry, "on Porch").as_deref(), Some("Porch -> true"));
        // Inverted device: active value is false
        assert_eq!(run(&registry, "on g1").as_deref(), Some("Gate -> false"));
        assert_eq!(registry.value("g1"), Ok(false));

        assert_eq!(run(&registry, "off Porch").as_deref(), Some("Porch -> false"));
        assert_eq!(run(&registry, "off Gate").as_deref(), Some("Gate -> true"));
        assert_eq!(log.lock().len(), 8);
    }

    #[tokio::test]
    async fn test_handle_set_and_unknown_device() {
        let (registry, _log) = registry();

        assert_eq!(run(&registry, "set p1 on").as_deref(), Some("Porch -> true"));
        assert_eq!(registry.value("p1"), Ok(true));
        assert_eq!(
            run(&registry, "set Shed true").as_deref(),
            Some("unknown device 'Shed'")
        );
    }

    #[tokio::test]
    async fn test_handle_list_help_quit() {
        let (registry, _log) = registry();
        registry.set_value("p1", true).unwrap();

        let listing = run(&registry, "list").unwrap();
        let lines: Vec<_> = listing.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("g1  Gate"));
        assert!(lines[0].contains("on=true") && lines[0].ends_with("active=false"));
        assert!(lines[1].starts_with("p1  Porch"));
        assert!(lines[1].ends_with("active=true"));

        assert_eq!(run(&registry, "help").as_deref(), Some(HELP));
        assert_eq!(run(&registry, "quit"), None);
    }

    #[tokio::test]
    async fn test_handle_list_empty() {
        let sink: Arc<dyn NotificationSink> = Arc::new(|_: Notification| {});
        let registry = DeviceRegistry::new(sink);
        assert_eq!(
            handle_command(&registry, ConsoleCommand::List).as_deref(),
            Some("no devices")
        );
    }
}

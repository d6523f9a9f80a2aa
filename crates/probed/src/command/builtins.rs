//! Commands every console understands.

use std::sync::Arc;

use super::{ActionContext, ActionError, Command, CommandParser, PrepareError, Sender};

struct Builtin {
    name: &'static str,
    usage: &'static str,
    summary: &'static str,
}

const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "help",
        usage: "help [name]",
        summary: "list commands, or describe one",
    },
    Builtin {
        name: "version",
        usage: "version",
        summary: "print the console version",
    },
    Builtin {
        name: "session",
        usage: "session",
        summary: "print the session id, job id and charset",
    },
    Builtin {
        name: "process",
        usage: "process",
        summary: "print the attached process id and uptime",
    },
    Builtin {
        name: "quit",
        usage: "quit",
        summary: "close this session",
    },
    Builtin {
        name: "exit",
        usage: "exit",
        summary: "close this session",
    },
    Builtin {
        name: "shutdown",
        usage: "shutdown",
        summary: "stop the console for every session",
    },
];

/// Parser for the builtin command set.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCommands;

impl CommandParser for BuiltinCommands {
    fn parse(&self, line: &str) -> Result<Command, PrepareError> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Err(PrepareError::not_found(line.trim()));
        };
        let arguments: Vec<&str> = words.collect();

        match name {
            "help" => help(&arguments),
            "version" => {
                no_arguments(name, &arguments)?;
                Ok(Command::new(name, reply(version_text())))
            }
            "session" => {
                no_arguments(name, &arguments)?;
                Ok(Command::new(name, session))
            }
            "process" => {
                no_arguments(name, &arguments)?;
                Ok(Command::new(name, process))
            }
            "quit" | "exit" => {
                no_arguments(name, &arguments)?;
                Ok(Command::quit(name, reply("Bye!".to_owned())))
            }
            "shutdown" => {
                no_arguments(name, &arguments)?;
                Ok(Command::shutdown(
                    name,
                    reply("console is shutting down.".to_owned()),
                ))
            }
            other => Err(PrepareError::not_found(other)),
        }
    }
}

fn no_arguments(name: &str, arguments: &[&str]) -> Result<(), PrepareError> {
    match arguments.first() {
        None => Ok(()),
        Some(first) => Err(PrepareError::preparation(
            name,
            format!("unexpected argument '{first}'"),
        )),
    }
}

fn help(arguments: &[&str]) -> Result<Command, PrepareError> {
    let text = match arguments {
        [] => {
            let width = BUILTINS.iter().map(|b| b.usage.len()).max().unwrap_or(0);
            BUILTINS.iter().fold(String::from("commands:"), |mut text, builtin| {
                text.push_str(&format!("\n  {:width$}  {}", builtin.usage, builtin.summary));
                text
            })
        }
        [topic] => {
            let builtin = BUILTINS
                .iter()
                .find(|builtin| builtin.name == *topic)
                .ok_or_else(|| {
                    PrepareError::preparation("help", format!("no help for '{topic}'"))
                })?;
            format!("usage: {}\n  {}", builtin.usage, builtin.summary)
        }
        [_, extra, ..] => {
            return Err(PrepareError::preparation(
                "help",
                format!("unexpected argument '{extra}'"),
            ));
        }
    };
    Ok(Command::new("help", reply(text)))
}

fn version_text() -> String {
    format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// An action that sends `text` as one final chunk.
fn reply(
    text: String,
) -> impl Fn(&ActionContext, Arc<dyn Sender>) -> Result<(), ActionError> + Send + Sync + 'static {
    move |_context: &ActionContext, sender: Arc<dyn Sender>| {
        sender.send(true, &text);
        Ok(())
    }
}

fn session(context: &ActionContext, sender: Arc<dyn Sender>) -> Result<(), ActionError> {
    sender.send(false, &format!("session id : {}\n", context.session_id()));
    sender.send(false, &format!("job id     : {}\n", context.job_id()));
    sender.send(true, &format!("charset    : {}", context.charset()));
    Ok(())
}

fn process(context: &ActionContext, sender: Arc<dyn Sender>) -> Result<(), ActionError> {
    let process = context.process();
    sender.send(false, &format!("pid    : {}\n", process.pid()));
    sender.send(false, &format!("name   : {}\n", process.name()));
    sender.send(true, &format!("uptime : {}s", process.uptime().as_secs()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::command::CommandKind;

    #[rstest]
    #[case("help", CommandKind::Ordinary)]
    #[case("help quit", CommandKind::Ordinary)]
    #[case("  version  ", CommandKind::Ordinary)]
    #[case("session", CommandKind::Ordinary)]
    #[case("process", CommandKind::Ordinary)]
    #[case("quit", CommandKind::Quit)]
    #[case("exit", CommandKind::Quit)]
    #[case("shutdown", CommandKind::Shutdown)]
    fn parses_builtins(#[case] line: &str, #[case] kind: CommandKind) {
        let command = BuiltinCommands.parse(line).expect("builtin");
        assert_eq!(command.kind(), kind);
    }

    #[test]
    fn unknown_names_are_not_found() {
        let error = BuiltinCommands.parse("frobnicate now").expect_err("unknown");
        assert_eq!(error.to_string(), "command \"frobnicate\" not found.");
    }

    #[rstest]
    #[case("quit now", "command \"quit\" prepare failed : unexpected argument 'now'")]
    #[case("help nothing", "command \"help\" prepare failed : no help for 'nothing'")]
    #[case("help a b", "command \"help\" prepare failed : unexpected argument 'b'")]
    fn rejects_bad_arguments(#[case] line: &str, #[case] message: &str) {
        let error = BuiltinCommands.parse(line).expect_err("bad arguments");
        assert_eq!(error.to_string(), message);
    }
}

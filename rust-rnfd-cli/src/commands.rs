//! The `nfdc` command registry: known noun/verb pairs and the mapping from
//! command-line tokens to control-protocol requests.

use rust_rnfd_common::Error;
use rust_rnfd_fwd::mgmt::ControlRequest;
use serde_json::Value;

/// One management command: its noun/verb pair and accepted arguments.
pub struct CommandDef {
    pub noun: &'static str,
    pub verb: &'static str,
    /// Argument keys accepted as `key=value` tokens; a trailing `?` marks
    /// an optional argument.
    pub args: &'static [&'static str],
    pub help: &'static str,
}

pub const COMMANDS: &[CommandDef] = &[
    CommandDef {
        noun: "status",
        verb: "show",
        args: &[],
        help: "print forwarder counters",
    },
    CommandDef {
        noun: "face",
        verb: "list",
        args: &[],
        help: "list faces",
    },
    CommandDef {
        noun: "face",
        verb: "create",
        args: &["uri"],
        help: "create an outbound face, e.g. uri=tcp://host:6363",
    },
    CommandDef {
        noun: "face",
        verb: "destroy",
        args: &["id"],
        help: "destroy a face by id",
    },
    CommandDef {
        noun: "route",
        verb: "list",
        args: &[],
        help: "list FIB entries",
    },
    CommandDef {
        noun: "route",
        verb: "add",
        args: &["prefix", "face", "cost?"],
        help: "add a nexthop, e.g. prefix=/example face=300 cost=10",
    },
    CommandDef {
        noun: "route",
        verb: "remove",
        args: &["prefix", "face"],
        help: "remove a nexthop",
    },
    CommandDef {
        noun: "strategy",
        verb: "list",
        args: &[],
        help: "list strategy choices",
    },
    CommandDef {
        noun: "strategy",
        verb: "set",
        args: &["prefix", "strategy"],
        help: "choose a strategy for a prefix",
    },
    CommandDef {
        noun: "strategy",
        verb: "unset",
        args: &["prefix"],
        help: "restore the inherited strategy for a prefix",
    },
    CommandDef {
        noun: "cs",
        verb: "info",
        args: &[],
        help: "show content-store usage",
    },
    CommandDef {
        noun: "cs",
        verb: "erase",
        args: &["prefix"],
        help: "erase cached Data under a prefix",
    },
];

fn find_command(noun: &str, verb: &str) -> Option<&'static CommandDef> {
    COMMANDS.iter().find(|c| c.noun == noun && c.verb == verb)
}

/// Parses `<noun> <verb> [key=value…]` into a control request.
pub fn parse_command(tokens: &[String]) -> Result<ControlRequest, Error> {
    let noun = tokens.first().map(String::as_str).unwrap_or("");
    let verb = tokens.get(1).map(String::as_str).unwrap_or("");

    let def = find_command(noun, verb)
        .ok_or_else(|| Error::NoSuchCommand(format!("{} {}", noun, verb).trim().to_string()))?;

    let mut args = serde_json::Map::new();
    for token in &tokens[2..] {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| Error::Other(format!("expected key=value, got '{}'", token)))?;
        let accepted = def
            .args
            .iter()
            .any(|a| a.trim_end_matches('?') == key);
        if !accepted {
            return Err(Error::Other(format!(
                "{} {} does not take argument '{}'",
                noun, verb, key
            )));
        }
        let json_value = match value.parse::<u64>() {
            Ok(n) => Value::from(n),
            Err(_) => Value::from(value),
        };
        args.insert(key.to_string(), json_value);
    }

    // every non-optional argument must be present
    for arg in def.args {
        if !arg.ends_with('?') && !args.contains_key(*arg) {
            return Err(Error::Other(format!(
                "{} {} requires argument '{}'",
                noun, verb, arg
            )));
        }
    }

    Ok(ControlRequest {
        noun: noun.to_string(),
        verb: verb.to_string(),
        args,
    })
}

/// One-line usage for every known command.
pub fn usage() -> String {
    let mut out = String::from("commands:\n");
    for def in COMMANDS {
        out.push_str(&format!(
            "  nfdc {} {} {}\n      {}\n",
            def.noun,
            def.verb,
            def.args.join(" "),
            def.help
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn known_command_with_arguments() {
        let request = parse_command(&tokens("route add prefix=/example face=300")).unwrap();
        assert_eq!(request.noun, "route");
        assert_eq!(request.verb, "add");
        assert_eq!(request.args["prefix"], "/example");
        assert_eq!(request.args["face"], 300);
    }

    #[test]
    fn unknown_verb_is_no_such_command() {
        let err = parse_command(&tokens("route explode")).unwrap_err();
        assert!(matches!(err, Error::NoSuchCommand(_)));
        assert!(err.to_string().contains("route explode"));
    }

    #[test]
    fn unknown_noun_is_no_such_command() {
        let err = parse_command(&tokens("warp status")).unwrap_err();
        assert!(matches!(err, Error::NoSuchCommand(_)));
    }

    #[test]
    fn empty_invocation_is_no_such_command() {
        assert!(matches!(parse_command(&[]), Err(Error::NoSuchCommand(_))));
    }

    #[test]
    fn missing_required_argument_fails() {
        let err = parse_command(&tokens("route add prefix=/example")).unwrap_err();
        assert!(err.to_string().contains("face"));
    }

    #[test]
    fn optional_arguments_may_be_omitted() {
        assert!(parse_command(&tokens("route add prefix=/example face=1 cost=5")).is_ok());
        assert!(parse_command(&tokens("route add prefix=/example face=1")).is_ok());
    }

    #[test]
    fn unexpected_argument_fails() {
        let err = parse_command(&tokens("cs erase prefix=/a bogus=1")).unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }
}

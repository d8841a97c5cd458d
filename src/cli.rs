//! Minimal argument parsing for the `serve` subcommand: no `clap`
//! dependency, hand-rolled over `std::env::args()`.

#[derive(Debug, Clone, PartialEq)]
pub enum Protocol {
    Generic,
    Envoy,
}

#[derive(Debug, Clone)]
pub struct ServeArgs {
    pub protocol: Protocol,
    pub port: Option<u16>,
    pub name: Option<String>,
    pub auxdata: Option<String>,
    pub policy_domain: Option<String>,
}

impl Default for ServeArgs {
    fn default() -> Self {
        ServeArgs {
            protocol: Protocol::Generic,
            port: None,
            name: None,
            auxdata: None,
            policy_domain: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("unknown subcommand '{0}', expected 'serve'")]
    UnknownSubcommand(String),
    #[error("missing subcommand, expected 'serve'")]
    MissingSubcommand,
    #[error("unrecognized flag '{0}'")]
    UnrecognizedFlag(String),
    #[error("invalid value for --{flag}: {value}")]
    InvalidValue { flag: String, value: String },
}

/// Parses `serve --protocol=<generic|envoy> --port=<n> --name=<svc>
/// --auxdata=<path> --policy-domain=<path>` from an arbitrary argument
/// iterator (tests pass a `Vec<String>`; `main` passes `env::args()`).
pub fn parse_serve_args<I: IntoIterator<Item = String>>(args: I) -> Result<ServeArgs, CliError> {
    let mut args = args.into_iter();
    match args.next() {
        Some(cmd) if cmd == "serve" => {}
        Some(other) => return Err(CliError::UnknownSubcommand(other)),
        None => return Err(CliError::MissingSubcommand),
    }

    let mut parsed = ServeArgs::default();
    for arg in args {
        let (flag, value) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), value.to_string()),
            None => return Err(CliError::UnrecognizedFlag(arg)),
        };

        match flag.as_str() {
            "--protocol" => {
                parsed.protocol = match value.as_str() {
                    "generic" => Protocol::Generic,
                    "envoy" => Protocol::Envoy,
                    _ => {
                        return Err(CliError::InvalidValue {
                            flag: "protocol".to_string(),
                            value,
                        })
                    }
                };
            }
            "--port" => {
                parsed.port = Some(value.parse().map_err(|_| CliError::InvalidValue {
                    flag: "port".to_string(),
                    value: value.clone(),
                })?);
            }
            "--name" => parsed.name = Some(value),
            "--auxdata" => parsed.auxdata = Some(value),
            "--policy-domain" => parsed.policy_domain = Some(value),
            other => return Err(CliError::UnrecognizedFlag(other.to_string())),
        }
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn parses_all_recognized_flags() {
        let parsed = parse_serve_args(args(
            "serve --protocol=envoy --port=9090 --name=edge --auxdata=/tmp/aux.json --policy-domain=/tmp/domain.yaml",
        ))
        .unwrap();
        assert_eq!(parsed.protocol, Protocol::Envoy);
        assert_eq!(parsed.port, Some(9090));
        assert_eq!(parsed.name.as_deref(), Some("edge"));
        assert_eq!(parsed.auxdata.as_deref(), Some("/tmp/aux.json"));
        assert_eq!(parsed.policy_domain.as_deref(), Some("/tmp/domain.yaml"));
    }

    #[test]
    fn defaults_to_generic_protocol() {
        let parsed = parse_serve_args(args("serve")).unwrap();
        assert_eq!(parsed.protocol, Protocol::Generic);
    }

    #[test]
    fn rejects_unknown_subcommand() {
        assert!(matches!(
            parse_serve_args(args("bogus")),
            Err(CliError::UnknownSubcommand(_))
        ));
    }

    #[test]
    fn rejects_missing_subcommand() {
        assert!(matches!(
            parse_serve_args(Vec::<String>::new()),
            Err(CliError::MissingSubcommand)
        ));
    }

    #[test]
    fn rejects_unrecognized_flag() {
        assert!(matches!(
            parse_serve_args(args("serve --bogus=1")),
            Err(CliError::UnrecognizedFlag(_))
        ));
    }

    #[test]
    fn rejects_invalid_protocol_value() {
        assert!(matches!(
            parse_serve_args(args("serve --protocol=nope")),
            Err(CliError::InvalidValue { .. })
        ));
    }
}

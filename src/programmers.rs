//! Programmer registration and dispatch
//!
//! This module provides a centralized registry for all programmers, with support
//! for feature-gated inclusion and dynamic help text generation.

use picprog_core::icsp::IcspTransport;
use std::str::FromStr;
use thiserror::Error;

/// Information about a programmer
pub struct ProgrammerInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Errors from programmer selection
#[derive(Debug, Error)]
pub enum ProgrammerError {
    #[error("empty programmer specification")]
    Empty,

    #[error("malformed programmer parameter '{0}' (expected key=value)")]
    MalformedParam(String),

    #[error("unknown programmer: {0}")]
    Unknown(String),

    #[error("programmer {programmer} does not take parameter '{param}'")]
    UnknownParam { programmer: String, param: String },

    #[error("unknown part: {0}")]
    UnknownPart(String),
}

/// Get information about all available programmers (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_programmers() -> Vec<ProgrammerInfo> {
    let mut programmers = Vec::new();

    #[cfg(feature = "dummy")]
    programmers.push(ProgrammerInfo {
        name: "dummy",
        aliases: &["emulator"],
        description: "In-memory PIC18F emulator for testing (part=<name>)",
    });

    programmers
}

/// Generate help text listing all available programmers
pub fn programmer_help() -> String {
    let programmers = available_programmers();

    if programmers.is_empty() {
        return "No programmers available (recompile with programmer features enabled)".to_string();
    }

    let mut help = String::from("Available programmers:\n");
    for p in &programmers {
        help.push_str(&format!("  {:12} - {}\n", p.name, p.description));
    }
    help
}

/// Generate a short list of programmer names for CLI help
pub fn programmer_names_short() -> String {
    let programmers = available_programmers();
    let names: Vec<&str> = programmers.iter().map(|p| p.name).collect();
    names.join(", ")
}

/// Resolve a programmer name or alias to its primary name
pub fn find_programmer(name: &str) -> Option<&'static str> {
    available_programmers()
        .into_iter()
        .find(|p| p.name == name || p.aliases.contains(&name))
        .map(|p| p.name)
}

/// A parsed programmer specification
///
/// Format: "name" or "name:option1=value1,option2=value2"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgrammerParams {
    pub name: String,
    pub params: Vec<(String, String)>,
}

impl ProgrammerParams {
    /// Value of parameter `key`, if given
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Fail on any parameter not in `known`
    fn expect_only(&self, programmer: &str, known: &[&str]) -> Result<(), ProgrammerError> {
        match self.params.iter().find(|(k, _)| !known.contains(&k.as_str())) {
            Some((param, _)) => Err(ProgrammerError::UnknownParam {
                programmer: programmer.to_string(),
                param: param.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl FromStr for ProgrammerParams {
    type Err = ProgrammerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, opts) = match s.split_once(':') {
            Some((name, opts)) => (name, Some(opts)),
            None => (s, None),
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(ProgrammerError::Empty);
        }

        let params = opts
            .into_iter()
            .flat_map(|opts| opts.split(','))
            .filter(|opt| !opt.trim().is_empty())
            .map(|opt| match opt.split_once('=') {
                Some((k, v)) => Ok((k.trim().to_string(), v.trim().to_string())),
                None => Err(ProgrammerError::MalformedParam(opt.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: name.to_string(),
            params,
        })
    }
}

/// Open the programmer described by `spec`
#[allow(unused_variables)]
pub fn open_programmer(
    spec: &ProgrammerParams,
) -> Result<Box<dyn IcspTransport>, Box<dyn std::error::Error>> {
    let canonical_name = match find_programmer(&spec.name) {
        Some(n) => n,
        None => return Err(unknown_programmer_error(&spec.name)),
    };

    match canonical_name {
        #[cfg(feature = "dummy")]
        "dummy" => {
            use picprog_dummy::{DummyConfig, DummyPic};

            spec.expect_only(canonical_name, &["part"])?;
            let part = spec.get("part").unwrap_or("PIC18F452");
            let config = DummyConfig::for_part(part)
                .ok_or_else(|| ProgrammerError::UnknownPart(part.to_string()))?;
            log::info!("Opening emulated {}...", part);
            Ok(Box::new(DummyPic::new(config)))
        }

        _ => Err(unknown_programmer_error(&spec.name)),
    }
}

fn unknown_programmer_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("{}\n\n", ProgrammerError::Unknown(name.to_string()));
    msg.push_str(&programmer_help());
    msg.push_str("\nUse 'picprog list-programmers' for more details");
    msg.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_only() {
        let spec: ProgrammerParams = "dummy".parse().unwrap();
        assert_eq!(spec.name, "dummy");
        assert!(spec.params.is_empty());
    }

    #[test]
    fn test_parse_params() {
        let spec: ProgrammerParams = "dummy:part=PIC18F2550, foo = bar".parse().unwrap();
        assert_eq!(spec.get("part"), Some("PIC18F2550"));
        assert_eq!(spec.get("foo"), Some("bar"));
        assert_eq!(spec.get("baz"), None);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            "dummy:part".parse::<ProgrammerParams>(),
            Err(ProgrammerError::MalformedParam(_))
        ));
        assert!(matches!(
            ":part=x".parse::<ProgrammerParams>(),
            Err(ProgrammerError::Empty)
        ));
    }

    #[test]
    fn test_expect_only() {
        let spec: ProgrammerParams = "dummy:part=18f452,speed=1".parse().unwrap();
        assert!(spec.expect_only("dummy", &["part", "speed"]).is_ok());
        assert!(matches!(
            spec.expect_only("dummy", &["part"]),
            Err(ProgrammerError::UnknownParam { param, .. }) if param == "speed"
        ));
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_open_dummy() {
        assert_eq!(find_programmer("emulator"), Some("dummy"));
        assert!(open_programmer(&"dummy:part=18F4550".parse().unwrap()).is_ok());
        assert!(open_programmer(&"dummy:part=18F1320".parse().unwrap()).is_err());
        assert!(open_programmer(&"nope".parse().unwrap()).is_err());
    }
}

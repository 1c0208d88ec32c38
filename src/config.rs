use std::path::PathBuf;

use anyhow::{bail, Result};

pub const DEFAULT_INTERFACE: &str = "en0";
pub const DEFAULT_RULES: &str = "SnortPatternsFull2.json";

pub const USAGE: &str = "Usage: dpi-sniffer in:<input-interface> out:<output-interface> rules:<rules file>\n\
                         This tool may require root privileges.";

/// Resolved command-line surface: where to capture, where to inject, and
/// which rule catalog to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnifferConfig {
    pub input: String,
    pub output: String,
    pub rules: PathBuf,
}

impl SnifferConfig {
    /// Folds `in:<iface>`, `out:<iface>` and `rules:<path>` arguments, in any
    /// order, into a config. `auto` short-circuits to the defaults and
    /// ignores everything after it.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<SnifferConfig> {
        let mut input = None;
        let mut output = None;
        let mut rules = None;
        for arg in args {
            let arg = arg.as_ref();
            if arg == "auto" {
                return Ok(SnifferConfig {
                    input: DEFAULT_INTERFACE.to_string(),
                    output: DEFAULT_INTERFACE.to_string(),
                    rules: PathBuf::from(DEFAULT_RULES),
                });
            }
            match arg.split_once(':') {
                Some(("in", value)) => input = Some(value.to_string()),
                Some(("out", value)) => output = Some(value.to_string()),
                Some(("rules", value)) => rules = Some(PathBuf::from(value)),
                _ => bail!("unrecognized argument: {}", arg),
            }
        }
        match (input, output, rules) {
            (Some(input), Some(output), Some(rules)) => Ok(SnifferConfig {
                input,
                output,
                rules,
            }),
            _ => bail!("missing in:/out:/rules: argument"),
        }
    }
}

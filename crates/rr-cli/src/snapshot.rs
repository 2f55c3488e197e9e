//! Loading rule stores from files.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use clap::Args;
use serde_json::{Map, Value};

use rr_compiler::{declarations, parse_rule, RuleError};
use rr_core::{EmptyValues, ValueSource};
use rr_engine::Rules;

use crate::error::CliError;

/// Where the rules and their registries come from.
#[derive(Debug, Clone, Args)]
pub struct StoreArgs {
    /// Root rules file
    #[arg(short, long)]
    pub rules: String,

    /// Fragment files appended after the root, in order
    #[arg(short, long)]
    pub append: Vec<String>,

    /// JSON object of named values
    #[arg(long)]
    pub values: Option<String>,

    /// JSON object of named rule fragments
    #[arg(long)]
    pub fragments: Option<String>,

    /// Extra rule categories
    #[arg(long = "protocol")]
    pub protocols: Vec<String>,
}

/// Value and fragment registries shared by every store of one run.
#[derive(Clone)]
pub struct Registries {
    pub values: Arc<dyn ValueSource>,
    pub fragments: Arc<dyn ValueSource>,
}

impl Registries {
    pub fn load(args: &StoreArgs) -> Result<Self, CliError> {
        Ok(Self {
            values: read_registry(args.values.as_deref())?,
            fragments: read_registry(args.fragments.as_deref())?,
        })
    }
}

/// A declaration the compiler refused.
pub struct Dropped {
    pub source: String,
    pub raw: String,
    pub error: RuleError,
}

pub fn read_text(path: &str) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_string(),
        source,
    })
}

fn read_registry(path: Option<&str>) -> Result<Arc<dyn ValueSource>, CliError> {
    let Some(path) = path else {
        return Ok(Arc::new(EmptyValues));
    };
    let text = read_text(path)?;
    let value: Value = serde_json::from_str(&text).map_err(|source| CliError::Json {
        path: path.to_string(),
        source,
    })?;
    match value {
        Value::Object(map) => Ok(Arc::new(map)),
        _ => Err(CliError::Usage(format!("'{path}' must hold a JSON object"))),
    }
}

fn builder(registries: &Registries, protocols: &[String]) -> rr_engine::RulesBuilder {
    protocols.iter().fold(
        Rules::builder()
            .shared_values(Arc::clone(&registries.values))
            .shared_fragments(Arc::clone(&registries.fragments)),
        |builder, name| builder.protocol(name),
    )
}

/// Store with the root file installed and every appended file replayed.
pub fn load_store(args: &StoreArgs, registries: &Registries) -> Result<Rules, CliError> {
    let mut rules = builder(registries, &args.protocols).build();
    rules.set_root(&read_text(&args.rules)?);
    for path in &args.append {
        rules.append(&read_text(path)?);
    }
    log::debug!("loaded {} with {} appended files", args.rules, args.append.len());
    Ok(rules)
}

/// Store from a single rules file, used for host peers.
pub fn load_peer(path: &str, args: &StoreArgs, registries: &Registries) -> Result<Rules, CliError> {
    let mut rules = builder(registries, &args.protocols).build();
    rules.set_root(&read_text(path)?);
    Ok(rules)
}

/// Compile every source again declaration by declaration and collect the
/// ones that were dropped.
pub fn dropped_declarations(
    args: &StoreArgs,
    registries: &Registries,
    rules: &Rules,
) -> Result<Vec<Dropped>, CliError> {
    let sources = std::iter::once((args.rules.as_str(), true))
        .chain(args.append.iter().map(|path| (path.as_str(), false)));

    let mut dropped = Vec::new();
    for (path, root) in sources {
        let text = read_text(path)?;
        for declaration in declarations(&text, root, &*registries.fragments, &*registries.values) {
            if let Err(error) = parse_rule(&declaration, root, rules.protocols()) {
                dropped.push(Dropped {
                    source: file_name(path),
                    raw: declaration.raw,
                    error,
                });
            }
        }
    }
    Ok(dropped)
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &str) -> String {
        let path = std::env::temp_dir().join(format!("rr-cli-{}-{name}", std::process::id()));
        fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn args(rules: String) -> StoreArgs {
        StoreArgs {
            rules,
            append: Vec::new(),
            values: None,
            fragments: None,
            protocols: Vec::new(),
        }
    }

    #[test]
    fn loads_registries_and_appends() {
        let mut args = args(temp_file("root.txt", "a.com http://{target}.com\n${shared}"));
        args.append.push(temp_file("extra.txt", "c.com 3.3.3.3"));
        args.fragments = Some(temp_file("fragments.json", r#"{"shared": "b.com 2.2.2.2"}"#));
        args.values = Some(temp_file("values.json", r#"{"target": "x"}"#));

        let registries = Registries::load(&args).unwrap();
        let rules = load_store(&args, &registries).unwrap();
        let snapshot = rules.reader().snapshot();
        assert_eq!(snapshot.rules("host").len(), 2);
        assert_eq!(snapshot.rules("rule").len(), 1);
    }

    #[test]
    fn registry_must_be_an_object() {
        let mut args = args(temp_file("root2.txt", ""));
        args.values = Some(temp_file("values2.json", "[1, 2]"));
        assert!(matches!(Registries::load(&args), Err(CliError::Usage(_))));

        args.values = Some(temp_file("values3.json", "{"));
        assert!(matches!(Registries::load(&args), Err(CliError::Json { .. })));
    }

    #[test]
    fn reports_dropped_lines() {
        let args = args(temp_file("root3.txt", "a.com 1.1.1.1\n!b.com 2.2.2.2\n/(/ http://x.com"));
        let registries = Registries::load(&args).unwrap();
        let rules = load_store(&args, &registries).unwrap();
        let dropped = dropped_declarations(&args, &registries, &rules).unwrap();
        assert_eq!(dropped.len(), 2);
        assert!(matches!(dropped[0].error, RuleError::NegatedLiteral(_)));
        assert!(matches!(dropped[1].error, RuleError::InvalidRegex { .. }));
    }
}

use crate::filter::{Exclusion, Inclusion, RuleSpec};
use crate::format::list_formatters;
use crate::priority::Priority;
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error};

pub const PACKAGE: &str = "journal-brief";

const DEFAULT_CURSOR_FILE: &str = "cursor";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{problem}\n  in \"{path}\", line {line}, column {column}:\n{context}")]
    Syntax {
        path: String,
        line: usize,
        column: usize,
        problem: String,
        context: String,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{}", render_problems(.0))]
    Semantic(Vec<SemanticError>),
}

/// A well-formed config value that is not acceptable.
#[derive(Debug, Clone)]
pub struct SemanticError {
    pub item: String,
    pub message: String,
    /// The offending part of the config, as YAML.
    pub conf: String,
    /// Position within a rules list.
    pub index: Option<usize>,
}

impl SemanticError {
    fn new(message: impl Into<String>, item: impl Into<String>, conf: &Value) -> Self {
        SemanticError {
            item: item.into(),
            message: message.into(),
            conf: serde_yaml::to_string(conf).unwrap_or_else(|_| format!("{conf:?}\n")),
            index: None,
        }
    }

    fn at(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut conf = self.conf.clone();
        let at = match self.index {
            None => String::new(),
            Some(index) => {
                if index > 0 {
                    // Earlier list items are elided.
                    if let Some(eol) = conf.find('\n') {
                        conf.insert_str(eol + 1, "(...)\n");
                    }
                }
                format!("at item {index}, ")
            }
        };
        write!(
            f,
            "error: {}: {}\n  {at}in:\n{}",
            self.item,
            self.message,
            conf.trim_end()
        )
    }
}

fn render_problems(problems: &[SemanticError]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub cursor_file: PathBuf,
    pub debug: bool,
    pub exclusions: Vec<RuleSpec>,
    pub inclusions: Vec<RuleSpec>,
    pub output: Option<Vec<String>>,
    pub priority: Option<Priority>,
}

impl Config {
    fn empty(config_dir: &Path) -> Self {
        Config {
            cursor_file: config_dir.join(DEFAULT_CURSOR_FILE),
            debug: false,
            exclusions: Vec::new(),
            inclusions: Vec::new(),
            output: None,
            priority: None,
        }
    }
}

pub fn default_config_dir() -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default();
    home.join(".config").join(PACKAGE)
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join(format!("{PACKAGE}.conf"))
}

/// Load the config file, or the default one when `path` is `None`.
///
/// A missing file is an empty configuration.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(default_config_path, Path::to_path_buf);
    let config_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file");
            return Ok(Config::empty(&config_dir));
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                source,
            });
        }
    };

    parse_config(&raw, &path.display().to_string(), &config_dir)
}

/// Parse and validate config text; relative cursor files resolve inside `config_dir`.
pub fn parse_config(raw: &str, path: &str, config_dir: &Path) -> Result<Config, ConfigError> {
    let doc: Value = serde_yaml::from_str(raw).map_err(|source| syntax_error(raw, path, source))?;

    let map = match doc {
        Value::Null => Mapping::new(),
        Value::Mapping(map) => map,
        other => {
            let problem = SemanticError::new("must be a map", "top level", &other);
            error!("{problem}");
            return Err(ConfigError::Semantic(vec![problem]));
        }
    };

    let mut config = Config::empty(config_dir);
    let mut problems = Vec::new();

    for (key, value) in &map {
        let Some(keyword) = key.as_str() else {
            problems.push(SemanticError::new(
                "unexpected keyword",
                format!("{key:?}"),
                &single(key.clone(), value.clone()),
            ));
            continue;
        };
        let conf = single(key.clone(), value.clone());

        match keyword {
            "cursor-file" => match value {
                Value::String(s) => config.cursor_file = config_dir.join(s),
                Value::Number(n) => config.cursor_file = config_dir.join(n.to_string()),
                _ => problems.push(SemanticError::new("expected string", keyword, &conf)),
            },
            "debug" => match value {
                Value::Bool(b) => config.debug = *b,
                Value::Number(n) if n.is_i64() || n.is_u64() => {
                    config.debug = n.as_i64() != Some(0);
                }
                _ => problems.push(SemanticError::new("expected bool", keyword, &conf)),
            },
            "exclusions" | "inclusions" => {
                let rules = validate_rules(keyword, value, &mut problems);
                if keyword == "exclusions" {
                    config.exclusions = rules;
                } else {
                    config.inclusions = rules;
                }
            }
            "output" => {
                if let Some(output) = validate_output(value, &conf, &mut problems) {
                    config.output = Some(output);
                }
            }
            "priority" => match Priority::from_yaml(value) {
                Some(priority) => config.priority = Some(priority),
                None => problems.push(SemanticError::new(
                    format!(
                        "invalid priority, must be in [{}]",
                        Priority::labels().join(", ")
                    ),
                    keyword,
                    &conf,
                )),
            },
            _ => problems.push(SemanticError::new("unexpected keyword", keyword, &conf)),
        }
    }

    if problems.is_empty() {
        Ok(config)
    } else {
        for problem in &problems {
            error!("{problem}");
        }
        Err(ConfigError::Semantic(problems))
    }
}

fn single(key: Value, value: Value) -> Value {
    let mut map = Mapping::new();
    map.insert(key, value);
    Value::Mapping(map)
}

fn syntax_error(raw: &str, path: &str, source: serde_yaml::Error) -> ConfigError {
    let Some(location) = source.location() else {
        return ConfigError::Parse {
            path: path.to_string(),
            source,
        };
    };

    let line = location.line();
    let column = location.column();
    let text = raw.lines().nth(line.saturating_sub(1)).unwrap_or_default();
    let context = format!("{text}\n{}^", " ".repeat(column.saturating_sub(1)));
    let problem = source.to_string();
    let problem = problem
        .split(" at line ")
        .next()
        .unwrap_or(&problem)
        .to_string();

    let err = ConfigError::Syntax {
        path: path.to_string(),
        line,
        column,
        problem,
        context,
    };
    error!("{err}");
    err
}

fn validate_rules(key: &str, value: &Value, problems: &mut Vec<SemanticError>) -> Vec<RuleSpec> {
    let Value::Sequence(items) = value else {
        problems.push(SemanticError::new(
            "must be a list",
            key,
            &single(key.into(), value.clone()),
        ));
        return Vec::new();
    };

    let mut rules = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let conf = single(key.into(), Value::Sequence(vec![item.clone()]));
        debug!("{key}[{index}]: {item:?}");

        let spec = match RuleSpec::from_yaml(item) {
            Ok(spec) => spec,
            Err(errors) => {
                problems.extend(
                    errors
                        .into_iter()
                        .map(|e| SemanticError::new(e.to_string(), key, &conf).at(index)),
                );
                continue;
            }
        };

        // Compile now so bad values and patterns are reported with the config.
        let compiled = if key == "exclusions" {
            Exclusion::new(&spec).map(|_| ())
        } else {
            Inclusion::new(&spec).map(|_| ())
        };
        match compiled {
            Ok(()) => rules.push(spec),
            Err(e) => problems.push(SemanticError::new(e.to_string(), key, &conf).at(index)),
        }
    }
    rules
}

fn validate_output(
    value: &Value,
    conf: &Value,
    problems: &mut Vec<SemanticError>,
) -> Option<Vec<String>> {
    let names: Vec<String> = match value {
        Value::String(s) => s.split(',').map(|name| name.trim().to_string()).collect(),
        Value::Sequence(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => format!("{other:?}"),
            })
            .collect(),
        other => vec![format!("{other:?}")],
    };

    let formatters = list_formatters();
    let before = problems.len();
    for name in &names {
        if !formatters.contains(&name.as_str()) {
            problems.push(SemanticError::new(
                format!(
                    "invalid output format, must be in [{}]",
                    formatters.join(", ")
                ),
                name.as_str(),
                conf,
            ));
        }
    }

    (problems.len() == before).then_some(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<Config, ConfigError> {
        parse_config(raw, "test.conf", Path::new("/conf"))
    }

    fn problems(raw: &str) -> Vec<SemanticError> {
        match parse(raw) {
            Err(ConfigError::Semantic(problems)) => problems,
            other => panic!("expected semantic errors, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_config_has_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.cursor_file, PathBuf::from("/conf/cursor"));
        assert!(!config.debug);
        assert!(config.output.is_none());
        assert!(config.exclusions.is_empty());
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            "cursor-file: /var/lib/jb/cursor\n\
             debug: 1\n\
             priority: err\n\
             output: json,systemd\n\
             inclusions:\n  - PRIORITY: [0, 1]\n\
             exclusions:\n  - MESSAGE: [/Started /, done]\n    _COMM: [cron]\n",
        )
        .unwrap();

        assert_eq!(config.cursor_file, PathBuf::from("/var/lib/jb/cursor"));
        assert!(config.debug);
        assert_eq!(config.priority, Some(Priority::Error));
        assert_eq!(
            config.output,
            Some(vec!["json".to_string(), "systemd".to_string()])
        );
        assert_eq!(config.inclusions.len(), 1);
        assert_eq!(config.exclusions.len(), 1);
    }

    #[test]
    fn test_output_list() {
        let config = parse("output: [json-pretty, config]").unwrap();
        assert_eq!(
            config.output,
            Some(vec!["json-pretty".to_string(), "config".to_string()])
        );
    }

    #[test]
    fn test_top_level_must_be_map() {
        let problems = problems("- not a map");
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].item, "top level");
    }

    #[test]
    fn test_all_problems_reported() {
        let problems = problems("disallowed: 1\ncursor-file: [1]\ndebug: [1]");
        let items: Vec<&str> = problems.iter().map(|p| p.item.as_str()).collect();
        assert_eq!(items, vec!["disallowed", "cursor-file", "debug"]);
    }

    #[test]
    fn test_bad_values() {
        for raw in [
            "debug: debug",
            "output: none",
            "priority: -1",
            "priority: [0, 1, 2, error, 2]",
        ] {
            assert_eq!(problems(raw).len(), 1, "{raw}");
        }
    }

    #[test]
    fn test_bad_rules() {
        for key in ["inclusions", "exclusions"] {
            for body in [
                " 1",
                "\n  map: 1",
                "\n  - 1",
                "\n  - PRIORITY: [-1]",
                "\n  - PRIORITY: -1",
                "\n  - PRIORITY:\n      map: 1",
                "\n  - MESSAGE: 1",
                "\n  - MESSAGE: [baz]\n  - MESSAGE:\n      - foo\n      - [bar]",
                "\n  - MESSAGE_ID: [not-a-uuid]",
            ] {
                let raw = format!("{key}:{body}");
                assert!(!problems(&raw).is_empty(), "{raw}");
            }
        }
    }

    #[test]
    fn test_bad_regex_only_in_exclusions() {
        let problems = problems("exclusions:\n  - MESSAGE: [/(mismatched parenth/]");
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].index, Some(0));

        assert!(parse("inclusions:\n  - MESSAGE: [/(mismatched parenth/]").is_ok());
    }

    #[test]
    fn test_problem_rendering_elides_earlier_items() {
        let problems = problems("exclusions:\n  - MESSAGE: [baz]\n  - MESSAGE: 1");
        let text = problems[0].to_string();
        assert!(text.starts_with("error: exclusions: MESSAGE: must be a list\n  at item 1, in:\n"));
        assert!(text.contains("(...)"));
    }

    #[test]
    fn test_syntax_error_has_location() {
        let err = parse("exclusions\n  - MESSAGE: [foo]").unwrap_err();
        match err {
            ConfigError::Syntax { line, .. } => assert!(line >= 1),
            ConfigError::Parse { .. } => {}
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_is_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("nonexistent"))).unwrap();
        assert_eq!(config.cursor_file, dir.path().join("cursor"));
    }
}

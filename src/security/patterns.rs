//! Detection pattern tables.
//!
//! Best-effort signatures, not a grammar: passing every table is not proof
//! that a value is safe. Each table can be replaced from configuration, and
//! the active [`PatternSet`] is swapped atomically on reload.

use arc_swap::ArcSwap;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

use crate::config::PatternsConfig;

/// What a table detects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Sql,
    NoSql,
    Command,
    Prototype,
    SsrfHost,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Sql => write!(f, "sql"),
            Category::NoSql => write!(f, "nosql"),
            Category::Command => write!(f, "command"),
            Category::Prototype => write!(f, "prototype"),
            Category::SsrfHost => write!(f, "ssrf"),
        }
    }
}

/// A named default signature.
#[derive(Debug, Clone, Copy)]
pub struct Signature {
    pub name: &'static str,
    pub pattern: &'static str,
}

const fn sig(name: &'static str, pattern: &'static str) -> Signature {
    Signature { name, pattern }
}

/// Quote and comment markers, tautologies, DDL/DML keywords, and their
/// URL-encoded forms.
pub static SQL_SIGNATURES: &[Signature] = &[
    sig("quote_or_comment", r"(?i)(%27)|(')|(--)|(%23)|(#)"),
    sig("assignment_then_terminator", r"(?i)((%3D)|(=))[^\n]*((%27)|(')|(--)|(%3B)|(;))"),
    sig("quoted_or", r"(?i)\w*((%27)|('))((%6F)|o|(%4F))((%72)|r|(%52))"),
    sig("quoted_union", r"(?i)((%27)|('))union"),
    sig("stored_procedure", r"(?i)exec(\s|\+)+(s|x)p\w+"),
    sig("insert_into", r"(?i)insert\s+into"),
    sig("select_from", r"(?i)select\s+.*from"),
    sig("delete_from", r"(?i)delete\s+from"),
    sig("update_set", r"(?i)update\s+\w+\s+set"),
    sig("drop_table", r"(?i)drop\s+table"),
    sig("truncate_table", r"(?i)truncate\s+table"),
    sig("alter_table", r"(?i)alter\s+table"),
    sig("create_table", r"(?i)create\s+table"),
    sig("create_database", r"(?i)create\s+database"),
    sig("drop_database", r"(?i)drop\s+database"),
];

/// Document-query operators, matched as whole tokens.
pub static NOSQL_SIGNATURES: &[Signature] = &[
    sig("ne", r"(?i)^\$ne$"),
    sig("gt", r"(?i)^\$gte?$"),
    sig("lt", r"(?i)^\$lte?$"),
    sig("regex", r"(?i)^\$regex$"),
    sig("where", r"(?i)^\$where$"),
    sig("exists", r"(?i)^\$exists$"),
    sig("in", r"(?i)^\$in$"),
    sig("nin", r"(?i)^\$nin$"),
    sig("or", r"(?i)^\$or$"),
    sig("and", r"(?i)^\$and$"),
    sig("not", r"(?i)^\$not$"),
    sig("nor", r"(?i)^\$nor$"),
    sig("expr", r"(?i)^\$expr$"),
    sig("text", r"(?i)^\$text$"),
    sig("search", r"(?i)^\$search$"),
    sig("language", r"(?i)^\$language$"),
    sig("case_sensitive", r"(?i)^\$caseSensitive$"),
    sig("diacritic_sensitive", r"(?i)^\$diacriticSensitive$"),
];

/// Shell metacharacters and substitution, raw and URL-encoded, plus
/// newline-separated commands.
pub static COMMAND_SIGNATURES: &[Signature] = &[
    sig("separator", r"[;&|]"),
    sig("substitution", r"`|\$\("),
    sig("variable", r"\$\{?\w"),
    sig("redirection", r"[<>]"),
    sig("encoded_separator", r"(?i)%3B|%26|%7C|%60|%24"),
    sig("encoded_newline", r"(?i)%0A|%0D"),
    sig(
        "newline_command",
        r"(?i)[\r\n]\s*(cat|ls|rm|id|sh|bash|wget|curl|nc|whoami|uname|ping|python|perl)\b",
    ),
];

pub static PROTOTYPE_SIGNATURES: &[Signature] = &[
    sig("proto", r"(?i)__proto__"),
    sig("constructor", r"(?i)constructor"),
    sig("prototype", r"(?i)prototype"),
];

/// Private, loopback, link-local and unspecified hosts.
pub static SSRF_HOST_SIGNATURES: &[Signature] = &[
    sig("loopback_v4", r"^127\."),
    sig("private_10", r"^10\."),
    sig("private_172", r"^172\.(1[6-9]|2[0-9]|3[0-1])\."),
    sig("private_192", r"^192\.168\."),
    sig("link_local_v4", r"^169\.254\."),
    sig("unique_local_v6", r"(?i)^f[cd][0-9a-f]{0,2}:"),
    sig("link_local_v6", r"(?i)^fe[89ab][0-9a-f]?:"),
    sig("loopback_v6", r"^::1$"),
    sig("unspecified_v4", r"^0\.0\.0\.0"),
    sig("localhost", r"(?i)^localhost\.?$"),
];

/// A compiled pattern and the name it reports.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub name: String,
    pub regex: Regex,
}

/// Ordered patterns of one category. Any match is a detection; the order
/// only decides which match is reported first.
#[derive(Debug, Clone)]
pub struct PatternTable {
    category: Category,
    patterns: Vec<Pattern>,
}

impl PatternTable {
    /// Compile built-in signatures. They are known-good.
    pub(crate) fn from_signatures(category: Category, signatures: &[Signature]) -> Self {
        let patterns = signatures
            .iter()
            .filter_map(|s| {
                Regex::new(s.pattern).ok().map(|regex| Pattern {
                    name: s.name.to_string(),
                    regex,
                })
            })
            .collect();
        Self { category, patterns }
    }

    /// Compile configured sources; each pattern is named after its source.
    pub fn compile(category: Category, sources: &[String]) -> Result<Self, regex::Error> {
        let patterns = sources
            .iter()
            .map(|source| {
                Ok(Pattern {
                    name: source.clone(),
                    regex: Regex::new(source)?,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { category, patterns })
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// First pattern matching `value`, in table order.
    pub fn first_match(&self, value: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.regex.is_match(value))
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.first_match(value).is_some()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

lazy_static! {
    static ref DEFAULT_SET: PatternSet = PatternSet {
        sql: PatternTable::from_signatures(Category::Sql, SQL_SIGNATURES),
        nosql: PatternTable::from_signatures(Category::NoSql, NOSQL_SIGNATURES),
        command: PatternTable::from_signatures(Category::Command, COMMAND_SIGNATURES),
        prototype: PatternTable::from_signatures(Category::Prototype, PROTOTYPE_SIGNATURES),
        ssrf_hosts: PatternTable::from_signatures(Category::SsrfHost, SSRF_HOST_SIGNATURES),
    };
}

/// One table per category.
#[derive(Debug, Clone)]
pub struct PatternSet {
    pub sql: PatternTable,
    pub nosql: PatternTable,
    pub command: PatternTable,
    pub prototype: PatternTable,
    pub ssrf_hosts: PatternTable,
}

impl Default for PatternSet {
    fn default() -> Self {
        DEFAULT_SET.clone()
    }
}

impl PatternSet {
    /// Defaults with any configured overrides applied.
    pub fn from_config(config: &PatternsConfig) -> Result<Self, regex::Error> {
        let mut set = Self::default();
        for (name, sources) in config.overrides() {
            let (category, slot) = match name {
                "sql" => (Category::Sql, &mut set.sql),
                "nosql" => (Category::NoSql, &mut set.nosql),
                "command" => (Category::Command, &mut set.command),
                "prototype" => (Category::Prototype, &mut set.prototype),
                _ => (Category::SsrfHost, &mut set.ssrf_hosts),
            };
            *slot = PatternTable::compile(category, sources)?;
        }
        Ok(set)
    }
}

/// The active pattern set, shared by every stage and swapped on reload.
#[derive(Debug, Clone)]
pub struct SharedPatterns(Arc<ArcSwap<PatternSet>>);

impl SharedPatterns {
    pub fn new(set: PatternSet) -> Self {
        Self(Arc::new(ArcSwap::from_pointee(set)))
    }

    /// Snapshot for one request. Later swaps do not affect it.
    pub fn load(&self) -> Arc<PatternSet> {
        self.0.load_full()
    }

    pub fn swap(&self, set: PatternSet) {
        self.0.store(Arc::new(set));
    }
}

impl Default for SharedPatterns {
    fn default() -> Self {
        Self::new(PatternSet::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_defaults_compile() {
        let set = PatternSet::default();
        assert_eq!(set.sql.len(), SQL_SIGNATURES.len());
        assert_eq!(set.nosql.len(), NOSQL_SIGNATURES.len());
        assert_eq!(set.command.len(), COMMAND_SIGNATURES.len());
        assert_eq!(set.prototype.len(), PROTOTYPE_SIGNATURES.len());
        assert_eq!(set.ssrf_hosts.len(), SSRF_HOST_SIGNATURES.len());
    }

    #[test]
    fn test_sql_signatures() {
        let set = PatternSet::default();
        for attack in [
            "' OR 1=1 --",
            "admin'--",
            "1; DROP TABLE users",
            "x' UNION SELECT password FROM users",
            "%27%20or%201%3D1",
            "INSERT INTO users VALUES (1)",
        ] {
            assert!(set.sql.is_match(attack), "missed {attack}");
        }
        for benign in ["alice@example.com", "hello world", "select a plan"] {
            assert!(!set.sql.is_match(benign), "flagged {benign}");
        }
        assert_eq!(set.sql.first_match("' OR 1=1 --").unwrap().name, "quote_or_comment");
    }

    #[test]
    fn test_nosql_tokens_are_whole() {
        let set = PatternSet::default();
        assert!(set.nosql.is_match("$ne"));
        assert!(set.nosql.is_match("$WHERE"));
        assert!(set.nosql.is_match("$gte"));
        assert!(!set.nosql.is_match("$index"));
        assert!(!set.nosql.is_match("user@example.com"));
    }

    #[test]
    fn test_command_signatures() {
        let set = PatternSet::default();
        for attack in ["a; ls", "$(id)", "`id`", "x %3B cat", "a%0Als", "name\nrm -rf /"] {
            assert!(set.command.is_match(attack), "missed {attack:?}");
        }
        assert!(!set.command.is_match("first line\nsecond line"));
        assert!(!set.command.is_match("fifty % off"));
    }

    #[test]
    fn test_ssrf_host_table() {
        let set = PatternSet::default();
        for host in [
            "127.0.0.1", "10.1.2.3", "172.16.0.1", "172.31.255.255", "192.168.1.1",
            "169.254.169.254", "0.0.0.0", "localhost", "LOCALHOST", "::1", "fe80::1",
            "fc00::1", "fd12:3456::1",
        ] {
            assert!(set.ssrf_hosts.is_match(host), "missed {host}");
        }
        for host in ["8.8.8.8", "172.32.0.1", "api.example.com", "2001:db8::1", "localhost.example.com"] {
            assert!(!set.ssrf_hosts.is_match(host), "flagged {host}");
        }
    }

    #[test]
    fn test_config_override_replaces_one_table() {
        let config = PatternsConfig {
            sql: Some(vec![r"(?i)\bsleep\(".to_string()]),
            ..Default::default()
        };
        let set = PatternSet::from_config(&config).unwrap();
        assert_eq!(set.sql.len(), 1);
        assert!(set.sql.is_match("SLEEP(5)"));
        assert!(!set.sql.is_match("' OR 1=1"));
        assert_eq!(set.nosql.len(), NOSQL_SIGNATURES.len());

        let bad = PatternsConfig {
            command: Some(vec!["(".to_string()]),
            ..Default::default()
        };
        assert!(PatternSet::from_config(&bad).is_err());
    }

    #[test]
    fn test_swap_leaves_snapshots_alone() {
        let shared = SharedPatterns::default();
        let before = shared.load();
        shared.swap(
            PatternSet::from_config(&PatternsConfig {
                sql: Some(vec![]),
                ..Default::default()
            })
            .unwrap(),
        );
        assert!(!before.sql.is_empty());
        assert!(shared.load().sql.is_empty());
    }
}

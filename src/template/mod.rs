//! Merge-branch name templates
//!
//! A deliberately small expression language: `{{ var }}` interpolation,
//! a fixed set of string methods, and `strftime` on the task timestamp.
//! Anything else is rejected at parse or render time.

mod parse;

pub use parse::{Call, Expr, Segment, parse_template};

use crate::error::{Error, Result};
use crate::types::RepoTaskSpec;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

/// A value in the template namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Plain string
    Str(String),
    /// Timestamp, formattable with `strftime`
    Time(DateTime<Local>),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Time(_) => "timestamp",
        }
    }

    fn into_string(self) -> String {
        match self {
            Self::Str(s) => s,
            Self::Time(t) => t.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }
}

/// Variables visible to a template
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    vars: BTreeMap<String, Value>,
}

impl Namespace {
    /// Empty namespace
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespace for one task
    ///
    /// Each spec field is bound under its own name and under the older
    /// alias used by existing merge scripts.
    pub fn for_task(spec: &RepoTaskSpec, task_start: DateTime<Local>) -> Self {
        let remote = spec.remote_project_and_name.clone().unwrap_or_default();
        let mut ns = Self::new();
        ns.set_str("repo_local_name", &spec.repo_local_name);
        ns.set_str("source_ref", &spec.source_ref);
        ns.set_str("dest_branch", &spec.dest_branch);
        ns.set_str("remote_project_and_name", &remote);
        ns.set_str("prj_and_repo_remote_name", &remote);
        ns.set_str("raw_descriptor", &spec.raw_descriptor);
        ns.set_str("repo_data_from_parameter", &spec.raw_descriptor);
        ns.set("task_start_timestamp", Value::Time(task_start));
        ns.set("task_start", Value::Time(task_start));
        ns
    }

    /// Bind a path variable
    #[must_use]
    pub fn with_path(mut self, name: &str, path: &Path) -> Self {
        self.set_str(name, &path.to_string_lossy());
        self
    }

    /// Bind a string variable
    pub fn set_str(&mut self, name: &str, value: &str) {
        self.set(name, Value::Str(value.to_string()));
    }

    /// Bind any value
    pub fn set(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    /// Look a variable up
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }
}

/// A parsed template, reusable across tasks
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template string
    pub fn parse(source: &str) -> Result<Self> {
        Ok(Self {
            source: source.to_string(),
            segments: parse_template(source)?,
        })
    }

    /// Template text as given
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render against a namespace
    pub fn render(&self, ns: &Namespace) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Expr(expr) => out.push_str(&eval(expr, ns)?.into_string()),
            }
        }
        Ok(out)
    }

    /// Render and check the result is a usable branch name
    pub fn render_branch_name(&self, ns: &Namespace) -> Result<String> {
        let name = self.render(ns)?;
        validate_branch_name(&name)?;
        Ok(name)
    }
}

fn eval(expr: &Expr, ns: &Namespace) -> Result<Value> {
    let mut value = ns
        .get(&expr.var)
        .cloned()
        .ok_or_else(|| Error::Template(format!("undefined variable '{}'", expr.var)))?;
    for call in &expr.calls {
        value = apply(value, call)?;
    }
    Ok(value)
}

fn apply(value: Value, call: &Call) -> Result<Value> {
    let args: Vec<&str> = call.args.iter().map(String::as_str).collect();
    match (value, call.method.as_str(), args.as_slice()) {
        (Value::Str(s), "replace", [from, to]) => Ok(Value::Str(s.replace(*from, to))),
        (Value::Str(s), "lower", []) => Ok(Value::Str(s.to_lowercase())),
        (Value::Str(s), "upper", []) => Ok(Value::Str(s.to_uppercase())),
        (Value::Str(s), "strip", []) => Ok(Value::Str(s.trim().to_string())),
        (Value::Time(t), "strftime", [fmt]) => strftime(t, fmt).map(Value::Str),
        (Value::Time(t), "isoformat", []) => Ok(Value::Str(t.to_rfc3339())),
        (value, method, args) => Err(Error::Template(format!(
            "unsupported call {method}() with {} argument(s) on {}",
            args.len(),
            value.type_name()
        ))),
    }
}

fn strftime(t: DateTime<Local>, fmt: &str) -> Result<String> {
    let items: Vec<Item<'_>> = StrftimeItems::new(fmt).collect();
    if items.iter().any(|i| matches!(i, Item::Error)) {
        return Err(Error::Template(format!("invalid strftime format '{fmt}'")));
    }
    let mut out = String::new();
    write!(out, "{}", t.format_with_items(items.into_iter()))
        .map_err(|_| Error::Template(format!("cannot format timestamp with '{fmt}'")))?;
    Ok(out)
}

/// Reject names git would refuse as a branch
///
/// Follows the `git check-ref-format --branch` rules.
pub fn validate_branch_name(name: &str) -> Result<()> {
    let reject = |reason: &str| {
        Err(Error::InvalidBranchName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    if name.trim().is_empty() {
        return reject("name is empty");
    }
    if name == "@" {
        return reject("'@' is reserved");
    }
    if name.starts_with('-') {
        return reject("must not start with '-'");
    }
    if name.starts_with('/') || name.ends_with('/') || name.contains("//") {
        return reject("empty path component");
    }
    if name.ends_with('.') {
        return reject("must not end with '.'");
    }
    if name.contains("..") || name.contains("@{") {
        return reject("contains '..' or '@{'");
    }
    if let Some(c) = name
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || "~^:?*[\\".contains(*c))
    {
        return reject(&format!("contains forbidden character {c:?}"));
    }
    if name
        .split('/')
        .any(|part| part.starts_with('.') || part.ends_with(".lock"))
    {
        return reject("component starts with '.' or ends with '.lock'");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn spec(source_ref: &str, dest_branch: &str) -> RepoTaskSpec {
        RepoTaskSpec {
            repo_local_name: "repo-a".to_string(),
            source_ref: source_ref.to_string(),
            dest_branch: dest_branch.to_string(),
            remote_project_and_name: Some("prj/repo-a".to_string()),
            raw_descriptor: "repo-a:::prj/repo-a".to_string(),
            task_start_timestamp: None,
            merge_branch_name: None,
        }
    }

    fn jan_first() -> DateTime<Local> {
        Local.with_ymd_and_hms(2023, 1, 1, 8, 30, 0).unwrap()
    }

    fn render(template: &str, source_ref: &str, dest_branch: &str) -> Result<String> {
        let ns = Namespace::for_task(&spec(source_ref, dest_branch), jan_first());
        Template::parse(template)?.render_branch_name(&ns)
    }

    #[test]
    fn test_strip_remote_prefix() {
        let name = render(
            "merge/{{source_ref.replace('origin/','')}}_into_{{dest_branch}}",
            "origin/release/2.0",
            "prod",
        )
        .unwrap();
        assert_eq!(name, "merge/release/2.0_into_prod");
    }

    #[test]
    fn test_strftime_on_task_start() {
        let name = render(
            "merge/from_{{source_ref.replace(\"origin/\",\"\")}}_into_{{dest_branch}}_{{task_start.strftime((\"%b%d\"))}}",
            "origin/SOURCE-BRANCH",
            "DEST-BRANCH",
        )
        .unwrap();
        assert_eq!(name, "merge/from_SOURCE-BRANCH_into_DEST-BRANCH_Jan01");
    }

    #[test]
    fn test_aliases_and_string_methods() {
        let name = render(
            "{{ prj_and_repo_remote_name.upper().replace('/', '-') }}/{{ task_start_timestamp.strftime('%Y%m%d-%H%M') }}",
            "src",
            "dest",
        )
        .unwrap();
        assert_eq!(name, "PRJ-REPO-A/20230101-0830");
    }

    #[test]
    fn test_path_variables() {
        let ns = Namespace::for_task(&spec("a", "b"), jan_first())
            .with_path("repos_dir", Path::new("/srv/repos"));
        let out = Template::parse("{{repos_dir}}").unwrap().render(&ns).unwrap();
        assert_eq!(out, "/srv/repos");
    }

    #[test]
    fn test_undefined_variable() {
        let err = render("{{nope}}", "a", "b").unwrap_err();
        assert!(err.to_string().contains("undefined variable 'nope'"));
    }

    #[test]
    fn test_method_not_whitelisted() {
        assert!(render("{{source_ref.__class__()}}", "a", "b").is_err());
        assert!(render("{{source_ref.strftime('%Y')}}", "a", "b").is_err());
        assert!(render("{{task_start.replace('a', 'b')}}", "a", "b").is_err());
        assert!(render("{{source_ref.replace('a')}}", "a", "b").is_err());
    }

    #[test]
    fn test_bad_strftime_format() {
        let err = render("x{{task_start.strftime('%Q')}}", "a", "b").unwrap_err();
        assert!(matches!(err, Error::Template(_)));
    }

    #[test]
    fn test_empty_rendering_is_invalid() {
        let err = render("{{source_ref.replace('origin/', '')}}", "origin/", "b").unwrap_err();
        assert!(matches!(err, Error::InvalidBranchName { .. }));
    }

    #[test]
    fn test_validate_branch_name() {
        for ok in ["main", "merge/release/2.0_into_prod", "feature-x", "a.b/c"] {
            assert!(validate_branch_name(ok).is_ok(), "{ok} should be valid");
        }
        for bad in [
            "", " ", "-x", "/x", "x/", "a//b", "a..b", "a.", "a b", "a~1", "a^", "a:b", "a?", "a*",
            "a[", "a\\b", "x/.hidden", "x.lock", "@", "a@{1}",
        ] {
            assert!(validate_branch_name(bad).is_err(), "{bad:?} should be invalid");
        }
    }
}

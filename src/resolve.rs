//! Repository descriptor parsing and resolution
//!
//! A descriptor is `repo_local_name:[source_ref]:[dest_branch]:[project/repo]`.
//! Fields are positional, trailing empty fields may be dropped, and there is
//! no escaping: names containing `:` cannot be expressed.
//!
//! Resolution is pure. One bad descriptor never prevents the others from
//! resolving; it is returned as [`Resolved::Invalid`] in its original slot.

use crate::error::{Error, Result};
use crate::types::RepoTaskSpec;
use std::collections::HashMap;
use std::path::{Component, Path};

/// Field delimiter inside a descriptor
pub const DESCRIPTOR_DELIMITER: char = ':';

/// Maximum number of positional fields
const MAX_FIELDS: usize = 4;

/// A descriptor split into its positional fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    /// Field 1, required
    pub repo_local_name: String,
    /// Field 2
    pub source_ref: Option<String>,
    /// Field 3
    pub dest_branch: Option<String>,
    /// Field 4
    pub remote_project_and_name: Option<String>,
    /// The unparsed input
    pub raw: String,
}

/// Run-wide branch fallbacks
#[derive(Debug, Clone, Default)]
pub struct BranchDefaults {
    /// Used when a descriptor leaves field 2 empty
    pub source_ref: Option<String>,
    /// Used when a descriptor leaves field 3 empty
    pub dest_branch: Option<String>,
}

/// Resolution outcome for one descriptor
#[derive(Debug, Clone)]
pub enum Resolved {
    /// Fully resolved and safe to run
    Runnable(RepoTaskSpec),
    /// Configuration error for this descriptor only
    Invalid {
        /// Descriptor exactly as given
        raw_descriptor: String,
        /// Local name, empty if it could not be determined
        repo_local_name: String,
        /// Everything wrong with it
        errors: Vec<String>,
    },
}

/// All descriptors of a run, resolved, in input order
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// One entry per input descriptor
    pub entries: Vec<Resolved>,
}

impl Resolution {
    /// Specs that can be scheduled
    pub fn runnable(&self) -> impl Iterator<Item = &RepoTaskSpec> {
        self.entries.iter().filter_map(|e| match e {
            Resolved::Runnable(spec) => Some(spec),
            Resolved::Invalid { .. } => None,
        })
    }

    /// Number of schedulable specs
    pub fn runnable_count(&self) -> usize {
        self.runnable().count()
    }

    /// Whether any descriptor failed to resolve
    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e, Resolved::Invalid { .. }))
    }
}

/// Split one descriptor into its fields
///
/// Fields are trimmed; empty fields become `None`.
pub fn parse_descriptor(raw: &str) -> Result<Descriptor> {
    let parts: Vec<&str> = raw.split(DESCRIPTOR_DELIMITER).map(str::trim).collect();
    if parts.len() > MAX_FIELDS {
        return Err(Error::Descriptor {
            descriptor: raw.to_string(),
            reason: format!(
                "expected at most {MAX_FIELDS} '{DESCRIPTOR_DELIMITER}'-delimited fields, got {}",
                parts.len()
            ),
        });
    }

    let field = |idx: usize| {
        parts
            .get(idx)
            .filter(|s| !s.is_empty())
            .map(|s| (*s).to_string())
    };

    let repo_local_name = field(0).ok_or_else(|| Error::Descriptor {
        descriptor: raw.to_string(),
        reason: "missing repo_local_name".to_string(),
    })?;
    if !is_single_dir_name(&repo_local_name) {
        return Err(Error::Descriptor {
            descriptor: raw.to_string(),
            reason: format!(
                "'{repo_local_name}' must be a single directory name under the repositories directory"
            ),
        });
    }

    Ok(Descriptor {
        repo_local_name,
        source_ref: field(1),
        dest_branch: field(2),
        remote_project_and_name: field(3),
        raw: raw.to_string(),
    })
}

/// One plain path component, so distinct names never reach the same checkout
fn is_single_dir_name(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Resolve every descriptor against the run-wide defaults
pub fn resolve_specs<S: AsRef<str>>(descriptors: &[S], defaults: &BranchDefaults) -> Resolution {
    let default_source = non_empty(defaults.source_ref.as_deref());
    let default_dest = non_empty(defaults.dest_branch.as_deref());

    let mut entries: Vec<Resolved> = descriptors
        .iter()
        .map(|raw| {
            let raw = raw.as_ref();
            match parse_descriptor(raw) {
                Ok(desc) => resolve_one(desc, default_source, default_dest),
                Err(e) => Resolved::Invalid {
                    raw_descriptor: raw.to_string(),
                    repo_local_name: String::new(),
                    errors: vec![e.to_string()],
                },
            }
        })
        .collect();

    reject_duplicates(&mut entries);
    entries_debug(&entries);

    Resolution { entries }
}

fn resolve_one(desc: Descriptor, default_source: Option<&str>, default_dest: Option<&str>) -> Resolved {
    let source_ref = desc.source_ref.clone().or_else(|| default_source.map(String::from));
    let dest_branch = desc.dest_branch.clone().or_else(|| default_dest.map(String::from));

    let mut errors = Vec::new();
    if source_ref.is_none() {
        errors.push(format!(
            "missing source ref in or for descriptor '{}'",
            desc.raw
        ));
    }
    if dest_branch.is_none() {
        errors.push(format!(
            "missing dest branch in or for descriptor '{}'",
            desc.raw
        ));
    }

    match (source_ref, dest_branch) {
        (Some(source_ref), Some(dest_branch)) => Resolved::Runnable(RepoTaskSpec {
            repo_local_name: desc.repo_local_name,
            source_ref,
            dest_branch,
            remote_project_and_name: desc.remote_project_and_name,
            raw_descriptor: desc.raw,
            task_start_timestamp: None,
            merge_branch_name: None,
        }),
        _ => Resolved::Invalid {
            raw_descriptor: desc.raw,
            repo_local_name: desc.repo_local_name,
            errors,
        },
    }
}

/// Every descriptor sharing a local name with another becomes invalid
fn reject_duplicates(entries: &mut [Resolved]) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for entry in entries.iter() {
        if let Some(name) = local_name(entry) {
            *counts.entry(name.to_string()).or_default() += 1;
        }
    }

    for entry in entries.iter_mut() {
        let Some(name) = local_name(entry).map(String::from) else {
            continue;
        };
        if counts.get(&name).copied().unwrap_or(0) < 2 {
            continue;
        }
        let message = format!("repo_local_name '{name}' is used by more than one descriptor");
        match entry {
            Resolved::Runnable(spec) => {
                *entry = Resolved::Invalid {
                    raw_descriptor: spec.raw_descriptor.clone(),
                    repo_local_name: name,
                    errors: vec![message],
                };
            }
            Resolved::Invalid { errors, .. } => errors.push(message),
        }
    }
}

fn local_name(entry: &Resolved) -> Option<&str> {
    let name = match entry {
        Resolved::Runnable(spec) => spec.repo_local_name.as_str(),
        Resolved::Invalid {
            repo_local_name, ..
        } => repo_local_name.as_str(),
    };
    non_empty(Some(name))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn entries_debug(entries: &[Resolved]) {
    for entry in entries {
        match entry {
            Resolved::Runnable(spec) => tracing::debug!(
                repo = %spec.repo_local_name,
                source_ref = %spec.source_ref,
                dest_branch = %spec.dest_branch,
                "resolved descriptor"
            ),
            Resolved::Invalid {
                raw_descriptor,
                errors,
                ..
            } => tracing::debug!(descriptor = %raw_descriptor, ?errors, "invalid descriptor"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> BranchDefaults {
        BranchDefaults {
            source_ref: Some("default-source-ref".to_string()),
            dest_branch: Some("default-dest-branch".to_string()),
        }
    }

    fn runnable(resolution: &Resolution) -> Vec<RepoTaskSpec> {
        resolution.runnable().cloned().collect()
    }

    #[test]
    fn test_parse_minimal_descriptor() {
        let desc = parse_descriptor("repo-a").unwrap();
        assert_eq!(desc.repo_local_name, "repo-a");
        assert!(desc.source_ref.is_none());
        assert!(desc.dest_branch.is_none());
        assert!(desc.remote_project_and_name.is_none());
    }

    #[test]
    fn test_parse_full_descriptor() {
        let desc = parse_descriptor("p1-m1:origin/master:my-feature:products/module1").unwrap();
        assert_eq!(desc.repo_local_name, "p1-m1");
        assert_eq!(desc.source_ref.as_deref(), Some("origin/master"));
        assert_eq!(desc.dest_branch.as_deref(), Some("my-feature"));
        assert_eq!(
            desc.remote_project_and_name.as_deref(),
            Some("products/module1")
        );
    }

    #[test]
    fn test_parse_trims_fields() {
        let desc = parse_descriptor(" repo-a : src : ").unwrap();
        assert_eq!(desc.repo_local_name, "repo-a");
        assert_eq!(desc.source_ref.as_deref(), Some("src"));
        assert!(desc.dest_branch.is_none());
    }

    #[test]
    fn test_parse_too_many_fields() {
        let err = parse_descriptor("a:b:c:d:e").unwrap_err();
        assert!(matches!(err, Error::Descriptor { .. }));
    }

    #[test]
    fn test_parse_missing_name() {
        assert!(parse_descriptor(":src:dest").is_err());
        assert!(parse_descriptor("").is_err());
        assert!(parse_descriptor("..").is_err());
    }

    #[test]
    fn test_names_must_be_single_directory() {
        let resolution = resolve_specs(
            &["repo-a", "./repo-a", "x/../repo-a", "grp\\repo", "/abs", "."],
            &defaults(),
        );
        let names: Vec<String> = runnable(&resolution)
            .into_iter()
            .map(|s| s.repo_local_name)
            .collect();
        assert_eq!(names, vec!["repo-a"]);
        for entry in &resolution.entries[1..] {
            match entry {
                Resolved::Invalid { errors, .. } => {
                    assert!(errors[0].contains("single directory name"), "{errors:?}");
                }
                Resolved::Runnable(spec) => panic!("{} should be invalid", spec.raw_descriptor),
            }
        }
    }

    #[test]
    fn test_omitted_trailing_fields_equal_explicit_empties() {
        let forms = ["repo-a", "repo-a:", "repo-a::", "repo-a:::"];
        let specs: Vec<RepoTaskSpec> = forms
            .iter()
            .map(|f| runnable(&resolve_specs(&[*f], &defaults())).remove(0))
            .collect();

        for spec in &specs {
            assert_eq!(spec.repo_local_name, "repo-a");
            assert_eq!(spec.source_ref, "default-source-ref");
            assert_eq!(spec.dest_branch, "default-dest-branch");
            assert!(spec.remote_project_and_name.is_none());
        }
    }

    #[test]
    fn test_descriptor_fields_override_defaults() {
        let resolution = resolve_specs(
            &[
                "repo-a",
                "repo-b::",
                "repo-c:my-source-ref:",
                "repo-d::my-dest-branch",
                "repo-e:my-source-ref:my-dest-branch",
            ],
            &defaults(),
        );
        let specs = runnable(&resolution);
        assert_eq!(specs.len(), 5);

        let pairs: Vec<(&str, &str, &str)> = specs
            .iter()
            .map(|s| {
                (
                    s.repo_local_name.as_str(),
                    s.source_ref.as_str(),
                    s.dest_branch.as_str(),
                )
            })
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("repo-a", "default-source-ref", "default-dest-branch"),
                ("repo-b", "default-source-ref", "default-dest-branch"),
                ("repo-c", "my-source-ref", "default-dest-branch"),
                ("repo-d", "default-source-ref", "my-dest-branch"),
                ("repo-e", "my-source-ref", "my-dest-branch"),
            ]
        );
        assert_eq!(specs[2].raw_descriptor, "repo-c:my-source-ref:");
    }

    #[test]
    fn test_missing_source_without_default_is_invalid() {
        let resolution = resolve_specs(&["repo-a::dest"], &BranchDefaults::default());
        match &resolution.entries[0] {
            Resolved::Invalid { errors, .. } => {
                assert_eq!(
                    errors,
                    &vec!["missing source ref in or for descriptor 'repo-a::dest'".to_string()]
                );
            }
            Resolved::Runnable(_) => panic!("expected invalid entry"),
        }
    }

    #[test]
    fn test_missing_both_branches_reports_both() {
        let resolution = resolve_specs(&["repo-a"], &BranchDefaults::default());
        match &resolution.entries[0] {
            Resolved::Invalid { errors, .. } => assert_eq!(errors.len(), 2),
            Resolved::Runnable(_) => panic!("expected invalid entry"),
        }
    }

    #[test]
    fn test_blank_defaults_count_as_missing() {
        let defaults = BranchDefaults {
            source_ref: Some("   ".to_string()),
            dest_branch: Some(String::new()),
        };
        let resolution = resolve_specs(&["repo-a"], &defaults);
        assert!(resolution.has_errors());
        assert_eq!(resolution.runnable_count(), 0);
    }

    #[test]
    fn test_bad_descriptor_does_not_abort_others() {
        let resolution = resolve_specs(&["good-1", "a:b:c:d:e", "good-2"], &defaults());
        assert_eq!(resolution.entries.len(), 3);
        assert!(matches!(resolution.entries[1], Resolved::Invalid { .. }));
        let names: Vec<String> = resolution
            .runnable()
            .map(|s| s.repo_local_name.clone())
            .collect();
        assert_eq!(names, vec!["good-1", "good-2"]);
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let resolution = resolve_specs(&["repo-a", "repo-b", "repo-a:other-src"], &defaults());
        assert_eq!(resolution.runnable_count(), 1);
        for idx in [0, 2] {
            match &resolution.entries[idx] {
                Resolved::Invalid {
                    repo_local_name,
                    errors,
                    ..
                } => {
                    assert_eq!(repo_local_name, "repo-a");
                    assert!(errors[0].contains("more than one descriptor"));
                }
                Resolved::Runnable(_) => panic!("duplicate must not be runnable"),
            }
        }
    }

    #[test]
    fn test_order_is_preserved() {
        let names: Vec<String> = (0..10).map(|i| format!("repo-{i}")).collect();
        let resolution = resolve_specs(&names, &defaults());
        let resolved: Vec<String> = resolution
            .runnable()
            .map(|s| s.repo_local_name.clone())
            .collect();
        assert_eq!(resolved, names);
    }
}

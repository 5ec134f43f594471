use serde::{Deserialize, Serialize};

use crate::domain::prompt::Variable;
use crate::domain::version::entity::{PromptSnapshot, VersionBump};

/// A single changed field between two snapshots, with a short
/// human-readable summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub summary: String,
}

/// The difference between two prompt snapshots, plus the semantic
/// version bump it implies:
///
/// - variables added, removed or retyped: major
/// - content changed: minor
/// - anything else (name, description, variable metadata): patch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionDiff {
    pub changes: Vec<FieldChange>,
    pub bump: VersionBump,
}

impl VersionDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn compute(old: &PromptSnapshot, new: &PromptSnapshot) -> Self {
        let mut changes = Vec::new();
        let mut bump = VersionBump::Patch;
        let mut raise = |bump: &mut VersionBump, to: VersionBump| {
            let rank = |b: VersionBump| match b {
                VersionBump::Major => 2,
                VersionBump::Minor => 1,
                VersionBump::Patch => 0,
            };
            if rank(to) > rank(*bump) {
                *bump = to;
            }
        };

        if old.name != new.name {
            changes.push(FieldChange {
                field: "name".to_string(),
                summary: format!("renamed '{}' to '{}'", old.name, new.name),
            });
        }
        if old.description != new.description {
            changes.push(FieldChange {
                field: "description".to_string(),
                summary: "description changed".to_string(),
            });
        }
        if old.content != new.content {
            let (added, removed) = line_delta(&old.content, &new.content);
            changes.push(FieldChange {
                field: "content".to_string(),
                summary: format!("content changed (+{added}/-{removed} lines)"),
            });
            raise(&mut bump, VersionBump::Minor);
        }

        for added in variables_missing_from(&new.variables, &old.variables) {
            changes.push(FieldChange {
                field: format!("variables.{}", added.name),
                summary: format!("variable '{}' added", added.name),
            });
            raise(&mut bump, VersionBump::Major);
        }
        for removed in variables_missing_from(&old.variables, &new.variables) {
            changes.push(FieldChange {
                field: format!("variables.{}", removed.name),
                summary: format!("variable '{}' removed", removed.name),
            });
            raise(&mut bump, VersionBump::Major);
        }
        for new_var in &new.variables {
            if let Some(old_var) = old.variables.iter().find(|v| v.name == new_var.name) {
                if old_var.var_type != new_var.var_type {
                    changes.push(FieldChange {
                        field: format!("variables.{}", new_var.name),
                        summary: format!("variable '{}' changed type", new_var.name),
                    });
                    raise(&mut bump, VersionBump::Major);
                } else if old_var != new_var {
                    changes.push(FieldChange {
                        field: format!("variables.{}", new_var.name),
                        summary: format!("variable '{}' metadata changed", new_var.name),
                    });
                }
            }
        }

        Self { changes, bump }
    }
}

fn variables_missing_from<'a>(from: &'a [Variable], within: &[Variable]) -> Vec<&'a Variable> {
    from.iter()
        .filter(|v| !within.iter().any(|w| w.name == v.name))
        .collect()
}

/// Lines present in one side but not the other, as (added, removed) counts.
fn line_delta(old: &str, new: &str) -> (usize, usize) {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let added = new_lines
        .iter()
        .filter(|line| !old_lines.contains(line))
        .count();
    let removed = old_lines
        .iter()
        .filter(|line| !new_lines.contains(line))
        .count();
    (added, removed)
}

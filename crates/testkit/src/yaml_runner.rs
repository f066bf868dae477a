use serde::Deserialize;
use viborm_migrate_core::dialect::{DialectDriver, GenerationContext};
use viborm_migrate_core::diff::DiffEngine;
use viborm_migrate_core::diffop::ChangeResolution;
use viborm_migrate_core::ordering::OperationSorter;
use viborm_migrate_core::resolver::Resolver;
use viborm_migrate_core::snapshot::SchemaSnapshot;
use viborm_migrate_core::statement::Statement;

/// One cross-dialect generation scenario: a `(current, desired)` schema pair
/// plus the substrings the rendered SQL must contain, in order.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    pub name: String,
    #[serde(default)]
    pub current: SchemaSnapshot,
    pub desired: SchemaSnapshot,
    #[serde(default)]
    pub resolve_ambiguities_as: AmbiguityPolicy,
    #[serde(default)]
    pub expected_sql_contains: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AmbiguityPolicy {
    #[default]
    Rename,
    AddAndDrop,
}

impl From<AmbiguityPolicy> for ChangeResolution {
    fn from(policy: AmbiguityPolicy) -> Self {
        match policy {
            AmbiguityPolicy::Rename => Self::Rename,
            AmbiguityPolicy::AddAndDrop => Self::AddAndDrop,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixtureOutcome {
    Passed,
    Failed(String),
}

/// # Errors
/// Returns the underlying `serde_yaml` error if the document doesn't match
/// [`Fixture`]'s shape.
pub fn load_fixtures_from_str(yaml: &str) -> Result<Vec<Fixture>, serde_yaml::Error> {
    serde_yaml::from_str(yaml)
}

/// Diffs `fixture.current` against `fixture.desired`, resolves every
/// ambiguity with `fixture.resolve_ambiguities_as`, sorts, generates against
/// `driver`, and checks that every entry in `expected_sql_contains` appears
/// as a substring of the concatenated rendered SQL, in the order given.
#[must_use]
pub fn run_fixture(driver: &dyn DialectDriver, fixture: &Fixture) -> FixtureOutcome {
    let outcome = DiffEngine::new().diff(&fixture.current, &fixture.desired);
    let resolution: ChangeResolution = fixture.resolve_ambiguities_as.into();
    let resolutions = vec![resolution; outcome.ambiguous_changes.len()];

    let operations = match Resolver::new().resolve(&fixture.current, &fixture.desired, outcome, &resolutions) {
        Ok(operations) => operations,
        Err(error) => return FixtureOutcome::Failed(format!("resolve failed: {error}")),
    };
    let sorted = OperationSorter::new().sort(operations);

    let context = GenerationContext {
        current: &fixture.current,
        desired: &fixture.desired,
    };

    let mut rendered = String::new();
    for operation in &sorted {
        let statements = match driver.generate(operation, &context) {
            Ok(statements) => statements,
            Err(error) => return FixtureOutcome::Failed(format!("generate failed on {}: {error}", operation.tag())),
        };
        for statement in statements {
            if let Statement::Sql { sql, .. } = statement {
                rendered.push_str(&sql);
                rendered.push('\n');
            }
        }
    }

    let mut search_from = 0;
    for expected in &fixture.expected_sql_contains {
        match rendered[search_from..].find(expected.as_str()) {
            Some(offset) => search_from += offset + expected.len(),
            None => {
                return FixtureOutcome::Failed(format!(
                    "expected `{expected}` (in order) in rendered SQL:\n{rendered}"
                ));
            }
        }
    }

    FixtureOutcome::Passed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_single_fixture_from_yaml() {
        let yaml = r#"
- name: add a nullable column
  desired:
    tables:
      - name: users
        columns:
          - name: id
            type: integer
            nullable: false
          - name: nickname
            type: text
            nullable: true
  expected_sql_contains:
    - "ADD COLUMN"
"#;
        let fixtures = load_fixtures_from_str(yaml).unwrap();
        assert_eq!(fixtures.len(), 1);
        assert_eq!(fixtures[0].name, "add a nullable column");
    }
}

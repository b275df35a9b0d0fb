use anyhow::bail;

/// Describes one migratable table. Transfer order follows `dependency_rank`
/// so that parent tables land before the tables referencing them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableSpec {
    pub name: &'static str,
    pub dependency_rank: u32,
    pub primary_key: &'static str,
    /// Columns holding identifiers that may refer to migrated principals.
    /// Values without a recorded mapping pass through unchanged.
    pub identity_columns: &'static [&'static str],
}

pub struct Registry {
    tables: Vec<TableSpec>,
}

impl Registry {
    /// The table set of the campaign contact-management schema, in
    /// dependency order.
    pub fn campaign() -> Self {
        return Registry {
            tables: vec![
                TableSpec {
                    name: "profiles",
                    dependency_rank: 0,
                    primary_key: "id",
                    identity_columns: &["id"],
                },
                TableSpec {
                    name: "leaders",
                    dependency_rank: 1,
                    primary_key: "id",
                    identity_columns: &["id", "profile_id", "created_by"],
                },
                TableSpec {
                    name: "people",
                    dependency_rank: 2,
                    primary_key: "id",
                    identity_columns: &["id", "owner_id", "leader_id", "created_by"],
                },
                TableSpec {
                    name: "invitations",
                    dependency_rank: 3,
                    primary_key: "id",
                    identity_columns: &["id", "leader_id", "invited_by"],
                },
                TableSpec {
                    name: "projections",
                    dependency_rank: 4,
                    primary_key: "id",
                    identity_columns: &["id", "created_by"],
                },
            ],
        };
    }

    pub fn tables(&self) -> &[TableSpec] {
        return &self.tables;
    }

    /// Filters the registry down to the requested tables, keeping dependency
    /// order regardless of the order the names were given in.
    pub fn subset(&self, names: &[String]) -> anyhow::Result<Vec<TableSpec>> {
        for name in names {
            if !self.tables.iter().any(|spec| spec.name == name) {
                bail!("Unknown table {name}");
            }
        }
        let subset = self
            .tables
            .iter()
            .filter(|spec| names.iter().any(|name| name == spec.name))
            .copied()
            .collect();
        return Ok(subset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_in_dependency_order() {
        let registry = Registry::campaign();
        let ranks: Vec<u32> = registry
            .tables()
            .iter()
            .map(|spec| spec.dependency_rank)
            .collect();
        let mut sorted = ranks.clone();
        sorted.sort();
        assert_eq!(ranks, sorted);
    }

    #[test]
    fn test_profiles_come_before_people() {
        let registry = Registry::campaign();
        let names: Vec<&str> = registry.tables().iter().map(|spec| spec.name).collect();
        let profiles = names.iter().position(|n| *n == "profiles").unwrap();
        let people = names.iter().position(|n| *n == "people").unwrap();
        assert!(profiles < people);
    }

    #[test]
    fn test_subset_keeps_dependency_order() {
        let registry = Registry::campaign();
        let subset = registry
            .subset(&["people".to_owned(), "profiles".to_owned()])
            .unwrap();
        let names: Vec<&str> = subset.iter().map(|spec| spec.name).collect();
        assert_eq!(names, vec!["profiles", "people"]);
    }

    #[test]
    fn test_subset_rejects_unknown_table() {
        let registry = Registry::campaign();
        let err = registry.subset(&["nonexistent".to_owned()]).unwrap_err();
        assert!(err.to_string().contains("nonexistent"));
    }
}

//! `GET_LOCK`/`RELEASE_LOCK` wrap the migration in a named, server-scoped
//! lock instead of a transaction-scoped one — unlike Postgres's advisory
//! lock, this one survives a DDL statement's implicit commit.

pub fn lock_name(lock_key: &str) -> String {
    format!("viborm_migration_{lock_key}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_name_is_namespaced() {
        assert_eq!(lock_name("x"), "viborm_migration_x");
    }
}

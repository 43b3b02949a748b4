//! Redirect rules repository.

use redirector_core::normalize::paths_equal;
use redirector_core::{NewRedirectRule, RedirectRule};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{Result, StorageError};
use crate::repository::parse_datetime;

const RULE_COLUMNS: &str = "id, domain_id, path, destination, permanent, case_sensitive, \
     match_subpaths, append_subpath, pass_query_string, notes, created_at, updated_at";

/// Repository for redirect rule operations.
///
/// Callers pass rules already normalized; validation happens one level up.
pub struct RulesRepo;

impl RulesRepo {
    /// Insert a new rule.
    pub fn insert(conn: &Connection, domain_id: i64, rule: &NewRedirectRule) -> Result<i64> {
        conn.execute(
            "INSERT INTO redirect_rules (domain_id, path, destination, permanent, case_sensitive,
             match_subpaths, append_subpath, pass_query_string, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                domain_id,
                rule.path,
                rule.destination,
                rule.permanent as i32,
                rule.case_sensitive as i32,
                rule.match_subpaths as i32,
                rule.append_subpath as i32,
                rule.pass_query_string as i32,
                rule.notes
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Get a rule by ID.
    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<RedirectRule>> {
        let rule = conn
            .query_row(
                &format!("SELECT {} FROM redirect_rules WHERE id = ?1", RULE_COLUMNS),
                [id],
                row_to_rule,
            )
            .optional()?;

        Ok(rule)
    }

    /// Get all rules of a domain, ordered by id.
    pub fn get_for_domain(conn: &Connection, domain_id: i64) -> Result<Vec<RedirectRule>> {
        Self::query_domain(conn, domain_id, "")
    }

    /// Get the `match_subpaths` rules of a domain, ordered by id.
    pub fn get_wildcards(conn: &Connection, domain_id: i64) -> Result<Vec<RedirectRule>> {
        Self::query_domain(conn, domain_id, "AND match_subpaths = 1")
    }

    /// Find the rule whose path equals `path` among rules with the given
    /// case sensitivity.
    ///
    /// Case-insensitive candidates are compared in Rust so folding matches
    /// the conflict checks; SQLite's `NOCASE` only folds ASCII.
    pub fn find_exact(
        conn: &Connection,
        domain_id: i64,
        path: &str,
        case_sensitive: bool,
    ) -> Result<Option<RedirectRule>> {
        if case_sensitive {
            let rule = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM redirect_rules
                         WHERE domain_id = ?1 AND case_sensitive = 1 AND path = ?2",
                        RULE_COLUMNS
                    ),
                    params![domain_id, path],
                    row_to_rule,
                )
                .optional()?;
            return Ok(rule);
        }

        let candidates = Self::query_domain(conn, domain_id, "AND case_sensitive = 0")?;
        Ok(candidates
            .into_iter()
            .find(|rule| paths_equal(&rule.path, path, true)))
    }

    /// Returns true if the domain has a rule with exactly this stored path.
    pub fn path_exists(conn: &Connection, domain_id: i64, path: &str) -> Result<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM redirect_rules WHERE domain_id = ?1 AND path = ?2)",
            params![domain_id, path],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Replace a rule's fields.
    pub fn update(conn: &Connection, id: i64, rule: &NewRedirectRule) -> Result<()> {
        let updated = conn.execute(
            "UPDATE redirect_rules SET path = ?1, destination = ?2, permanent = ?3,
             case_sensitive = ?4, match_subpaths = ?5, append_subpath = ?6,
             pass_query_string = ?7, notes = ?8, updated_at = datetime('now')
             WHERE id = ?9",
            params![
                rule.path,
                rule.destination,
                rule.permanent as i32,
                rule.case_sensitive as i32,
                rule.match_subpaths as i32,
                rule.append_subpath as i32,
                rule.pass_query_string as i32,
                rule.notes,
                id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::NotFound(format!("Rule with id {}", id)));
        }

        Ok(())
    }

    /// Delete a rule.
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        let deleted = conn.execute("DELETE FROM redirect_rules WHERE id = ?1", [id])?;

        if deleted == 0 {
            return Err(StorageError::NotFound(format!("Rule with id {}", id)));
        }

        Ok(())
    }

    /// Count rules of a domain.
    pub fn count_for_domain(conn: &Connection, domain_id: i64) -> Result<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM redirect_rules WHERE domain_id = ?1",
            [domain_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn query_domain(conn: &Connection, domain_id: i64, filter: &str) -> Result<Vec<RedirectRule>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM redirect_rules WHERE domain_id = ?1 {} ORDER BY id ASC",
            RULE_COLUMNS, filter
        ))?;

        let rules = stmt
            .query_map([domain_id], row_to_rule)?
            .collect::<rusqlite::Result<Vec<RedirectRule>>>()?;

        Ok(rules)
    }
}

fn row_to_rule(row: &Row<'_>) -> rusqlite::Result<RedirectRule> {
    Ok(RedirectRule {
        id: row.get(0)?,
        domain_id: row.get(1)?,
        path: row.get(2)?,
        destination: row.get(3)?,
        permanent: row.get::<_, i32>(4)? != 0,
        case_sensitive: row.get::<_, i32>(5)? != 0,
        match_subpaths: row.get::<_, i32>(6)? != 0,
        append_subpath: row.get::<_, i32>(7)? != 0,
        pass_query_string: row.get::<_, i32>(8)? != 0,
        notes: row.get(9)?,
        created_at: parse_datetime(&row.get::<_, String>(10)?),
        updated_at: parse_datetime(&row.get::<_, String>(11)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::DomainsRepo;
    use crate::schema::run_migrations;

    fn setup_db() -> (Connection, i64) {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();
        let domain_id = DomainsRepo::insert(&conn, "example", "").unwrap();
        (conn, domain_id)
    }

    #[test]
    fn test_insert_and_get_rule() {
        let (conn, domain_id) = setup_db();

        let rule = NewRedirectRule::new("docs", "https://docs.example.test/")
            .with_permanent(true)
            .with_match_subpaths(true)
            .with_notes("moved");
        let id = RulesRepo::insert(&conn, domain_id, &rule).unwrap();

        let stored = RulesRepo::get_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(stored.domain_id, domain_id);
        assert_eq!(stored.path, "docs");
        assert!(stored.permanent);
        assert!(stored.match_subpaths);
        assert!(!stored.case_sensitive);
        assert_eq!(stored.notes, "moved");
    }

    #[test]
    fn test_find_exact_respects_case_mode() {
        let (conn, domain_id) = setup_db();
        RulesRepo::insert(
            &conn,
            domain_id,
            &NewRedirectRule::new("Foo", "/a").with_case_sensitive(true),
        )
        .unwrap();
        RulesRepo::insert(&conn, domain_id, &NewRedirectRule::new("Straße", "/b")).unwrap();

        assert!(RulesRepo::find_exact(&conn, domain_id, "Foo", true)
            .unwrap()
            .is_some());
        assert!(RulesRepo::find_exact(&conn, domain_id, "foo", true)
            .unwrap()
            .is_none());
        assert!(RulesRepo::find_exact(&conn, domain_id, "foo", false)
            .unwrap()
            .is_none());

        let folded = RulesRepo::find_exact(&conn, domain_id, "STRASSE", false).unwrap();
        assert!(folded.is_none());
        let folded = RulesRepo::find_exact(&conn, domain_id, "STRAßE", false).unwrap();
        assert_eq!(folded.unwrap().destination, "/b");
    }

    #[test]
    fn test_get_wildcards() {
        let (conn, domain_id) = setup_db();
        RulesRepo::insert(&conn, domain_id, &NewRedirectRule::new("a", "/x")).unwrap();
        RulesRepo::insert(
            &conn,
            domain_id,
            &NewRedirectRule::new("b", "/y").with_match_subpaths(true),
        )
        .unwrap();

        let wildcards = RulesRepo::get_wildcards(&conn, domain_id).unwrap();
        assert_eq!(wildcards.len(), 1);
        assert_eq!(wildcards[0].path, "b");
        assert_eq!(RulesRepo::get_for_domain(&conn, domain_id).unwrap().len(), 2);
    }

    #[test]
    fn test_undecodable_row_fails_listing() {
        let (conn, domain_id) = setup_db();
        RulesRepo::insert(&conn, domain_id, &NewRedirectRule::new("a", "/x")).unwrap();
        let id = RulesRepo::insert(&conn, domain_id, &NewRedirectRule::new("b", "/y")).unwrap();
        conn.execute(
            "UPDATE redirect_rules SET path = X'FF00' WHERE id = ?1",
            [id],
        )
        .unwrap();

        assert!(matches!(
            RulesRepo::get_for_domain(&conn, domain_id),
            Err(StorageError::Database(_))
        ));
        assert!(RulesRepo::get_wildcards(&conn, domain_id).is_ok());
    }

    #[test]
    fn test_update_rule() {
        let (conn, domain_id) = setup_db();
        let id = RulesRepo::insert(&conn, domain_id, &NewRedirectRule::new("a", "/x")).unwrap();

        RulesRepo::update(
            &conn,
            id,
            &NewRedirectRule::new("a", "/y").with_pass_query_string(true),
        )
        .unwrap();

        let updated = RulesRepo::get_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(updated.destination, "/y");
        assert!(updated.pass_query_string);

        assert!(matches!(
            RulesRepo::update(&conn, id + 1, &NewRedirectRule::new("a", "/z")),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_rule() {
        let (conn, domain_id) = setup_db();
        let id = RulesRepo::insert(&conn, domain_id, &NewRedirectRule::new("a", "/x")).unwrap();

        assert!(RulesRepo::path_exists(&conn, domain_id, "a").unwrap());
        RulesRepo::delete(&conn, id).unwrap();
        assert!(!RulesRepo::path_exists(&conn, domain_id, "a").unwrap());
        assert_eq!(RulesRepo::count_for_domain(&conn, domain_id).unwrap(), 0);
    }

    #[test]
    fn test_rules_cascade_with_domain() {
        let (conn, domain_id) = setup_db();
        let id = RulesRepo::insert(&conn, domain_id, &NewRedirectRule::new("a", "/x")).unwrap();

        DomainsRepo::delete(&conn, domain_id).unwrap();
        assert!(RulesRepo::get_by_id(&conn, id).unwrap().is_none());
    }
}

//! Domains repository.
//!
//! A domain row plus its hostnames in `domain_names`.

use redirector_core::Domain;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{Result, StorageError};
use crate::repository::parse_datetime;

const DOMAIN_COLUMNS: &str = "id, display_name, notes, created_at, updated_at";

/// Repository for domain operations.
pub struct DomainsRepo;

impl DomainsRepo {
    /// Insert a domain row. Hostnames are added with [`DomainsRepo::add_name`].
    pub fn insert(conn: &Connection, display_name: &str, notes: &str) -> Result<i64> {
        conn.execute(
            "INSERT INTO domains (display_name, notes) VALUES (?1, ?2)",
            params![display_name, notes],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Attach a hostname to a domain.
    pub fn add_name(conn: &Connection, domain_id: i64, name: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO domain_names (name, domain_id) VALUES (?1, ?2)",
            params![name, domain_id],
        )?;
        Ok(())
    }

    /// Get a domain by ID.
    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Domain>> {
        let domain = conn
            .query_row(
                &format!("SELECT {} FROM domains WHERE id = ?1", DOMAIN_COLUMNS),
                [id],
                row_to_domain,
            )
            .optional()?;

        domain.map(|d| Self::with_names(conn, d)).transpose()
    }

    /// Find the domain owning a hostname.
    pub fn get_by_name(conn: &Connection, name: &str) -> Result<Option<Domain>> {
        let domain_id: Option<i64> = conn
            .query_row(
                "SELECT domain_id FROM domain_names WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?;

        match domain_id {
            Some(id) => Self::get_by_id(conn, id),
            None => Ok(None),
        }
    }

    /// Get all domains, ordered by display name.
    pub fn get_all(conn: &Connection) -> Result<Vec<Domain>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM domains ORDER BY display_name ASC",
            DOMAIN_COLUMNS
        ))?;

        let domains = stmt
            .query_map([], row_to_domain)?
            .collect::<rusqlite::Result<Vec<Domain>>>()?;

        domains
            .into_iter()
            .map(|d| Self::with_names(conn, d))
            .collect()
    }

    /// Hostnames of a domain, in insertion order.
    pub fn names_for(conn: &Connection, domain_id: i64) -> Result<Vec<String>> {
        let mut stmt =
            conn.prepare("SELECT name FROM domain_names WHERE domain_id = ?1 ORDER BY id ASC")?;

        let names = stmt
            .query_map([domain_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        Ok(names)
    }

    /// Returns true if the display name is taken.
    pub fn display_name_exists(conn: &Connection, display_name: &str) -> Result<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM domains WHERE display_name = ?1)",
            [display_name],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Returns the first of `names` already claimed by some domain.
    pub fn first_taken_name(conn: &Connection, names: &[String]) -> Result<Option<String>> {
        let mut stmt = conn.prepare("SELECT 1 FROM domain_names WHERE name = ?1")?;
        for name in names {
            if stmt.exists([name])? {
                return Ok(Some(name.clone()));
            }
        }
        Ok(None)
    }

    /// Delete a domain. Names and rules go with it.
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        let deleted = conn.execute("DELETE FROM domains WHERE id = ?1", [id])?;

        if deleted == 0 {
            return Err(StorageError::NotFound(format!("Domain with id {}", id)));
        }

        Ok(())
    }

    /// Count total domains.
    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM domains", [], |row| row.get(0))?;
        Ok(count)
    }

    fn with_names(conn: &Connection, mut domain: Domain) -> Result<Domain> {
        domain.names = Self::names_for(conn, domain.id)?;
        Ok(domain)
    }
}

fn row_to_domain(row: &Row<'_>) -> rusqlite::Result<Domain> {
    Ok(Domain {
        id: row.get(0)?,
        display_name: row.get(1)?,
        names: Vec::new(),
        notes: row.get(2)?,
        created_at: parse_datetime(&row.get::<_, String>(3)?),
        updated_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::run_migrations;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn insert_domain(conn: &Connection, display: &str, names: &[&str]) -> i64 {
        let id = DomainsRepo::insert(conn, display, "").unwrap();
        for name in names {
            DomainsRepo::add_name(conn, id, name).unwrap();
        }
        id
    }

    #[test]
    fn test_insert_and_get_domain() {
        let conn = setup_db();
        let id = insert_domain(&conn, "example", &["example.test", "www.example.test"]);

        let domain = DomainsRepo::get_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(domain.display_name, "example");
        assert_eq!(domain.names, vec!["example.test", "www.example.test"]);
        assert!(DomainsRepo::get_by_id(&conn, id + 1).unwrap().is_none());
    }

    #[test]
    fn test_get_by_name() {
        let conn = setup_db();
        let id = insert_domain(&conn, "example", &["example.test", "www.example.test"]);

        let domain = DomainsRepo::get_by_name(&conn, "www.example.test")
            .unwrap()
            .unwrap();
        assert_eq!(domain.id, id);
        assert!(DomainsRepo::get_by_name(&conn, "other.test").unwrap().is_none());
    }

    #[test]
    fn test_names_are_globally_unique() {
        let conn = setup_db();
        insert_domain(&conn, "a", &["a.test"]);
        let b = DomainsRepo::insert(&conn, "b", "").unwrap();

        assert!(DomainsRepo::add_name(&conn, b, "a.test").is_err());
        assert_eq!(
            DomainsRepo::first_taken_name(&conn, &["b.test".into(), "a.test".into()]).unwrap(),
            Some("a.test".to_string())
        );
    }

    #[test]
    fn test_display_name_exists() {
        let conn = setup_db();
        insert_domain(&conn, "a", &["a.test"]);

        assert!(DomainsRepo::display_name_exists(&conn, "a").unwrap());
        assert!(!DomainsRepo::display_name_exists(&conn, "b").unwrap());
    }

    #[test]
    fn test_delete_cascades_names() {
        let conn = setup_db();
        let id = insert_domain(&conn, "a", &["a.test"]);

        DomainsRepo::delete(&conn, id).unwrap();
        assert!(DomainsRepo::get_by_name(&conn, "a.test").unwrap().is_none());
        assert_eq!(DomainsRepo::count(&conn).unwrap(), 0);
        assert!(matches!(
            DomainsRepo::delete(&conn, id),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_get_all_sorted() {
        let conn = setup_db();
        insert_domain(&conn, "zeta", &["z.test"]);
        insert_domain(&conn, "alpha", &["a.test"]);

        let all = DomainsRepo::get_all(&conn).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].display_name, "alpha");
        assert_eq!(all[1].names, vec!["z.test"]);
    }
}

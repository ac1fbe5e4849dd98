use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::DbConfig;
use crate::error::PersistenceError;
use crate::models::{
    Company, CompanyId, CompanyVacancyCount, InsertOutcome, NewCompany, NewVacancy,
    VacancyId, VacancyListing,
};
use crate::store::VacancyStore;

type Result<T> = std::result::Result<T, PersistenceError>;

/// Vacancy rows joined with the owning company. Kept as a literal so every
/// listing query maps rows through [`Database::row_to_listing`].
const LISTING_SELECT: &str = "SELECT v.id, v.company_id, c.name, v.title, v.salary_from, v.salary_to,
        v.currency, v.url, v.description, v.created_at
 FROM vacancies v
 JOIN companies c ON v.company_id = c.id";

const LISTING_ORDER: &str = " ORDER BY c.name, v.title, v.id";

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    /// Opens (creating if needed) the database file and its parent directory.
    pub fn open(config: &DbConfig) -> Result<Self> {
        let path = config.path.clone();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| PersistenceError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let conn = Connection::open(&path)?;
        Self::configure(&conn)?;
        Ok(Self { conn, path })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    fn configure(conn: &Connection) -> Result<()> {
        // SQLite leaves foreign keys (and with them ON DELETE CASCADE) off per connection
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the schema if it does not exist yet. Safe to run on every start.
    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS companies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE CHECK (length(trim(name)) > 0),
                url TEXT,
                description TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS vacancies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_id INTEGER NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
                title TEXT NOT NULL CHECK (length(trim(title)) > 0),
                url TEXT UNIQUE,
                salary_from INTEGER,
                salary_to INTEGER,
                currency TEXT,
                description TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_vacancies_company ON vacancies(company_id);
            "#,
        )?;
        Ok(())
    }

    // --- Company operations ---

    /// Returns the id of the company called `name`, inserting it first when
    /// absent. An existing row keeps its url and description.
    ///
    /// One statement against the `UNIQUE(name)` constraint, so two writers
    /// can never both create the same company.
    pub fn ensure_company(
        &self,
        name: &str,
        url: Option<&str>,
        description: Option<&str>,
    ) -> Result<CompanyId> {
        let id = self.conn.query_row(
            "INSERT INTO companies (name, url, description) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET name = excluded.name
             RETURNING id",
            params![name.trim(), url, description],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn get_company(&self, id: CompanyId) -> Result<Option<Company>> {
        let company = self
            .conn
            .query_row(
                "SELECT id, name, url, description, created_at FROM companies WHERE id = ?1",
                [id],
                Self::row_to_company,
            )
            .optional()?;
        Ok(company)
    }

    /// Every company with its number of stored vacancies, including companies
    /// with none. Ordered by name.
    pub fn companies_with_vacancy_counts(&self) -> Result<Vec<CompanyVacancyCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.id, c.name, COUNT(v.id)
             FROM companies c
             LEFT JOIN vacancies v ON v.company_id = c.id
             GROUP BY c.id, c.name
             ORDER BY c.name, c.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(CompanyVacancyCount {
                company_id: row.get(0)?,
                name: row.get(1)?,
                vacancy_count: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn count_companies(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM companies", [], |row| row.get(0))?)
    }

    /// Deleting a company deletes its vacancies too.
    pub fn delete_company(&self, id: CompanyId) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM companies WHERE id = ?1", [id])?;
        info!(company_id = id, removed, "deleted company");
        Ok(removed)
    }

    pub fn delete_all_companies(&self) -> Result<usize> {
        let removed = self.conn.execute("DELETE FROM companies", [])?;
        info!(removed, "deleted all companies");
        Ok(removed)
    }

    fn row_to_company(row: &rusqlite::Row) -> rusqlite::Result<Company> {
        Ok(Company {
            id: row.get(0)?,
            name: row.get(1)?,
            url: row.get(2)?,
            description: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    // --- Vacancy operations ---

    /// Stores a vacancy unless one with the same url exists already. A vacancy
    /// without a url is always stored, since NULLs never conflict.
    ///
    /// A `company_id` with no matching company violates the foreign key and
    /// comes back as an error.
    pub fn insert_vacancy(&self, vacancy: &NewVacancy) -> Result<InsertOutcome> {
        let inserted = self.conn.execute(
            "INSERT INTO vacancies (company_id, title, url, salary_from, salary_to, currency, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(url) DO NOTHING",
            params![
                vacancy.company_id,
                vacancy.title,
                vacancy.url,
                vacancy.salary.from,
                vacancy.salary.to,
                vacancy.currency,
                vacancy.description,
            ],
        )?;

        if inserted == 0 {
            debug!(url = ?vacancy.url, "vacancy already stored, skipping");
            return Ok(InsertOutcome::Duplicate);
        }
        Ok(InsertOutcome::Inserted(self.conn.last_insert_rowid()))
    }

    pub fn all_vacancies(&self) -> Result<Vec<VacancyListing>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{}{}", LISTING_SELECT, LISTING_ORDER))?;
        let rows = stmt.query_map([], Self::row_to_listing)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn count_vacancies(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM vacancies", [], |row| row.get(0))?)
    }

    /// Mean midpoint salary over vacancies with both bounds known, or `None`
    /// when there is no such vacancy.
    pub fn average_salary(&self) -> Result<Option<f64>> {
        let avg = self.conn.query_row(
            "SELECT AVG((salary_from + salary_to) / 2.0)
             FROM vacancies
             WHERE salary_from IS NOT NULL AND salary_to IS NOT NULL",
            [],
            |row| row.get::<_, Option<f64>>(0),
        )?;
        Ok(avg)
    }

    /// Vacancies whose midpoint salary is strictly above [`average_salary`].
    /// Vacancies missing either bound never qualify.
    ///
    /// [`average_salary`]: Database::average_salary
    pub fn vacancies_above_average_salary(&self) -> Result<Vec<VacancyListing>> {
        let Some(avg) = self.average_salary()? else {
            return Ok(Vec::new());
        };

        let sql = format!(
            "{} WHERE v.salary_from IS NOT NULL AND v.salary_to IS NOT NULL
               AND (v.salary_from + v.salary_to) / 2.0 > ?1{}",
            LISTING_SELECT, LISTING_ORDER
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([avg], Self::row_to_listing)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Case-insensitive literal substring match on the title. An empty
    /// keyword matches every vacancy.
    pub fn search_vacancies(&self, keyword: &str) -> Result<Vec<VacancyListing>> {
        // SQLite's LIKE and lower() only fold ASCII and treat % and _ as
        // wildcards, so matching happens here instead.
        let needle = keyword.to_lowercase();
        let vacancies = self.all_vacancies()?;
        Ok(vacancies
            .into_iter()
            .filter(|v| v.title.to_lowercase().contains(&needle))
            .collect())
    }

    pub fn delete_vacancy(&self, id: VacancyId) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM vacancies WHERE id = ?1", [id])?;
        info!(vacancy_id = id, removed, "deleted vacancy");
        Ok(removed)
    }

    pub fn delete_all_vacancies(&self) -> Result<usize> {
        let removed = self.conn.execute("DELETE FROM vacancies", [])?;
        info!(removed, "deleted all vacancies");
        Ok(removed)
    }

    fn row_to_listing(row: &rusqlite::Row) -> rusqlite::Result<VacancyListing> {
        Ok(VacancyListing {
            id: row.get(0)?,
            company_id: row.get(1)?,
            company_name: row.get(2)?,
            title: row.get(3)?,
            salary_from: row.get(4)?,
            salary_to: row.get(5)?,
            currency: row.get(6)?,
            url: row.get(7)?,
            description: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}

impl VacancyStore for Database {
    fn save_company(&self, company: &NewCompany) -> Result<CompanyId> {
        self.ensure_company(
            &company.name,
            company.url.as_deref(),
            company.description.as_deref(),
        )
    }

    fn save_vacancy(&self, vacancy: &NewVacancy) -> Result<InsertOutcome> {
        self.insert_vacancy(vacancy)
    }

    fn remove_company(&self, id: Option<CompanyId>) -> Result<usize> {
        match id {
            Some(id) => self.delete_company(id),
            None => self.delete_all_companies(),
        }
    }

    fn remove_vacancy(&self, id: Option<VacancyId>) -> Result<usize> {
        match id {
            Some(id) => self.delete_vacancy(id),
            None => self.delete_all_vacancies(),
        }
    }
}

//! Persistence capability used by ingestion.
//!
//! [`Database`](crate::db::Database) is the only backend today; the
//! ingestion code depends on this trait alone so another backend (a JSON
//! file, say) can be dropped in without touching it.

use crate::error::PersistenceError;
use crate::models::{CompanyId, InsertOutcome, NewCompany, NewVacancy, VacancyId};

pub trait VacancyStore {
    /// Returns the id of the company with this name, creating it when absent.
    /// Never creates a second row for a name that is already stored.
    fn save_company(&self, company: &NewCompany) -> Result<CompanyId, PersistenceError>;

    /// Stores the vacancy unless one with the same url already exists.
    fn save_vacancy(&self, vacancy: &NewVacancy) -> Result<InsertOutcome, PersistenceError>;

    /// Removes one company (and its vacancies), or every company when `id` is `None`.
    fn remove_company(&self, id: Option<CompanyId>) -> Result<usize, PersistenceError>;

    /// Removes one vacancy, or every vacancy when `id` is `None`.
    fn remove_vacancy(&self, id: Option<VacancyId>) -> Result<usize, PersistenceError>;
}

use crate::db::Database;
use crate::error::PersistenceError;
use crate::models::{CompanyId, CompanyVacancyCount, VacancyId, VacancyListing};
use crate::store::VacancyStore;

type Result<T> = std::result::Result<T, PersistenceError>;

/// Read and delete operations offered to the console and CLI. Pure
/// delegation; formatting is the caller's business.
#[derive(Clone, Copy)]
pub struct Reports<'a> {
    db: &'a Database,
}

impl<'a> Reports<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn companies_with_vacancy_counts(&self) -> Result<Vec<CompanyVacancyCount>> {
        self.db.companies_with_vacancy_counts()
    }

    pub fn all_vacancies(&self) -> Result<Vec<VacancyListing>> {
        self.db.all_vacancies()
    }

    pub fn average_salary(&self) -> Result<Option<f64>> {
        self.db.average_salary()
    }

    pub fn vacancies_above_average_salary(&self) -> Result<Vec<VacancyListing>> {
        self.db.vacancies_above_average_salary()
    }

    pub fn search_vacancies(&self, keyword: &str) -> Result<Vec<VacancyListing>> {
        self.db.search_vacancies(keyword)
    }

    pub fn delete_vacancy(&self, id: VacancyId) -> Result<usize> {
        self.db.remove_vacancy(Some(id))
    }

    pub fn delete_all_vacancies(&self) -> Result<usize> {
        self.db.remove_vacancy(None)
    }

    pub fn delete_company(&self, id: CompanyId) -> Result<usize> {
        self.db.remove_company(Some(id))
    }

    pub fn delete_all_companies(&self) -> Result<usize> {
        self.db.remove_company(None)
    }
}

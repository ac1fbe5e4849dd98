//! Per-company ingestion: fetch listing records, normalize them, store them.
//!
//! Failures are isolated. A company whose fetch fails is skipped, a record
//! that cannot be stored is skipped, and the run carries on either way.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{error, info, warn};

use crate::config::MissingSalary;
use crate::hh::{RawVacancy, VacancySource};
use crate::models::{CompanyId, InsertOutcome, NewCompany, NewVacancy, Salary};
use crate::store::VacancyStore;

pub const UNTITLED: &str = "untitled vacancy";

/// hh.ru wraps search hits in `<highlighttext>` inside snippets.
static MARKUP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompanyStatus {
    Ingested,
    NoVacancies,
    FetchFailed(String),
    StoreFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyReport {
    pub company: String,
    pub status: CompanyStatus,
    pub inserted: usize,
    pub duplicates: usize,
    pub failed: usize,
    /// Records posted by some other employer, dropped before storing.
    pub filtered: usize,
}

impl CompanyReport {
    fn new(company: &str, status: CompanyStatus) -> Self {
        Self {
            company: company.to_string(),
            status,
            inserted: 0,
            duplicates: 0,
            failed: 0,
            filtered: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub companies: Vec<CompanyReport>,
}

impl IngestReport {
    pub fn inserted(&self) -> usize {
        self.companies.iter().map(|c| c.inserted).sum()
    }

    pub fn duplicates(&self) -> usize {
        self.companies.iter().map(|c| c.duplicates).sum()
    }

    pub fn filtered(&self) -> usize {
        self.companies.iter().map(|c| c.filtered).sum()
    }

    pub fn failed_records(&self) -> usize {
        self.companies.iter().map(|c| c.failed).sum()
    }

    pub fn failed_companies(&self) -> usize {
        self.companies
            .iter()
            .filter(|c| {
                matches!(
                    c.status,
                    CompanyStatus::FetchFailed(_) | CompanyStatus::StoreFailed(_)
                )
            })
            .count()
    }
}

pub struct Ingestor<F: VacancySource> {
    source: F,
    missing_salary: MissingSalary,
}

impl<F: VacancySource> Ingestor<F> {
    pub fn new(source: F, missing_salary: MissingSalary) -> Self {
        Self {
            source,
            missing_salary,
        }
    }

    /// Ingests each company in order. Never fails as a whole; per-company
    /// problems are recorded in the report.
    pub fn ingest_all<S: VacancyStore>(&self, store: &S, companies: &[String]) -> IngestReport {
        let started_at = Utc::now();
        let reports = companies
            .iter()
            .map(|company| self.ingest_company(store, company))
            .collect();

        IngestReport {
            started_at,
            finished_at: Utc::now(),
            companies: reports,
        }
    }

    pub fn ingest_company<S: VacancyStore>(&self, store: &S, company: &str) -> CompanyReport {
        info!(company, "fetching vacancies");
        let records = match self.source.fetch_vacancies(company) {
            Ok(records) => records,
            Err(e) => {
                error!(company, error = %e, "failed to fetch vacancies");
                return CompanyReport::new(company, CompanyStatus::FetchFailed(e.to_string()));
            }
        };

        let fetched = records.len();
        let records: Vec<RawVacancy> = records
            .into_iter()
            .filter(|r| posted_by(r, company))
            .collect();
        let filtered = fetched - records.len();
        if filtered > 0 {
            info!(company, filtered, "dropped vacancies posted by other employers");
        }

        if records.is_empty() {
            warn!(company, filtered, "no vacancies");
            let mut report = CompanyReport::new(company, CompanyStatus::NoVacancies);
            report.filtered = filtered;
            return report;
        }

        let new_company = NewCompany {
            url: records
                .iter()
                .find_map(|r| r.employer.as_ref()?.alternate_url.clone()),
            ..NewCompany::named(company)
        };
        let company_id = match store.save_company(&new_company) {
            Ok(id) => id,
            Err(e) => {
                error!(company, error = %e, "failed to store company");
                return CompanyReport::new(company, CompanyStatus::StoreFailed(e.to_string()));
            }
        };

        let mut report = CompanyReport::new(company, CompanyStatus::Ingested);
        report.filtered = filtered;
        for record in &records {
            let vacancy = normalize(record, company_id, self.missing_salary);
            match store.save_vacancy(&vacancy) {
                Ok(InsertOutcome::Inserted(_)) => report.inserted += 1,
                Ok(InsertOutcome::Duplicate) => report.duplicates += 1,
                Err(e) => {
                    report.failed += 1;
                    let raw = serde_json::to_string(record).unwrap_or_else(|_| format!("{:?}", record));
                    error!(
                        company,
                        record = %raw,
                        constraint = e.is_constraint_violation(),
                        error = %e,
                        "failed to store vacancy"
                    );
                }
            }
        }

        info!(
            company,
            inserted = report.inserted,
            duplicates = report.duplicates,
            failed = report.failed,
            filtered = report.filtered,
            "company ingested"
        );
        report
    }
}

/// Turns a listing record into a storable vacancy.
pub fn normalize(raw: &RawVacancy, company_id: CompanyId, policy: MissingSalary) -> NewVacancy {
    let title = non_blank(raw.name.as_deref()).unwrap_or(UNTITLED).to_string();

    let url = non_blank(raw.alternate_url.as_deref())
        .or_else(|| non_blank(raw.url.as_deref()))
        .map(str::to_string);

    let description = raw
        .snippet
        .as_ref()
        .and_then(|s| s.responsibility.as_deref())
        .map(strip_markup)
        .unwrap_or_default();

    let salary = match (&raw.salary, policy) {
        (Some(s), MissingSalary::Keep) => Salary::new(s.from, s.to),
        (Some(s), MissingSalary::Zero) => Salary::new(Some(s.from.unwrap_or(0)), Some(s.to.unwrap_or(0))),
        (None, MissingSalary::Keep) => Salary::default(),
        (None, MissingSalary::Zero) => Salary::new(Some(0), Some(0)),
    };

    NewVacancy {
        company_id,
        title,
        url,
        salary,
        currency: raw.salary.as_ref().and_then(|s| s.currency.clone()),
        description,
    }
}

/// The company-name search also matches employers whose name merely
/// contains the query ("Acme" finds "Acme Labs"), which is kept; employers
/// that do not mention it at all are dropped. Records without an employer
/// block are kept.
fn posted_by(item: &RawVacancy, company_name: &str) -> bool {
    match item.employer.as_ref().and_then(|e| e.name.as_deref()) {
        Some(employer) => employer
            .to_lowercase()
            .contains(&company_name.trim().to_lowercase()),
        None => true,
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn strip_markup(text: &str) -> String {
    MARKUP.replace_all(text, "").trim().to_string()
}

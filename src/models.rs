use serde::{Deserialize, Serialize};

pub type CompanyId = i64;
pub type VacancyId = i64;

/// Shown in place of a vacancy url the listing did not carry.
pub const NO_URL: &str = "url not provided";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub url: Option<String>,
    pub description: Option<String>,
    pub created_at: String,
}

/// Company fields as known at ingestion time, before an id is assigned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewCompany {
    pub name: String,
    pub url: Option<String>,
    pub description: Option<String>,
}

impl NewCompany {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// Salary bounds. `None` means the bound was not disclosed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salary {
    pub from: Option<i64>,
    pub to: Option<i64>,
}

impl Salary {
    pub fn new(from: Option<i64>, to: Option<i64>) -> Self {
        Self { from, to }
    }

    /// `(from + to) / 2`, only when both bounds are known.
    pub fn midpoint(&self) -> Option<f64> {
        match (self.from, self.to) {
            (Some(from), Some(to)) => Some((from as f64 + to as f64) / 2.0),
            _ => None,
        }
    }

    pub fn is_undisclosed(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }
}

/// A normalized vacancy ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVacancy {
    pub company_id: CompanyId,
    pub title: String,
    /// Dedup key. `None` never collides with another vacancy.
    pub url: Option<String>,
    pub salary: Salary,
    pub currency: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(VacancyId),
    /// A vacancy with the same url is already stored; nothing was written.
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyVacancyCount {
    pub company_id: CompanyId,
    pub name: String,
    pub vacancy_count: i64,
}

/// A vacancy joined with its owning company's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VacancyListing {
    pub id: VacancyId,
    pub company_id: CompanyId,
    pub company_name: String,
    pub title: String,
    pub salary_from: Option<i64>,
    pub salary_to: Option<i64>,
    pub currency: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub created_at: String,
}

impl VacancyListing {
    pub fn salary(&self) -> Salary {
        Salary::new(self.salary_from, self.salary_to)
    }

    pub fn display_url(&self) -> &str {
        self.url.as_deref().unwrap_or(NO_URL)
    }
}

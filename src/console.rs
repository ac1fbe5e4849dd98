use anyhow::Result;
use serde::Serialize;
use std::io::{BufRead, Write};
use tracing::error;

use crate::db::Database;
use crate::hh::VacancySource;
use crate::ingest::{CompanyStatus, IngestReport, Ingestor};
use crate::models::{CompanyVacancyCount, VacancyListing};
use crate::reports::Reports;

const NOT_SPECIFIED: &str = "not specified";

// --- Output formatting ---

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_companies(companies: &[CompanyVacancyCount]) {
    if companies.is_empty() {
        println!("No companies stored.");
        return;
    }
    println!("{:<6} {:<40} {:>10}", "ID", "COMPANY", "VACANCIES");
    println!("{}", "-".repeat(58));
    for company in companies {
        println!(
            "{:<6} {:<40} {:>10}",
            company.company_id,
            truncate(&company.name, 38),
            company.vacancy_count
        );
    }
}

pub fn print_vacancies(vacancies: &[VacancyListing]) {
    if vacancies.is_empty() {
        println!("No vacancies found.");
        return;
    }
    println!(
        "{:<6} {:<22} {:<34} {:<28} {}",
        "ID", "COMPANY", "TITLE", "SALARY", "URL"
    );
    println!("{}", "-".repeat(120));
    for v in vacancies {
        println!(
            "{:<6} {:<22} {:<34} {:<28} {}",
            v.id,
            truncate(&v.company_name, 20),
            truncate(&v.title, 32),
            truncate(&format_salary(v), 26),
            v.display_url()
        );
    }
}

pub fn print_average(average: Option<f64>) {
    match average {
        Some(avg) => println!("Average salary: {:.2}", avg),
        None => println!("No vacancies with a disclosed salary range."),
    }
}

pub fn print_ingest_report(report: &IngestReport) {
    for company in &report.companies {
        match &company.status {
            CompanyStatus::Ingested => println!(
                "  {}: {} added, {} already stored{}",
                company.company,
                company.inserted,
                company.duplicates,
                if company.failed > 0 {
                    format!(", {} failed", company.failed)
                } else {
                    String::new()
                }
            ),
            CompanyStatus::NoVacancies if company.filtered > 0 => println!(
                "  {}: no vacancies ({} from other employers filtered out)",
                company.company, company.filtered
            ),
            CompanyStatus::NoVacancies => println!("  {}: no vacancies", company.company),
            CompanyStatus::FetchFailed(e) => {
                println!("  {}: could not fetch vacancies ({})", company.company, e)
            }
            CompanyStatus::StoreFailed(e) => {
                println!("  {}: could not store company ({})", company.company, e)
            }
        }
    }

    let elapsed = report.finished_at - report.started_at;
    println!(
        "\nAdded {} vacancies ({} already stored, {} failed) in {:.1}s",
        report.inserted(),
        report.duplicates(),
        report.failed_records(),
        elapsed.num_milliseconds() as f64 / 1000.0
    );
    if report.failed_companies() > 0 {
        println!("{} company(ies) failed; see the log for details.", report.failed_companies());
    }
}

pub fn format_salary(v: &VacancyListing) -> String {
    let currency = v.currency.as_deref().map(|c| format!(" {}", c)).unwrap_or_default();
    match (v.salary_from, v.salary_to) {
        (Some(from), Some(to)) => format!("{} - {}{}", from, to, currency),
        (Some(from), None) => format!("from {}{}", from, currency),
        (None, Some(to)) => format!("up to {}{}", to, currency),
        (None, None) => NOT_SPECIFIED.to_string(),
    }
}

/// Shortens to at most `max` characters (not bytes; titles are often Cyrillic).
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

// --- Prompts ---

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes" | "да")
}

/// Asks a yes/no question. End of input counts as "no".
pub fn confirm<R: BufRead>(input: &mut R, question: &str) -> Result<bool> {
    let Some(answer) = prompt(input, &format!("{} (y/n): ", question))? else {
        return Ok(false);
    };
    Ok(is_affirmative(&answer))
}

fn prompt<R: BufRead>(input: &mut R, text: &str) -> Result<Option<String>> {
    print!("{}", text);
    std::io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

pub fn confirm_delete_vacancies<R: BufRead>(reports: Reports<'_>, input: &mut R) -> Result<()> {
    if confirm(input, "Delete ALL vacancies?")? {
        let removed = reports.delete_all_vacancies()?;
        println!("Deleted {} vacancies.", removed);
    } else {
        println!("Cancelled.");
    }
    Ok(())
}

pub fn confirm_delete_companies<R: BufRead>(reports: Reports<'_>, input: &mut R) -> Result<()> {
    if confirm(input, "Delete ALL companies and their vacancies?")? {
        let removed = reports.delete_all_companies()?;
        println!("Deleted {} companies and their vacancies.", removed);
    } else {
        println!("Cancelled.");
    }
    Ok(())
}

// --- Interactive menu ---

const MENU: &str = "
Choose an action:
1 - Load vacancies into the database
2 - Companies and vacancy counts
3 - All vacancies
4 - Average salary
5 - Vacancies with above-average salary
6 - Search vacancies by keyword
7 - Delete all vacancies
8 - Delete all companies
9 - Exit";

/// Numbered console menu. Returns on "9" or end of input. A failing action
/// is reported and the menu stays open.
pub fn run_menu<F: VacancySource, R: BufRead>(
    db: &Database,
    ingestor: &Ingestor<F>,
    companies: &[String],
    input: &mut R,
) -> Result<()> {
    println!("Interactive hh.ru vacancy search");

    loop {
        println!("{}", MENU);
        let Some(choice) = prompt(input, "Enter a number: ")? else {
            break;
        };

        match menu_action(choice.trim(), db, ingestor, companies, input) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                error!(error = %e, "menu action failed");
                println!("\nError: {:#}", e);
            }
        }
    }

    println!("Bye.");
    Ok(())
}

/// Runs one menu choice; `Ok(false)` means exit.
fn menu_action<F: VacancySource, R: BufRead>(
    choice: &str,
    db: &Database,
    ingestor: &Ingestor<F>,
    companies: &[String],
    input: &mut R,
) -> Result<bool> {
    let reports = Reports::new(db);
    match choice {
        "1" => {
            println!("\nLoading vacancies for {} companies...", companies.len());
            let report = ingestor.ingest_all(db, companies);
            print_ingest_report(&report);
        }
        "2" => {
            println!();
            print_companies(&reports.companies_with_vacancy_counts()?);
        }
        "3" => {
            println!();
            print_vacancies(&reports.all_vacancies()?);
        }
        "4" => {
            println!();
            print_average(reports.average_salary()?);
        }
        "5" => {
            let vacancies = reports.vacancies_above_average_salary()?;
            println!();
            if vacancies.is_empty() {
                println!("No vacancies above the average salary, or no salary data.");
            } else {
                print_vacancies(&vacancies);
            }
        }
        "6" => {
            let keyword = prompt(input, "Keyword: ")?.unwrap_or_default();
            println!();
            print_vacancies(&reports.search_vacancies(&keyword)?);
        }
        "7" => confirm_delete_vacancies(reports, input)?,
        "8" => confirm_delete_companies(reports, input)?,
        "9" => return Ok(false),
        other => println!("\nUnknown option '{}'. Choose 1-9.", other),
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MissingSalary;
    use crate::error::FetchError;
    use crate::hh::RawVacancy;
    use std::io::Cursor;

    struct OneListing;

    impl VacancySource for OneListing {
        fn fetch_vacancies(&self, _company_name: &str) -> Result<Vec<RawVacancy>, FetchError> {
            Ok(vec![RawVacancy {
                name: Some("Engineer".to_string()),
                alternate_url: Some("https://hh.ru/vacancy/1".to_string()),
                ..Default::default()
            }])
        }
    }

    fn listing(from: Option<i64>, to: Option<i64>, currency: Option<&str>) -> VacancyListing {
        VacancyListing {
            id: 1,
            company_id: 1,
            company_name: "Acme".to_string(),
            title: "Engineer".to_string(),
            salary_from: from,
            salary_to: to,
            currency: currency.map(str::to_string),
            url: Some("https://hh.ru/vacancy/1".to_string()),
            description: None,
            created_at: "2024-01-01 00:00:00".to_string(),
        }
    }

    #[test]
    fn test_affirmative_answers() {
        for yes in ["y", "YES", " Да ", "yes\n"] {
            assert!(is_affirmative(yes), "{:?}", yes);
        }
        for no in ["", "n", "no", "нет", "yep"] {
            assert!(!is_affirmative(no), "{:?}", no);
        }
    }

    #[test]
    fn test_confirm_reads_one_line() {
        let mut input = Cursor::new("yes\nno\n");
        assert!(confirm(&mut input, "Sure?").unwrap());
        assert!(!confirm(&mut input, "Sure?").unwrap());
        // EOF
        assert!(!confirm(&mut input, "Sure?").unwrap());
    }

    #[test]
    fn test_format_salary() {
        assert_eq!(format_salary(&listing(Some(1), Some(2), Some("RUR"))), "1 - 2 RUR");
        assert_eq!(format_salary(&listing(Some(1), None, None)), "from 1");
        assert_eq!(format_salary(&listing(None, Some(2), None)), "up to 2");
        assert_eq!(format_salary(&listing(None, None, Some("RUR"))), NOT_SPECIFIED);
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("Разработчик", 20), "Разработчик");
        assert_eq!(truncate("Разработчик", 8), "Разра...");
        assert_eq!(truncate("abc", 3), "abc");
    }

    #[test]
    fn test_menu_ingests_then_deletes_with_confirmation() {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        let ingestor = Ingestor::new(OneListing, MissingSalary::Keep);
        let companies = vec!["Acme".to_string()];

        // ingest, decline deleting vacancies, list, exit
        let mut input = Cursor::new("1\n7\nn\n3\n9\n");
        run_menu(&db, &ingestor, &companies, &mut input).unwrap();
        assert_eq!(db.count_vacancies().unwrap(), 1);

        // delete companies with confirmation, then input ends
        let mut input = Cursor::new("8\nда\n");
        run_menu(&db, &ingestor, &companies, &mut input).unwrap();
        assert_eq!(db.count_companies().unwrap(), 0);
        assert_eq!(db.count_vacancies().unwrap(), 0);
    }
}

mod config;
mod console;
mod db;
mod error;
mod hh;
mod ingest;
mod models;
mod reports;
mod store;
mod telemetry;
mod tui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::stdin;
use std::path::PathBuf;

use config::{AppConfig, Settings};
use db::Database;
use hh::HhClient;
use ingest::Ingestor;
use reports::Reports;

#[derive(Parser)]
#[command(name = "hhdb", version)]
#[command(about = "Load hh.ru vacancies for a list of companies into SQLite and report on them")]
#[command(after_help = "Examples:
  hhdb ingest --companies \"Яндекс, Ozon\"
  hhdb companies
  hhdb search rust --json
  hhdb above-average
  hhdb menu

Settings are also read from the environment and from .env
(COMPANY_NAMES, DATABASE_PATH, HH_API_URL, HH_TIMEOUT_SECS, MISSING_SALARY, ...).")]
struct Cli {
    /// Read settings from this file instead of ./.env
    #[arg(long, global = true, value_name = "PATH")]
    env_file: Option<PathBuf>,

    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init,

    /// Fetch vacancies for the configured companies and store them
    Ingest {
        /// Ingest only this company (repeatable); overrides COMPANY_NAMES
        #[arg(short, long = "company", value_name = "NAME")]
        company: Vec<String>,
    },

    /// List companies with their number of vacancies
    Companies {
        #[arg(long)]
        json: bool,
    },

    /// List all stored vacancies
    Vacancies {
        #[arg(long)]
        json: bool,
    },

    /// Show the average midpoint salary
    AvgSalary {
        #[arg(long)]
        json: bool,
    },

    /// List vacancies whose midpoint salary is above the average
    AboveAverage {
        #[arg(long)]
        json: bool,
    },

    /// Search vacancy titles (case-insensitive substring)
    Search {
        /// Keyword to look for; empty matches everything
        keyword: String,

        #[arg(long)]
        json: bool,
    },

    /// Delete one vacancy
    DeleteVacancy {
        /// Vacancy ID
        id: i64,
    },

    /// Delete one company and its vacancies
    DeleteCompany {
        /// Company ID
        id: i64,
    },

    /// Delete every vacancy
    DeleteVacancies {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete every company and all vacancies
    DeleteCompanies {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Interactive numbered menu
    Menu,

    /// Browse stored vacancies in a terminal UI
    Browse {
        /// Only show titles containing this keyword
        #[arg(short, long)]
        keyword: Option<String>,
    },
}

fn main() -> Result<()> {
    // .env must be loaded before clap reads env fallbacks, so peek at --env-file first
    load_env_file(env_file_arg().as_deref())?;

    let cli = Cli::parse();
    let config = AppConfig::from_settings(cli.settings).context("Invalid configuration")?;
    telemetry::init(&config.log_level)?;

    let db = Database::open(&config.db)
        .with_context(|| format!("Failed to open database at {}", config.db.path.display()))?;
    db.init().context("Failed to create database schema")?;
    let reports = Reports::new(&db);

    match cli.command {
        Commands::Init => {
            println!("Database initialized at {}", db.path().display());
            println!(
                "{} companies, {} vacancies stored",
                db.count_companies()?,
                db.count_vacancies()?
            );
        }

        Commands::Ingest { company } => {
            let companies = if company.is_empty() {
                config.ingest.require_companies()?.to_vec()
            } else {
                config::parse_company_names(&company.join(","))
            };

            let client = HhClient::new(config.hh.clone()).context("Failed to build API client")?;
            let ingestor = Ingestor::new(client, config.ingest.missing_salary);

            println!("Loading vacancies for {} companies...", companies.len());
            let report = ingestor.ingest_all(&db, &companies);
            console::print_ingest_report(&report);
        }

        Commands::Companies { json } => {
            let companies = reports.companies_with_vacancy_counts()?;
            if json {
                console::print_json(&companies)?;
            } else {
                console::print_companies(&companies);
            }
        }

        Commands::Vacancies { json } => {
            let vacancies = reports.all_vacancies()?;
            if json {
                console::print_json(&vacancies)?;
            } else {
                console::print_vacancies(&vacancies);
            }
        }

        Commands::AvgSalary { json } => {
            let average = reports.average_salary()?;
            if json {
                console::print_json(&serde_json::json!({ "average_salary": average }))?;
            } else {
                console::print_average(average);
            }
        }

        Commands::AboveAverage { json } => {
            let vacancies = reports.vacancies_above_average_salary()?;
            if json {
                console::print_json(&vacancies)?;
            } else if vacancies.is_empty() {
                println!("No vacancies above the average salary, or no salary data.");
            } else {
                console::print_vacancies(&vacancies);
            }
        }

        Commands::Search { keyword, json } => {
            let vacancies = reports.search_vacancies(&keyword)?;
            if json {
                console::print_json(&vacancies)?;
            } else if vacancies.is_empty() {
                println!("No vacancies containing '{}'.", keyword);
            } else {
                console::print_vacancies(&vacancies);
            }
        }

        Commands::DeleteVacancy { id } => {
            if reports.delete_vacancy(id)? == 0 {
                println!("Vacancy #{} not found.", id);
            } else {
                println!("Deleted vacancy #{}.", id);
            }
        }

        Commands::DeleteCompany { id } => match db.get_company(id)? {
            Some(company) => {
                reports.delete_company(id)?;
                println!("Deleted company '{}' and its vacancies.", company.name);
            }
            None => {
                println!("Company #{} not found.", id);
            }
        },

        Commands::DeleteVacancies { yes } => {
            if yes {
                let removed = reports.delete_all_vacancies()?;
                println!("Deleted {} vacancies.", removed);
            } else {
                console::confirm_delete_vacancies(reports, &mut stdin().lock())?;
            }
        }

        Commands::DeleteCompanies { yes } => {
            if yes {
                let removed = reports.delete_all_companies()?;
                println!("Deleted {} companies and their vacancies.", removed);
            } else {
                console::confirm_delete_companies(reports, &mut stdin().lock())?;
            }
        }

        Commands::Menu => {
            let companies = config.ingest.require_companies()?;
            let client = HhClient::new(config.hh.clone()).context("Failed to build API client")?;
            let ingestor = Ingestor::new(client, config.ingest.missing_salary);
            console::run_menu(&db, &ingestor, companies, &mut stdin().lock())?;
        }

        Commands::Browse { keyword } => {
            tui::run_browse(reports, keyword.as_deref())?;
        }
    }

    Ok(())
}

/// Finds `--env-file <PATH>` / `--env-file=<PATH>` without a full parse.
fn env_file_arg() -> Option<PathBuf> {
    let mut args = std::env::args_os().skip(1);
    while let Some(arg) = args.next() {
        let arg = arg.to_string_lossy().into_owned();
        if arg == "--env-file" {
            return args.next().map(PathBuf::from);
        }
        if let Some(path) = arg.strip_prefix("--env-file=") {
            return Some(PathBuf::from(path));
        }
    }
    None
}

fn load_env_file(path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("Failed to read env file {}", path.display()))?;
        }
        None => {
            // ./.env is optional
            dotenvy::dotenv().ok();
        }
    }
    Ok(())
}

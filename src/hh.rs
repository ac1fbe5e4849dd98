//! hh.ru job-board client.
//!
//! API reference: <https://api.hh.ru/openapi/redoc#tag/Poisk-vakansij>
//!
//! Only the first page of results is requested per company.

use reqwest::Url;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::thread::sleep;
use tracing::{debug, warn};

use crate::config::HhConfig;
use crate::error::FetchError;

/// Source of raw listing records for a company.
pub trait VacancySource {
    fn fetch_vacancies(&self, company_name: &str) -> Result<Vec<RawVacancy>, FetchError>;
}

/// A listing record exactly as the API returns it. Every field may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawVacancy {
    pub id: Option<String>,
    pub name: Option<String>,
    /// API resource URL.
    pub url: Option<String>,
    /// Human-facing page on hh.ru.
    pub alternate_url: Option<String>,
    pub snippet: Option<RawSnippet>,
    pub salary: Option<RawSalary>,
    pub employer: Option<RawEmployer>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSnippet {
    pub requirement: Option<String>,
    pub responsibility: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSalary {
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub currency: Option<String>,
    pub gross: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEmployer {
    pub id: Option<String>,
    pub name: Option<String>,
    pub alternate_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VacanciesPage {
    items: Vec<RawVacancy>,
    #[serde(default)]
    found: u64,
}

pub struct HhClient {
    client: Client,
    vacancies_url: Url,
    config: HhConfig,
}

impl HhClient {
    pub fn new(config: HhConfig) -> Result<Self, FetchError> {
        let vacancies_url = Url::parse(&format!("{}/vacancies", config.base_url))
            .map_err(|_| FetchError::InvalidUrl(config.base_url.clone()))?;

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            vacancies_url,
            config,
        })
    }

    fn search_url(&self, company_name: &str) -> Url {
        let mut url = self.vacancies_url.clone();
        url.query_pairs_mut()
            .append_pair("text", company_name)
            .append_pair("search_field", "company_name")
            .append_pair("per_page", &self.config.per_page.to_string())
            .append_pair("page", "0");
        url
    }

    fn get_page(&self, url: &Url) -> Result<VacanciesPage, FetchError> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        resp.json::<VacanciesPage>().map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.config.timeout.as_secs())
            } else {
                FetchError::Decode(e.to_string())
            }
        })
    }

    /// Retries transient failures with a linearly growing delay.
    fn get_page_with_retry(&self, url: &Url) -> Result<VacanciesPage, FetchError> {
        let mut attempt = 0;
        loop {
            match self.get_page(url) {
                Ok(page) => return Ok(page),
                Err(err) if err.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = self.config.retry_base_delay * attempt;
                    warn!(%url, attempt, error = %err, "request failed, retrying in {:?}", delay);
                    sleep(delay);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn classify(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.config.timeout.as_secs())
        } else if e.is_connect() || e.is_request() {
            FetchError::Network(e.to_string())
        } else {
            FetchError::Client(e.to_string())
        }
    }
}

impl VacancySource for HhClient {
    fn fetch_vacancies(&self, company_name: &str) -> Result<Vec<RawVacancy>, FetchError> {
        let url = self.search_url(company_name);
        let page = self.get_page_with_retry(&url)?;

        debug!(
            company = company_name,
            found = page.found,
            returned = page.items.len(),
            "fetched vacancies"
        );
        Ok(page.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    const PAGE: &str = r#"{
        "items": [
            {
                "id": "93353083",
                "name": "Senior Rust Engineer",
                "url": "https://api.hh.ru/vacancies/93353083?host=hh.ru",
                "alternate_url": "https://hh.ru/vacancy/93353083",
                "salary": {"from": 250000, "to": null, "currency": "RUR", "gross": false},
                "snippet": {
                    "requirement": "Rust, tokio",
                    "responsibility": "Develop <highlighttext>backend</highlighttext> services."
                },
                "employer": {"id": "1740", "name": "Яндекс", "alternate_url": "https://hh.ru/employer/1740"}
            },
            {
                "id": "93353084",
                "name": "Courier",
                "salary": null,
                "employer": {"id": "9", "name": "Other LLC"}
            }
        ],
        "found": 2,
        "pages": 1,
        "page": 0,
        "per_page": 100
    }"#;

    #[test]
    fn test_page_deserializes_hh_shape() {
        let page: VacanciesPage = serde_json::from_str(PAGE).unwrap();
        assert_eq!(page.found, 2);
        assert_eq!(page.items.len(), 2);

        let first = &page.items[0];
        assert_eq!(first.name.as_deref(), Some("Senior Rust Engineer"));
        let salary = first.salary.as_ref().unwrap();
        assert_eq!(salary.from, Some(250000));
        assert_eq!(salary.to, None);
        assert_eq!(salary.currency.as_deref(), Some("RUR"));

        let second = &page.items[1];
        assert!(second.salary.is_none());
        assert!(second.snippet.is_none());
        assert!(second.alternate_url.is_none());
    }

    #[test]
    fn test_search_url_encodes_company() {
        let client = HhClient::new(HhConfig {
            base_url: "https://api.example.com".to_string(),
            per_page: 20,
            ..HhConfig::default()
        })
        .unwrap();

        let url = client.search_url("Альфа Банк");
        assert_eq!(url.path(), "/vacancies");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("text".to_string(), "Альфа Банк".to_string())));
        assert!(pairs.contains(&("per_page".to_string(), "20".to_string())));
        assert!(pairs.contains(&("search_field".to_string(), "company_name".to_string())));
    }

    /// Answers one connection per canned `(status, body)` on a loopback port.
    /// The handle yields the number of requests served.
    fn serve(responses: Vec<(u16, &'static str)>) -> (String, JoinHandle<usize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let mut served = 0;
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut line = String::new();
                while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
                    line.clear();
                }
                write!(
                    stream,
                    "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                )
                .unwrap();
                stream.flush().unwrap();
                served += 1;
            }
            served
        });
        (base_url, handle)
    }

    fn local_client(base_url: String) -> HhClient {
        HhClient::new(HhConfig {
            base_url,
            timeout: Duration::from_secs(5),
            max_retries: 2,
            retry_base_delay: Duration::ZERO,
            ..HhConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_server_errors_are_retried_until_success() {
        let (base_url, server) = serve(vec![(503, "{}"), (503, "{}"), (200, PAGE)]);

        let items = local_client(base_url).fetch_vacancies("Яндекс").unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(server.join().unwrap(), 3);
    }

    #[test]
    fn test_retries_are_bounded() {
        let (base_url, server) = serve(vec![(503, "{}"), (503, "{}"), (503, "{}")]);

        let err = local_client(base_url).fetch_vacancies("Acme").unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 503, .. }));
        assert_eq!(server.join().unwrap(), 3);
    }

    #[test]
    fn test_client_error_fails_without_retry() {
        let (base_url, server) = serve(vec![(404, "{}")]);

        let err = local_client(base_url).fetch_vacancies("Acme").unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert_eq!(server.join().unwrap(), 1);
    }

    #[test]
    fn test_malformed_body_is_decode_error() {
        let (base_url, server) = serve(vec![(200, "not json at all")]);

        let err = local_client(base_url).fetch_vacancies("Acme").unwrap_err();

        assert!(matches!(err, FetchError::Decode(_)));
        assert!(!err.is_transient());
        assert_eq!(server.join().unwrap(), 1);
    }

    #[test]
    fn test_invalid_base_url() {
        let result = HhClient::new(HhConfig {
            base_url: "not a url".to_string(),
            ..HhConfig::default()
        });
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
    }

    #[test]
    #[ignore] // Hits the live hh.ru API
    fn test_fetch_live_vacancies() {
        let client = HhClient::new(HhConfig::default()).expect("client");
        let vacancies = client.fetch_vacancies("Яндекс").expect("fetch");
        assert!(vacancies.iter().any(|v| v.name.is_some()));
    }
}

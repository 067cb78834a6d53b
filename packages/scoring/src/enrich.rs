//! Derives structured `derived_signals` fields from raw job record data.
//!
//! Deterministic, keyword- and regex-based only — no ML here.

use lazy_static::lazy_static;
use regex::Regex;

use crate::record::{DerivedSignals, ExperienceYears, Geo, JobRecord, Salary};

lazy_static! {
    static ref EXPERIENCE_RANGE: Regex = Regex::new(r"(\d+)\s*[-\x{2013}]\s*(\d+)\s*(?:\+)?\s*years?").unwrap();
    static ref EXPERIENCE_PLUS: Regex = Regex::new(r"(\d+)\s*\+\s*years?").unwrap();
    static ref EXPERIENCE_MIN: Regex = Regex::new(r"(?:minimum|at least|min|minimum of)\s+(\d+)\s*years?").unwrap();
    static ref EXPERIENCE_OF: Regex = Regex::new(r"(\d+)\s*years?\s+(?:of\s+)?experience").unwrap();
}

const VISA_NO_PATTERNS: &[&str] = &[
    "no sponsorship",
    "us citizens only",
    "no visa",
    "must be authorized to work",
    "citizenship required",
    "no visa sponsorship",
    "cannot sponsor",
    "will not sponsor",
    "us citizen required",
    "citizen only",
    "us work authorization required",
];

const VISA_YES_PATTERNS: &[&str] = &[
    "visa sponsorship available",
    "will sponsor",
    "h1b welcome",
    "visa support",
    "sponsorship available",
    "h-1b sponsorship",
    "visa assistance",
    "provides sponsorship",
];

const REMOTE_JD_PATTERNS: &[&str] = &["fully remote", "100% remote", "work from home", "wfh"];

/// Enriches a [`JobRecord`] with the structured fields the rule engine and
/// downstream consumers read from `derived_signals`.
pub struct JobEnricher;

impl JobEnricher {
    pub fn enrich(record: &JobRecord) -> DerivedSignals {
        let title = record.title.clone().unwrap_or_default();
        let location = record.location.clone().unwrap_or_default();
        let jd_text = record.jd_text.clone().unwrap_or_default();

        DerivedSignals {
            job_level: Some(Self::job_level(&title)),
            employment_type: Some(Self::employment_type(record)),
            work_mode: Some(Self::work_mode(&title, &location, &jd_text)),
            visa_signal: Some(Self::visa_signal(&jd_text)),
            experience_years: Some(Self::experience_years(&jd_text)),
            salary: Some(Self::salary(record)),
            geo: Some(Self::geo(&location)),
            ..Default::default()
        }
    }

    fn job_level(title: &str) -> String {
        let title = title.to_lowercase();
        if ["intern", "internship"].iter().any(|k| title.contains(k)) {
            return "intern".to_string();
        }
        if ["new grad", "entry level", "graduate", "entry-level"]
            .iter()
            .any(|k| title.contains(k))
        {
            return "new_grad".to_string();
        }
        if ["staff", "principal", "architect"].iter().any(|k| title.contains(k)) {
            return "staff".to_string();
        }
        if ["senior", "sr.", "sr ", "lead"].iter().any(|k| title.contains(k)) {
            return "senior".to_string();
        }
        if ["junior", "jr.", "jr "].iter().any(|k| title.contains(k)) {
            return "junior".to_string();
        }
        "mid".to_string()
    }

    fn employment_type(record: &JobRecord) -> String {
        if let Some(job_type) = record
            .platform_metadata
            .as_ref()
            .and_then(|m| m.job_type.as_deref())
        {
            let job_type = job_type.to_lowercase();
            if job_type.contains("intern") {
                return "internship".to_string();
            } else if job_type.contains("contract") || job_type.contains("contractor") {
                return "contract".to_string();
            } else if job_type.contains("part") {
                return "part_time".to_string();
            } else if job_type.contains("full") {
                return "full_time".to_string();
            }
        }

        let title = record.title.clone().unwrap_or_default().to_lowercase();
        if title.contains("intern") {
            "internship".to_string()
        } else if title.contains("contract") {
            "contract".to_string()
        } else if title.contains("part-time") || title.contains("part time") {
            "part_time".to_string()
        } else {
            "full_time".to_string()
        }
    }

    fn work_mode(title: &str, location: &str, jd_text: &str) -> String {
        let title = title.to_lowercase();
        let location = location.to_lowercase();
        let jd_text = jd_text.to_lowercase();

        if title.contains("remote") || location.contains("remote") {
            return "remote".to_string();
        }
        if REMOTE_JD_PATTERNS.iter().any(|p| jd_text.contains(p)) {
            return "remote".to_string();
        }
        if title.contains("hybrid") || jd_text.contains("hybrid") {
            return "hybrid".to_string();
        }
        "onsite".to_string()
    }

    fn visa_signal(jd_text: &str) -> String {
        let jd_lower = jd_text.to_lowercase();
        if VISA_NO_PATTERNS.iter().any(|p| jd_lower.contains(p)) {
            return "explicit_no".to_string();
        }
        if VISA_YES_PATTERNS.iter().any(|p| jd_lower.contains(p)) {
            return "explicit_yes".to_string();
        }
        "unclear".to_string()
    }

    fn experience_years(jd_text: &str) -> ExperienceYears {
        let jd_lower = jd_text.to_lowercase();

        if let Some(caps) = EXPERIENCE_RANGE.captures(&jd_lower) {
            return ExperienceYears {
                min: caps.get(1).and_then(|m| m.as_str().parse().ok()),
                max: caps.get(2).and_then(|m| m.as_str().parse().ok()),
            };
        }
        if let Some(caps) = EXPERIENCE_PLUS.captures(&jd_lower) {
            return ExperienceYears {
                min: caps.get(1).and_then(|m| m.as_str().parse().ok()),
                max: None,
            };
        }
        if let Some(caps) = EXPERIENCE_MIN.captures(&jd_lower) {
            return ExperienceYears {
                min: caps.get(1).and_then(|m| m.as_str().parse().ok()),
                max: None,
            };
        }
        if let Some(caps) = EXPERIENCE_OF.captures(&jd_lower) {
            return ExperienceYears {
                min: caps.get(1).and_then(|m| m.as_str().parse().ok()),
                max: None,
            };
        }
        ExperienceYears::default()
    }

    fn salary(record: &JobRecord) -> Salary {
        let Some(metadata) = record.platform_metadata.as_ref() else {
            return Salary::default();
        };

        let interval = metadata.salary_interval.as_deref().and_then(|raw| {
            let lower = raw.to_lowercase();
            if lower.contains("year") || lower.contains("annual") {
                Some("yearly".to_string())
            } else if lower.contains("hour") {
                Some("hourly".to_string())
            } else if lower.contains("month") {
                Some("monthly".to_string())
            } else {
                None
            }
        });

        Salary {
            min: metadata.salary_min,
            max: metadata.salary_max,
            interval,
        }
    }

    fn geo(location: &str) -> Geo {
        let trimmed = location.trim();
        if trimmed.is_empty() {
            return Geo::default();
        }
        if ["remote", "anywhere", "worldwide"].contains(&trimmed.to_lowercase().as_str()) {
            return Geo {
                city: Some("Remote".to_string()),
                ..Default::default()
            };
        }

        let parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        match parts.as_slice() {
            [city] => Geo {
                city: Some(city.to_string()),
                ..Default::default()
            },
            [city, state] => Geo {
                city: Some(city.to_string()),
                state: Some(state.to_string()),
                ..Default::default()
            },
            [city, state, country, ..] => Geo {
                city: Some(city.to_string()),
                state: Some(state.to_string()),
                country: Some(country.to_string()),
            },
            [] => Geo::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PlatformMetadata;

    #[test]
    fn job_level_prioritizes_intern_over_senior_keywords() {
        assert_eq!(JobEnricher::job_level("Senior Intern Engineer"), "intern");
    }

    #[test]
    fn job_level_catches_staff_before_senior() {
        assert_eq!(JobEnricher::job_level("Staff Software Engineer"), "staff");
    }

    #[test]
    fn job_level_defaults_to_mid() {
        assert_eq!(JobEnricher::job_level("Software Engineer"), "mid");
    }

    #[test]
    fn employment_type_prefers_platform_metadata() {
        let record = JobRecord {
            title: Some("Engineer".to_string()),
            platform_metadata: Some(PlatformMetadata {
                job_type: Some("Contract".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(JobEnricher::employment_type(&record), "contract");
    }

    #[test]
    fn work_mode_detects_remote_from_jd_text() {
        assert_eq!(
            JobEnricher::work_mode("Engineer", "Anywhere", "This role is fully remote."),
            "remote"
        );
    }

    #[test]
    fn visa_signal_prefers_explicit_no_over_yes() {
        let jd = "No visa sponsorship, but we appreciate your interest in sponsorship available elsewhere.";
        assert_eq!(JobEnricher::visa_signal(jd), "explicit_no");
    }

    #[test]
    fn experience_years_parses_range() {
        let years = JobEnricher::experience_years("Looking for someone with 3-5 years experience.");
        assert_eq!(years.min, Some(3));
        assert_eq!(years.max, Some(5));
    }

    #[test]
    fn experience_years_parses_plus_form() {
        let years = JobEnricher::experience_years("7+ years required.");
        assert_eq!(years.min, Some(7));
        assert_eq!(years.max, None);
    }

    #[test]
    fn salary_normalizes_interval() {
        let record = JobRecord {
            platform_metadata: Some(PlatformMetadata {
                salary_min: Some(90_000.0),
                salary_max: Some(120_000.0),
                salary_interval: Some("Annual".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let salary = JobEnricher::salary(&record);
        assert_eq!(salary.interval, Some("yearly".to_string()));
    }

    #[test]
    fn geo_splits_city_state_country() {
        let geo = JobEnricher::geo("San Francisco, CA, USA");
        assert_eq!(geo.city, Some("San Francisco".to_string()));
        assert_eq!(geo.state, Some("CA".to_string()));
        assert_eq!(geo.country, Some("USA".to_string()));
    }

    #[test]
    fn geo_handles_remote_keyword() {
        let geo = JobEnricher::geo("remote");
        assert_eq!(geo.city, Some("Remote".to_string()));
        assert_eq!(geo.state, None);
    }
}

//! The heterogeneous job record that rules are evaluated against.
//!
//! Every leaf is optional: upstream sources disagree wildly on what they
//! capture, and the rule engine must tolerate absence rather than fail.
//! `data_source` strings in the rule table (e.g. `"poster_info.account_age_months"`)
//! are resolved against this type through [`JobRecord::lookup`], which walks
//! one nesting level at a time instead of treating the record as a free-form
//! attribute bag.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A full job posting as scraped by an upstream collector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: Option<String>,
    pub url: Option<String>,
    pub platform: Option<String>,

    pub title: Option<String>,
    pub company_name: Option<String>,
    pub location: Option<String>,
    pub jd_text: Option<String>,

    #[serde(default)]
    pub poster_info: Option<PosterInfo>,
    #[serde(default)]
    pub company_info: Option<CompanyInfo>,
    #[serde(default)]
    pub platform_metadata: Option<PlatformMetadata>,
    #[serde(default)]
    pub derived_signals: Option<DerivedSignals>,
    #[serde(default)]
    pub collection_metadata: Option<CollectionMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PosterInfo {
    pub name: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub account_age_months: Option<f64>,
    pub recent_job_count_7d: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyInfo {
    pub website_domain: Option<String>,
    pub domain_matches_name: Option<bool>,
    pub size_employees: Option<f64>,
    pub glassdoor_rating: Option<f64>,
    pub has_layoffs_recent: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformMetadata {
    pub posted_days_ago: Option<f64>,
    pub repost_count: Option<f64>,
    pub applicants_count: Option<f64>,
    pub views_count: Option<f64>,
    pub actively_hiring_tag: Option<bool>,
    pub easy_apply: Option<bool>,
    pub job_type: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_interval: Option<String>,
}

/// Fields that the [`crate::enrich::JobEnricher`] produces and later rules may read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DerivedSignals {
    pub job_level: Option<String>,
    pub employment_type: Option<String>,
    pub work_mode: Option<String>,
    pub visa_signal: Option<String>,
    #[serde(default)]
    pub experience_years: Option<ExperienceYears>,
    #[serde(default)]
    pub salary: Option<Salary>,
    #[serde(default)]
    pub geo: Option<Geo>,

    // Mismatch flags surfaced by the upstream collector, not derived here.
    pub poster_job_location_mismatch: Option<bool>,
    pub poster_title_mismatch: Option<bool>,
    pub poster_company_mismatch: Option<bool>,
    pub salary_outlier_mismatch: Option<bool>,
    pub posting_age_mismatch: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperienceYears {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Salary {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub interval: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Geo {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionMetadata {
    pub platform: Option<String>,
    pub collection_method: Option<String>,
    pub poster_expected: Option<bool>,
    pub poster_present: Option<bool>,
}

macro_rules! scalar {
    ($v:expr) => {
        $v.clone().map(|x| serde_json::to_value(x).unwrap_or(Value::Null))
    };
}

impl JobRecord {
    /// Resolve a dotted `data_source` path (e.g. `"poster_info.account_age_months"`)
    /// against this record. Unknown or absent segments resolve to `None`.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        let parts: Vec<&str> = path.split('.').collect();
        let (head, rest) = parts.split_first()?;
        match *head {
            "job_id" => scalar!(self.job_id),
            "url" => scalar!(self.url),
            "platform" => scalar!(self.platform),
            "title" => scalar!(self.title),
            "company_name" => scalar!(self.company_name),
            "location" => scalar!(self.location),
            "jd_text" => scalar!(self.jd_text),
            "poster_info" => self.poster_info.as_ref().and_then(|p| p.lookup(rest)),
            "company_info" => self.company_info.as_ref().and_then(|c| c.lookup(rest)),
            "platform_metadata" => self
                .platform_metadata
                .as_ref()
                .and_then(|m| m.lookup(rest)),
            "derived_signals" => self
                .derived_signals
                .as_ref()
                .and_then(|d| d.lookup(rest)),
            "collection_metadata" => self
                .collection_metadata
                .as_ref()
                .and_then(|c| c.lookup(rest)),
            _ => None,
        }
    }
}

impl PosterInfo {
    fn lookup(&self, rest: &[&str]) -> Option<Value> {
        let field = rest.first()?;
        match *field {
            "name" => scalar!(self.name),
            "title" => scalar!(self.title),
            "company" => scalar!(self.company),
            "location" => scalar!(self.location),
            "account_age_months" => scalar!(self.account_age_months),
            "recent_job_count_7d" => scalar!(self.recent_job_count_7d),
            _ => None,
        }
    }
}

impl CompanyInfo {
    fn lookup(&self, rest: &[&str]) -> Option<Value> {
        let field = rest.first()?;
        match *field {
            "website_domain" => scalar!(self.website_domain),
            "domain_matches_name" => scalar!(self.domain_matches_name),
            "size_employees" => scalar!(self.size_employees),
            "glassdoor_rating" => scalar!(self.glassdoor_rating),
            "has_layoffs_recent" => scalar!(self.has_layoffs_recent),
            _ => None,
        }
    }
}

impl PlatformMetadata {
    fn lookup(&self, rest: &[&str]) -> Option<Value> {
        let field = rest.first()?;
        match *field {
            "posted_days_ago" => scalar!(self.posted_days_ago),
            "repost_count" => scalar!(self.repost_count),
            "applicants_count" => scalar!(self.applicants_count),
            "views_count" => scalar!(self.views_count),
            "actively_hiring_tag" => scalar!(self.actively_hiring_tag),
            "easy_apply" => scalar!(self.easy_apply),
            "job_type" => scalar!(self.job_type),
            "salary_min" => scalar!(self.salary_min),
            "salary_max" => scalar!(self.salary_max),
            "salary_interval" => scalar!(self.salary_interval),
            _ => None,
        }
    }
}

impl DerivedSignals {
    fn lookup(&self, rest: &[&str]) -> Option<Value> {
        let field = rest.first()?;
        match *field {
            "job_level" => scalar!(self.job_level),
            "employment_type" => scalar!(self.employment_type),
            "work_mode" => scalar!(self.work_mode),
            "visa_signal" => scalar!(self.visa_signal),
            "poster_job_location_mismatch" => scalar!(self.poster_job_location_mismatch),
            "poster_title_mismatch" => scalar!(self.poster_title_mismatch),
            "poster_company_mismatch" => scalar!(self.poster_company_mismatch),
            "salary_outlier_mismatch" => scalar!(self.salary_outlier_mismatch),
            "posting_age_mismatch" => scalar!(self.posting_age_mismatch),
            "experience_years" => self
                .experience_years
                .as_ref()
                .and_then(|e| e.lookup(&rest[1..])),
            "salary" => self.salary.as_ref().and_then(|s| s.lookup(&rest[1..])),
            "geo" => self.geo.as_ref().and_then(|g| g.lookup(&rest[1..])),
            _ => None,
        }
    }
}

impl ExperienceYears {
    fn lookup(&self, rest: &[&str]) -> Option<Value> {
        match *rest.first()? {
            "min" => scalar!(self.min),
            "max" => scalar!(self.max),
            _ => None,
        }
    }
}

impl Salary {
    fn lookup(&self, rest: &[&str]) -> Option<Value> {
        match *rest.first()? {
            "min" => scalar!(self.min),
            "max" => scalar!(self.max),
            "interval" => scalar!(self.interval),
            _ => None,
        }
    }
}

impl Geo {
    fn lookup(&self, rest: &[&str]) -> Option<Value> {
        match *rest.first()? {
            "city" => scalar!(self.city),
            "state" => scalar!(self.state),
            "country" => scalar!(self.country),
            _ => None,
        }
    }
}

impl CollectionMetadata {
    fn lookup(&self, rest: &[&str]) -> Option<Value> {
        match *rest.first()? {
            "platform" => scalar!(self.platform),
            "collection_method" => scalar!(self.collection_method),
            "poster_expected" => scalar!(self.poster_expected),
            "poster_present" => scalar!(self.poster_present),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_top_level_scalar() {
        let record = JobRecord {
            jd_text: Some("hello".to_string()),
            ..Default::default()
        };
        assert_eq!(record.lookup("jd_text"), Some(Value::String("hello".into())));
    }

    #[test]
    fn lookup_nested_field() {
        let record = JobRecord {
            poster_info: Some(PosterInfo {
                account_age_months: Some(2.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            record.lookup("poster_info.account_age_months"),
            Some(serde_json::json!(2.0))
        );
    }

    #[test]
    fn lookup_missing_segment_is_none() {
        let record = JobRecord::default();
        assert_eq!(record.lookup("poster_info.account_age_months"), None);
        assert_eq!(record.lookup("nonexistent"), None);
    }

    #[test]
    fn lookup_doubly_nested_field() {
        let record = JobRecord {
            derived_signals: Some(DerivedSignals {
                geo: Some(Geo {
                    city: Some("Remote".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            record.lookup("derived_signals.geo.city"),
            Some(Value::String("Remote".into()))
        );
    }
}

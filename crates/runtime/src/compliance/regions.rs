//! Reference-data seeding: loads countries, industries, topics, and a
//! starter set of regulation baselines from a YAML file at startup.
//! Ported from `database/seed_data.py`/`seed_regulations.py` (search
//! provider coverage + the core cross-border regulation list).

use crate::compliance::baseline::BaselineStore;
use crate::compliance::errors::{ComplianceResult, StorageError};
use crate::compliance::types::{Country, Industry, RegulationBaseline, RegulationIdentity, Topic};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RegionsFile {
    #[serde(default)]
    countries: Vec<Country>,
    #[serde(default)]
    industries: Vec<Industry>,
    #[serde(default)]
    topics: Vec<Topic>,
    #[serde(default)]
    regulations: Vec<SeedRegulation>,
}

#[derive(Debug, Deserialize)]
struct SeedRegulation {
    name: String,
    country_code: String,
    industry_code: String,
    topic_code: String,
    #[serde(default)]
    issuing_authority: Option<String>,
    #[serde(default)]
    official_url: Option<String>,
    #[serde(default)]
    search_keywords: Vec<String>,
    #[serde(default)]
    is_mandatory: bool,
}

/// Reads `path`, seeds `store`'s reference rows, and adds any listed
/// starter regulations (idempotent — `BaselineStore::add` dedups by
/// identity, so re-running this on an already-seeded store is a no-op).
pub fn load_and_seed(path: &Path, store: &BaselineStore) -> ComplianceResult<usize> {
    let content = std::fs::read_to_string(path).map_err(StorageError::from)?;
    let parsed: RegionsFile = serde_yaml::from_str(&content)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;

    for country in parsed.countries {
        store.seed_country(country);
    }
    for industry in parsed.industries {
        store.seed_industry(industry);
    }
    for topic in parsed.topics {
        store.seed_topic(topic);
    }

    let mut seeded = 0;
    for reg in parsed.regulations {
        let identity = RegulationIdentity {
            name: reg.name,
            country_code: reg.country_code,
            industry_code: reg.industry_code,
        };
        let mut baseline = RegulationBaseline::new_manual(identity, reg.topic_code);
        baseline.source = "seed".to_string();
        baseline.issuing_authority = reg.issuing_authority;
        baseline.official_url = reg.official_url;
        baseline.is_mandatory = reg.is_mandatory;
        if !reg.search_keywords.is_empty() {
            baseline.search_keywords = reg.search_keywords;
        }
        store.add(baseline);
        seeded += 1;
    }
    Ok(seeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_countries_industries_topics_and_regulations() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
countries:
  - code: TW
    name_zh: "臺灣"
    name_en: "Taiwan"
    region: "APAC"
industries:
  - code: FIN
    name_zh: "金融業"
    name_en: "Financial Services"
    category: "finance"
topics:
  - code: PRIVACY
    name_zh: "個人資料保護"
    name_en: "Data Privacy"
regulations:
  - name: "Personal Data Protection Act"
    country_code: TW
    industry_code: FIN
    topic_code: PRIVACY
    is_mandatory: true
    search_keywords: ["個人資料保護法"]
"#
        )
        .unwrap();

        let store = BaselineStore::new(None);
        let seeded = load_and_seed(file.path(), &store).unwrap();
        assert_eq!(seeded, 1);
        let keywords = store.mandatory_keywords("TW", Some("FIN"), Some("PRIVACY"));
        assert_eq!(keywords.len(), 1);
    }

    #[test]
    fn missing_file_is_an_error_not_a_panic() {
        let store = BaselineStore::new(None);
        let result = load_and_seed(Path::new("/nonexistent/regions.yaml"), &store);
        assert!(result.is_err());
    }
}

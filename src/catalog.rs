//! Source catalog: which pages to read for which city.
//!
//! Each city has a primary listing page and optionally a secondary one. A
//! single national agenda serves as the last resort for any city whose own
//! sources produced nothing; it is held apart from the cities so it is never
//! iterated as one. Listings are the pages used by the detail-page flow.
//!
//! The catalog is an immutable value handed to the orchestrators, so tests
//! can build synthetic catalogs with [`SourceCatalog::new`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub primary: String,
    #[serde(default)]
    pub secondary: Option<String>,
}

impl SourceEntry {
    pub fn primary_only(primary: &str) -> Self {
        Self {
            primary: primary.to_string(),
            secondary: None,
        }
    }

    pub fn with_secondary(primary: &str, secondary: &str) -> Self {
        Self {
            primary: primary.to_string(),
            secondary: Some(secondary.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCatalog {
    national: String,
    cities: BTreeMap<String, SourceEntry>,
    #[serde(default)]
    listings: Vec<String>,
}

impl SourceCatalog {
    pub fn new(national: &str, cities: BTreeMap<String, SourceEntry>, listings: Vec<String>) -> Self {
        Self {
            national: national.to_string(),
            cities,
            listings,
        }
    }

    /// The built-in catalog of Colombian agenda pages.
    pub fn colombia() -> Self {
        let cities = [
            (
                "Bogotá",
                SourceEntry::with_secondary(
                    "https://www.atrapalo.com.co/entradas/bogota/",
                    "https://www.idartes.gov.co/es/agenda",
                ),
            ),
            (
                "Medellín",
                SourceEntry::with_secondary(
                    "https://www.atrapalo.com.co/entradas/medellin/",
                    "https://www.medellin.gov.co/es/agenda-cultural/",
                ),
            ),
            (
                "Cali",
                SourceEntry::with_secondary(
                    "https://www.atrapalo.com.co/entradas/cali/",
                    "https://www.cali.gov.co/cultura/agenda/",
                ),
            ),
            (
                "Barranquilla",
                SourceEntry::primary_only("https://www.atrapalo.com.co/entradas/barranquilla/"),
            ),
            (
                "Cartagena",
                SourceEntry::primary_only("https://www.atrapalo.com.co/entradas/cartagena/"),
            ),
            (
                "Bucaramanga",
                SourceEntry::primary_only("https://www.atrapalo.com.co/entradas/bucaramanga/"),
            ),
            (
                "Santa Marta",
                SourceEntry::primary_only("https://www.atrapalo.com.co/entradas/santa-marta/"),
            ),
            (
                "Pereira",
                SourceEntry::primary_only("https://www.atrapalo.com.co/entradas/pereira/"),
            ),
            (
                "Riohacha",
                SourceEntry::primary_only("https://www.riohacha-laguajira.gov.co/agenda"),
            ),
        ]
        .into_iter()
        .map(|(city, entry)| (city.to_string(), entry))
        .collect();

        Self::new(
            "https://www.tuboleta.com/es/eventos",
            cities,
            vec!["https://www.idartes.gov.co/es/agenda".to_string()],
        )
    }

    pub fn national(&self) -> &str {
        &self.national
    }

    #[cfg(test)]
    pub fn get(&self, city: &str) -> Option<&SourceEntry> {
        self.cities.get(city)
    }

    /// Cities in a stable (sorted) order.
    pub fn cities(&self) -> impl Iterator<Item = (&str, &SourceEntry)> {
        self.cities.iter().map(|(city, entry)| (city.as_str(), entry))
    }

    pub fn city_count(&self) -> usize {
        self.cities.len()
    }

    pub fn listings(&self) -> &[String] {
        &self.listings
    }

    /// Every URL the catalog references, national source first.
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.national.as_str())
            .chain(self.cities.values().flat_map(|entry| {
                std::iter::once(entry.primary.as_str()).chain(entry.secondary.as_deref())
            }))
            .chain(self.listings.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colombia_catalog_excludes_national_from_cities() {
        let catalog = SourceCatalog::colombia();
        assert!(catalog.city_count() > 0);
        assert!(catalog.cities().all(|(_, entry)| entry.primary != catalog.national()));
    }

    #[test]
    fn test_riohacha_has_no_secondary() {
        let catalog = SourceCatalog::colombia();
        let entry = catalog.get("Riohacha").expect("Riohacha configured");
        assert!(entry.secondary.is_none());
    }

    #[test]
    fn test_catalog_from_yaml() {
        let yaml = r#"
national: https://national.example/agenda
cities:
  Cali:
    primary: https://cali.example/eventos
    secondary: https://cali2.example/eventos
  Riohacha:
    primary: https://riohacha.example/agenda
"#;
        let catalog: SourceCatalog = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(catalog.national(), "https://national.example/agenda");
        assert_eq!(
            catalog.get("Cali").and_then(|e| e.secondary.as_deref()),
            Some("https://cali2.example/eventos")
        );
        assert!(catalog.listings().is_empty());
        let names: Vec<_> = catalog.cities().map(|(city, _)| city).collect();
        assert_eq!(names, vec!["Cali", "Riohacha"]);
    }

    #[test]
    fn test_urls_lists_every_source() {
        let catalog = SourceCatalog::colombia();
        let urls: Vec<_> = catalog.urls().collect();
        assert_eq!(urls[0], catalog.national());
        assert!(urls.contains(&"https://www.idartes.gov.co/es/agenda"));
    }
}

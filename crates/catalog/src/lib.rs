//! Stock-number reference catalog (spec.md §6): a read-only loader for the
//! pipe-delimited NSN files, fronted by a bounded TTL cache (spec.md §5,
//! "an in-process cache for stock-number lookups... is shared across
//! handlers; it is read-mostly and may be flushed at any time"). The
//! ingestion pipeline depends on the `CatalogLookup` trait, never on this
//! crate's concrete loader, so a test can inject a fake with no file on
//! disk (spec.md §9's "expose through explicit dependencies, not ambient
//! globals").

use {
    async_trait::async_trait,
    bigdecimal::BigDecimal,
    regex::Regex,
    std::{collections::HashMap, str::FromStr, sync::Arc, time::Duration},
};

#[derive(Clone, Debug, PartialEq)]
pub struct CatalogEntry {
    pub nsn: String,
    pub inc: String,
    pub item_name: String,
    pub fsc: String,
    pub niin: String,
    pub unit_of_issue: Option<String>,
    pub unit_price: Option<BigDecimal>,
    pub demil: Option<String>,
    pub security_code: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read catalog file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed catalog row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

fn nsn_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{3}-\d{4}$").expect("valid regex"))
}

/// Assembles `FSC-NIIN[0:2]-NIIN[2:5]-NIIN[5:9]` and validates the result
/// against the NSN shape (spec.md §6). `niin` must be exactly 9 digits.
pub fn assemble_nsn(fsc: &str, niin: &str) -> Option<String> {
    if niin.len() != 9 || !niin.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let nsn = format!("{fsc}-{}-{}-{}", &niin[0..2], &niin[2..5], &niin[5..9]);
    nsn_regex().is_match(&nsn).then_some(nsn)
}

pub fn is_valid_nsn(candidate: &str) -> bool {
    nsn_regex().is_match(candidate)
}

/// Immutable, fully-loaded catalog. Indexed by assembled NSN and by a
/// lowercased item name for fuzzy text lookups.
pub struct Catalog {
    by_nsn: HashMap<String, CatalogEntry>,
    by_name: Vec<(String, CatalogEntry)>,
}

impl Catalog {
    /// Parses a pipe-delimited file with a header row whose columns
    /// include `INC`, `ITEM_NAME`, `FSC`, `NIIN`, and optionally `UI`,
    /// `UNIT_PRICE`, `DEMIL`, `SECURITY_CODE` (spec.md §6). Unknown extra
    /// columns are ignored; rows with an unassembleable NSN are skipped
    /// with a `tracing::warn!`, not a hard failure, since one malformed
    /// line in a multi-million-row reference file shouldn't sink the load.
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| Error::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_reader(file)
    }

    pub fn load_from_reader(reader: impl std::io::Read) -> Result<Self, Error> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b'|')
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let col = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
        let idx_inc = col("INC");
        let idx_item_name = col("ITEM_NAME");
        let idx_fsc = col("FSC");
        let idx_niin = col("NIIN");
        let idx_ui = col("UI");
        let idx_unit_price = col("UNIT_PRICE");
        let idx_demil = col("DEMIL");
        let idx_security_code = col("SECURITY_CODE");

        let mut by_nsn = HashMap::new();
        let mut by_name = Vec::new();

        for (line, record) in csv_reader.records().enumerate() {
            let record = record?;
            let get = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("").trim();

            let fsc = get(idx_fsc);
            let niin = get(idx_niin);
            let Some(nsn) = assemble_nsn(fsc, niin) else {
                tracing::warn!(line, fsc, niin, "skipping catalog row with unassembleable NSN");
                continue;
            };

            let item_name = get(idx_item_name);
            if item_name.is_empty() {
                return Err(Error::MalformedRow {
                    line,
                    reason: "missing ITEM_NAME".to_string(),
                });
            }

            let entry = CatalogEntry {
                nsn: nsn.clone(),
                inc: get(idx_inc).to_string(),
                item_name: item_name.to_string(),
                fsc: fsc.to_string(),
                niin: niin.to_string(),
                unit_of_issue: idx_ui.map(|_| get(idx_ui)).filter(|s| !s.is_empty()).map(str::to_string),
                unit_price: idx_unit_price
                    .map(|_| get(idx_unit_price))
                    .filter(|s| !s.is_empty())
                    .and_then(|s| BigDecimal::from_str(s).ok()),
                demil: idx_demil.map(|_| get(idx_demil)).filter(|s| !s.is_empty()).map(str::to_string),
                security_code: idx_security_code
                    .map(|_| get(idx_security_code))
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            };

            by_name.push((entry.item_name.to_lowercase(), entry.clone()));
            by_nsn.insert(nsn, entry);
        }

        Ok(Self { by_nsn, by_name })
    }

    /// Looks a query up by exact NSN first, falling back to a
    /// case-insensitive substring match against item names (the "fuzzy
    /// matching against the reference catalog" spec.md §4.3 calls for — a
    /// full fuzzy-distance matcher is out of scope for a static reference
    /// lookup, substring match is the cheapest thing that actually helps
    /// OCR'd text that's missing punctuation).
    pub fn find(&self, query: &str) -> Option<CatalogEntry> {
        if is_valid_nsn(query) {
            if let Some(entry) = self.by_nsn.get(query) {
                return Some(entry.clone());
            }
        }
        let needle = query.to_lowercase();
        self.by_name
            .iter()
            .find(|(name, _)| name.contains(&needle))
            .map(|(_, entry)| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.by_nsn.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_nsn.is_empty()
    }
}

/// Collaborator boundary the ingestion pipeline depends on (spec.md §9).
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    async fn lookup(&self, nsn_or_text: &str) -> Option<CatalogEntry>;
    fn flush(&self);
}

/// Default production implementation: an immutable [`Catalog`] fronted by a
/// bounded, TTL-expiring `moka` cache.
pub struct CachedCatalog {
    catalog: Arc<Catalog>,
    cache: moka::future::Cache<String, Option<CatalogEntry>>,
}

impl CachedCatalog {
    pub fn new(catalog: Catalog, ttl: Duration, max_capacity: u64) -> Self {
        Self {
            catalog: Arc::new(catalog),
            cache: moka::future::Cache::builder()
                .time_to_live(ttl)
                .max_capacity(max_capacity)
                .build(),
        }
    }
}

#[async_trait]
impl CatalogLookup for CachedCatalog {
    async fn lookup(&self, nsn_or_text: &str) -> Option<CatalogEntry> {
        let catalog = self.catalog.clone();
        let query = nsn_or_text.to_string();
        self.cache
            .get_with(nsn_or_text.to_string(), async move { catalog.find(&query) })
            .await
    }

    fn flush(&self) {
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = "INC|ITEM_NAME|FSC|NIIN|UI|UNIT_PRICE|DEMIL|SECURITY_CODE\n\
         12345|RIFLE,5.56 MM|1005|012345678|EA|899.00|C|U\n\
         99999|MALFORMED ROW||12|EA||A|U\n";

    #[test]
    fn assembles_and_validates_nsn() {
        assert_eq!(assemble_nsn("1005", "012345678"), Some("1005-01-234-5678".to_string()));
        assert!(is_valid_nsn("1005-01-234-5678"));
        assert!(!is_valid_nsn("not-an-nsn"));
        assert_eq!(assemble_nsn("1005", "short"), None);
    }

    #[test]
    fn loads_and_skips_malformed_rows() {
        let catalog = Catalog::load_from_reader(FIXTURE.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 1);
        let entry = catalog.find("1005-01-234-5678").unwrap();
        assert_eq!(entry.item_name, "RIFLE,5.56 MM");
        assert_eq!(entry.unit_of_issue.as_deref(), Some("EA"));
    }

    #[test]
    fn fuzzy_name_lookup_is_case_insensitive_substring() {
        let catalog = Catalog::load_from_reader(FIXTURE.as_bytes()).unwrap();
        assert!(catalog.find("rifle").is_some());
        assert!(catalog.find("bayonet").is_none());
    }

    #[tokio::test]
    async fn cached_catalog_serves_from_cache_after_flush() {
        let catalog = Catalog::load_from_reader(FIXTURE.as_bytes()).unwrap();
        let cached = CachedCatalog::new(catalog, Duration::from_secs(60), 100);
        assert!(cached.lookup("1005-01-234-5678").await.is_some());
        cached.flush();
        assert!(cached.lookup("1005-01-234-5678").await.is_some());
    }
}

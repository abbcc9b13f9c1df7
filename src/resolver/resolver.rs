//! Concurrent secret resolution against Vault KV v2.
//!
//! The resolver turns a merged `secrets` map (env var → path template) into
//! env var → value by grouping templates per Vault path and fetching every
//! path concurrently, with bounded parallelism and an optional TTL cache in
//! front of the reads.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

use super::cache::Cache;
use super::error::ResolverError;
use super::grouper::{SecretMapping, group_by_path};
use crate::vault::VaultError;

/// Default ceiling on in-flight Vault reads.
const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Read access to Vault KV v2 data.
///
/// Abstracting the read lets tests drive the resolver with a fixed in-memory
/// reader instead of a live Vault server.
#[async_trait]
pub trait VaultReader: Send + Sync {
    /// Read all string-valued fields stored at `path`.
    async fn read_kv(&self, path: &str) -> Result<HashMap<String, String>, VaultError>;
}

/// Resolves env var names to secret values via grouped, concurrent Vault
/// reads.
pub struct Resolver {
    reader: Arc<dyn VaultReader>,
    base_path: String,
    max_concurrency: usize,
    cache: Option<Arc<Cache>>,
}

impl Resolver {
    /// Create a resolver over the given reader. `base_path` is prefixed to
    /// every grouped path; pass an empty string when the reader already
    /// applies its own mount prefix.
    pub fn new(reader: Arc<dyn VaultReader>, base_path: impl Into<String>) -> Self {
        Self {
            reader,
            base_path: base_path.into(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            cache: None,
        }
    }

    /// Cap the number of concurrent Vault reads. Zero is ignored.
    #[must_use]
    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        if n > 0 {
            self.max_concurrency = n;
        }
        self
    }

    /// Attach a TTL cache consulted before every read.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Resolve `secrets` (env var → path template) for `env`.
    ///
    /// All grouped paths are fetched before any value is joined into the
    /// result; if any fetch fails the whole resolve fails and successful
    /// fetches are discarded. Env vars whose key is absent from the fetched
    /// data are omitted silently. The input map is not mutated.
    pub async fn resolve(
        &self,
        secrets: &HashMap<String, String>,
        env: &str,
    ) -> Result<HashMap<String, String>, ResolverError> {
        if secrets.is_empty() {
            return Ok(HashMap::new());
        }

        let groups = group_by_path(secrets, env);
        debug!(paths = groups.len(), vars = secrets.len(), "resolving secrets");

        let results = self.fetch_all(groups.keys().cloned().collect()).await?;

        Ok(join_results(&groups, &results))
    }

    /// Fetch every path concurrently, at most `max_concurrency` in flight.
    async fn fetch_all(
        &self,
        paths: Vec<String>,
    ) -> Result<HashMap<String, HashMap<String, String>>, ResolverError> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for path in paths {
            let semaphore = Arc::clone(&semaphore);
            let reader = Arc::clone(&self.reader);
            let cache = self.cache.clone();
            let full_path = self.full_path(&path);

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
                let data = read_with_cache(reader.as_ref(), cache.as_deref(), &full_path).await;
                (path, data)
            });
        }

        let mut results = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            let (path, fetched) = joined?;
            match fetched {
                Ok(data) => {
                    results.insert(path, data);
                }
                // Dropping the JoinSet aborts the in-flight fetches.
                Err(source) => return Err(ResolverError::Fetch { path, source }),
            }
        }

        Ok(results)
    }

    /// Join the base path with a grouped path.
    fn full_path(&self, path: &str) -> String {
        if self.base_path.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", self.base_path, path)
        }
    }
}

/// Read one path, consulting the cache first when present and storing the
/// fetched data on a miss.
async fn read_with_cache(
    reader: &dyn VaultReader,
    cache: Option<&Cache>,
    full_path: &str,
) -> Result<HashMap<String, String>, VaultError> {
    if let Some(cache) = cache
        && let Some(data) = cache.get(full_path)
    {
        debug!(path = %full_path, "cache hit");
        return Ok(data);
    }

    let data = reader.read_kv(full_path).await?;

    if let Some(cache) = cache {
        cache.set(full_path, &data);
    }

    Ok(data)
}

/// Build the final env var → value map from grouped mappings and fetched
/// data. Keys absent from the fetched data are skipped.
fn join_results(
    groups: &HashMap<String, Vec<SecretMapping>>,
    results: &HashMap<String, HashMap<String, String>>,
) -> HashMap<String, String> {
    let mut resolved = HashMap::new();

    for (path, mappings) in groups {
        let Some(data) = results.get(path) else {
            continue;
        };

        for mapping in mappings {
            if let Some(value) = data.get(&mapping.key) {
                resolved.insert(mapping.env_var.clone(), value.clone());
            }
        }
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory reader returning fixed data and counting calls.
    struct FakeReader {
        data: HashMap<String, HashMap<String, String>>,
        calls: AtomicUsize,
        fail_paths: Vec<String>,
    }

    impl FakeReader {
        fn new(entries: &[(&str, &[(&str, &str)])]) -> Self {
            let data = entries
                .iter()
                .map(|(path, kvs)| {
                    let kv = kvs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
                    (path.to_string(), kv)
                })
                .collect();

            Self { data, calls: AtomicUsize::new(0), fail_paths: Vec::new() }
        }

        fn failing_on(mut self, path: &str) -> Self {
            self.fail_paths.push(path.to_string());
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VaultReader for FakeReader {
        async fn read_kv(&self, path: &str) -> Result<HashMap<String, String>, VaultError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if self.fail_paths.iter().any(|p| p == path) {
                return Err(VaultError::PermissionDenied {
                    operation: "read_kv",
                    path: path.to_string(),
                });
            }

            Ok(self.data.get(path).cloned().unwrap_or_default())
        }
    }

    fn secrets(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[tokio::test]
    async fn resolves_shared_and_env_scoped_secrets() {
        let reader = Arc::new(FakeReader::new(&[
            ("dev/database", &[("url", "pg://dev")]),
            ("shared/openai", &[("api_key", "sk-x")]),
        ]));
        let resolver = Resolver::new(reader.clone(), "");

        let input = secrets(&[
            ("DATABASE_URL", "${env}/database/url"),
            ("OPENAI_API_KEY", "shared/openai/api_key"),
        ]);

        let resolved = resolver.resolve(&input, "dev").await.unwrap();

        assert_eq!(resolved["DATABASE_URL"], "pg://dev");
        assert_eq!(resolved["OPENAI_API_KEY"], "sk-x");
        assert_eq!(reader.calls(), 2);
    }

    #[tokio::test]
    async fn empty_input_skips_the_reader() {
        let reader = Arc::new(FakeReader::new(&[]));
        let resolver = Resolver::new(reader.clone(), "");

        let resolved = resolver.resolve(&HashMap::new(), "dev").await.unwrap();

        assert!(resolved.is_empty());
        assert_eq!(reader.calls(), 0);
    }

    #[tokio::test]
    async fn prefixes_base_path() {
        let reader = Arc::new(FakeReader::new(&[("secret/dev/db", &[("url", "u")])]));
        let resolver = Resolver::new(reader, "secret");

        let resolved = resolver.resolve(&secrets(&[("URL", "${env}/db/url")]), "dev").await.unwrap();

        assert_eq!(resolved["URL"], "u");
    }

    #[tokio::test]
    async fn omits_missing_keys_silently() {
        let reader = Arc::new(FakeReader::new(&[("dev/database", &[("url", "pg://x")])]));
        let resolver = Resolver::new(reader, "");

        let input = secrets(&[
            ("DATABASE_URL", "${env}/database/url"),
            ("DATABASE_AUTH_TOKEN", "${env}/database/auth_token"),
        ]);

        let resolved = resolver.resolve(&input, "dev").await.unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved["DATABASE_URL"], "pg://x");
    }

    #[tokio::test]
    async fn one_failing_path_fails_the_whole_resolve() {
        let reader = Arc::new(
            FakeReader::new(&[("dev/ok", &[("k", "v")])]).failing_on("dev/denied"),
        );
        let resolver = Resolver::new(reader, "");

        let input = secrets(&[("OK", "dev/ok/k"), ("DENIED", "dev/denied/k")]);

        let err = resolver.resolve(&input, "dev").await.unwrap_err();

        match err {
            ResolverError::Fetch { path, .. } => assert_eq!(path, "dev/denied"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn result_is_deterministic_across_concurrency_levels() {
        let entries: &[(&str, &[(&str, &str)])] = &[
            ("dev/a", &[("k", "1")]),
            ("dev/b", &[("k", "2")]),
            ("dev/c", &[("k", "3")]),
            ("dev/d", &[("k", "4")]),
        ];
        let input = secrets(&[
            ("A", "dev/a/k"),
            ("B", "dev/b/k"),
            ("C", "dev/c/k"),
            ("D", "dev/d/k"),
        ]);

        let mut outcomes = Vec::new();
        for concurrency in [1, 2, 10] {
            let reader = Arc::new(FakeReader::new(entries));
            let resolver = Resolver::new(reader, "").with_max_concurrency(concurrency);
            outcomes.push(resolver.resolve(&input, "dev").await.unwrap());
        }

        assert_eq!(outcomes[0], outcomes[1]);
        assert_eq!(outcomes[1], outcomes[2]);
    }

    #[tokio::test]
    async fn cache_hit_skips_the_reader() {
        let reader = Arc::new(FakeReader::new(&[("dev/db", &[("url", "u")])]));
        let cache = Arc::new(Cache::new(std::time::Duration::from_secs(60)));
        let resolver = Resolver::new(reader.clone(), "").with_cache(cache);

        let input = secrets(&[("URL", "dev/db/url")]);

        let first = resolver.resolve(&input, "dev").await.unwrap();
        let second = resolver.resolve(&input, "dev").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(reader.calls(), 1);
    }

    #[tokio::test]
    async fn concurrency_stays_within_the_configured_bound() {
        struct GaugeReader {
            current: AtomicUsize,
            peak: Mutex<usize>,
        }

        #[async_trait]
        impl VaultReader for GaugeReader {
            async fn read_kv(&self, _path: &str) -> Result<HashMap<String, String>, VaultError> {
                let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                {
                    let mut peak = self.peak.lock().unwrap();
                    *peak = (*peak).max(now);
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                self.current.fetch_sub(1, Ordering::SeqCst);
                Ok(HashMap::new())
            }
        }

        let reader = Arc::new(GaugeReader { current: AtomicUsize::new(0), peak: Mutex::new(0) });
        let resolver = Resolver::new(reader.clone(), "").with_max_concurrency(2);

        let input: HashMap<String, String> =
            (0..12).map(|i| (format!("VAR{i}"), format!("dev/p{i}/k"))).collect();

        resolver.resolve(&input, "dev").await.unwrap();

        assert!(*reader.peak.lock().unwrap() <= 2);
    }
}

//! Search API fixtures and a scripted retrieval backend

use async_trait::async_trait;
use repo_collector::{FetchError, Retriever};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// One search API item
pub fn api_item(owner: &str, name: &str, stars: u64) -> Value {
    json!({
        "name": name,
        "full_name": format!("{owner}/{name}"),
        "clone_url": format!("https://github.com/{owner}/{name}.git"),
        "stargazers_count": stars,
        "owner": { "login": owner },
    })
}

/// Serve `items` as the given page
pub async fn mount_page(server: &MockServer, page: u32, items: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": items })))
        .mount(server)
        .await;
}

/// Answer the given page with a bare status code
pub async fn mount_status(server: &MockServer, page: u32, status: u16) {
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// `n` items owned by `owner`, stars descending from `top`
pub fn many_items(owner: &str, n: usize, top: u64) -> Vec<Value> {
    (0..n)
        .map(|i| api_item(owner, &format!("repo{i}"), top - i as u64))
        .collect()
}

/// Retriever that writes a small tree per repository
///
/// URLs containing one of the failing fragments fail after a partial write.
pub struct ScriptedRetriever {
    failing: Vec<String>,
    delay: Duration,
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl ScriptedRetriever {
    pub fn new() -> Self {
        Self {
            failing: Vec::new(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_for(mut self, fragments: &[&str]) -> Self {
        self.failing = fragments.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for ScriptedRetriever {
    async fn retrieve(&self, url: &str, dest: &Path, _depth: u32) -> Result<(), FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());

        std::fs::create_dir_all(dest.join(".git"))?;
        std::fs::write(dest.join("README.md"), url.as_bytes())?;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.failing.iter().any(|f| url.contains(f.as_str())) {
            return Err(FetchError::ExitStatus {
                exit_code: Some(128),
                stderr: format!("fatal: could not read from '{url}'"),
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Sorted entry names of a zip archive
pub fn zip_entries(archive: &Path) -> Vec<String> {
    let file = std::fs::File::open(archive).unwrap();
    let zip = zip::ZipArchive::new(file).unwrap();
    let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
    names.sort();
    names
}

/// Read one file out of a zip archive
pub fn zip_read(archive: &Path, name: &str) -> String {
    use std::io::Read;
    let file = std::fs::File::open(archive).unwrap();
    let mut zip = zip::ZipArchive::new(file).unwrap();
    let mut entry = zip.by_name(name).unwrap();
    let mut out = String::new();
    entry.read_to_string(&mut out).unwrap();
    out
}

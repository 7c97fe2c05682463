//! Repository Inspector (C1, §4.1): turns a bare repository reference into
//! a bounded snapshot the context-extraction agent can reason over.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::client::SourceControlClient;
use crate::error::ScmResult;
use crate::models::RepositorySnapshot;

const MANIFEST_CAP_BYTES: usize = 5 * 1024;
const TRUNCATION_MARKER: &str = "\n... [truncated]";

const DOCKERFILE_SEARCH_DIRS: &[&str] = &[".docker", "docker", "docker/images", "docker/app", "app", "src"];
const DOCKERFILE_EXCLUDE_DIRS: &[&str] = &["node_modules", ".git", "dist", "build", "test", "tests", "__pycache__"];
const DOCKERFILE_RED_HERRINGS: &[&str] = &["base", "test", "dev", "example", "sample", "demo"];
const SEARCH_DEPTH_CAP: usize = 2;

fn language_extensions() -> &'static [(&'static str, &'static [&'static str])] {
    &[
        ("python", &[".py"]),
        ("javascript", &[".js", ".jsx"]),
        ("typescript", &[".ts", ".tsx"]),
        ("go", &[".go"]),
        ("java", &[".java"]),
        ("ruby", &[".rb"]),
        ("php", &[".php"]),
    ]
}

fn manifest_files_for(language: &str) -> Vec<&'static str> {
    match language {
        "javascript" => vec!["package.json", "package-lock.json", "yarn.lock"],
        "typescript" => vec!["package.json", "tsconfig.json", "package-lock.json", "yarn.lock"],
        "python" => vec!["requirements.txt", "pyproject.toml", "setup.py", "Pipfile"],
        "go" => vec!["go.mod", "go.sum"],
        "java" => vec!["pom.xml", "build.gradle", "build.gradle.kts"],
        "ruby" => vec!["Gemfile", "Gemfile.lock"],
        "php" => vec!["composer.json", "composer.lock"],
        _ => vec![],
    }
}

const CONFIG_FILES: &[&str] = &["docker-compose.yml", ".env.example", "README.md"];

/// Truncate to `MANIFEST_CAP_BYTES`, appending a marker when truncated (B2).
fn truncate(content: String) -> String {
    if content.len() <= MANIFEST_CAP_BYTES {
        content
    } else {
        let mut cut = MANIFEST_CAP_BYTES;
        while !content.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}{}", &content[..cut], TRUNCATION_MARKER)
    }
}

fn detect_language(paths: &[String]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for path in paths {
        for (lang, exts) in language_extensions() {
            if exts.iter().any(|ext| path.ends_with(ext)) {
                *counts.entry(lang).or_insert(0) += 1;
            }
        }
    }
    counts.into_iter().max_by_key(|(_, n)| *n).map(|(lang, _)| lang.to_string())
}

fn is_excluded_dir(path: &str) -> bool {
    path.split('/').any(|segment| DOCKERFILE_EXCLUDE_DIRS.contains(&segment))
}

fn looks_like_red_herring(path: &str) -> bool {
    let lower = path.to_lowercase();
    DOCKERFILE_RED_HERRINGS.iter().any(|token| lower.contains(token))
}

pub struct RepositoryInspector<'a> {
    client: &'a dyn SourceControlClient,
}

impl<'a> RepositoryInspector<'a> {
    pub fn new(client: &'a dyn SourceControlClient) -> Self {
        Self { client }
    }

    pub async fn inspect(&self, owner: &str, repo: &str) -> ScmResult<RepositorySnapshot> {
        let root = self.client.list_directory(owner, repo, "").await?;
        let paths: Vec<String> = root.iter().map(|e| e.path.clone()).collect();
        let dominant_language = detect_language(&paths);
        debug!(owner, repo, ?dominant_language, "classified repository language");

        let mut manifests = HashMap::new();
        if let Some(lang) = &dominant_language {
            let mut files = manifest_files_for(lang);
            if lang == "typescript" {
                files.extend(manifest_files_for("javascript"));
            }
            for filename in files {
                if let Ok(content) = self.client.read_file(owner, repo, filename).await {
                    manifests.insert(filename.to_string(), truncate(content));
                } else {
                    debug!(filename, "manifest file absent, skipping");
                }
            }
        }

        let mut configs = HashMap::new();
        for filename in CONFIG_FILES {
            if let Ok(content) = self.client.read_file(owner, repo, filename).await {
                configs.insert(filename.to_string(), truncate(content));
            }
        }

        let existing_dockerfile = self.find_dockerfile(owner, repo, repo).await;
        let (existing_terraform, terraform_location) = self.find_terraform(owner, repo).await?;

        Ok(RepositorySnapshot {
            owner: owner.to_string(),
            name: repo.to_string(),
            paths,
            manifests,
            configs,
            dominant_language,
            existing_dockerfile,
            existing_terraform,
            terraform_location,
        })
    }

    /// Priority-ordered probe list, then a depth-capped recursive search
    /// over an allow-list of directories, filtering out red-herring names
    /// and excluded directories (B4).
    async fn find_dockerfile(&self, owner: &str, repo: &str, repo_name: &str) -> Option<String> {
        let candidates = [
            "Dockerfile".to_string(),
            ".docker/Dockerfile".to_string(),
            "docker/Dockerfile".to_string(),
            format!("{repo_name}/Dockerfile"),
            format!("docker/{repo_name}/Dockerfile"),
            format!("docker/images/{repo_name}/Dockerfile"),
            "app/Dockerfile".to_string(),
            "docker/app/Dockerfile".to_string(),
        ];
        for path in &candidates {
            if let Ok(content) = self.client.read_file(owner, repo, path).await {
                return Some(content);
            }
        }

        let mut found: Vec<(String, String)> = Vec::new();
        for dir in DOCKERFILE_SEARCH_DIRS {
            self.search_dir(owner, repo, dir, 0, &mut found).await;
        }
        found.retain(|(path, _)| !is_excluded_dir(path) && !looks_like_red_herring(path));
        found.sort_by_key(|(path, _)| !path.contains(repo_name));
        found.into_iter().next().map(|(_, content)| content)
    }

    async fn search_dir(&self, owner: &str, repo: &str, dir: &str, depth: usize, found: &mut Vec<(String, String)>) {
        if depth > SEARCH_DEPTH_CAP || is_excluded_dir(dir) {
            return;
        }
        let entries = match self.client.list_directory(owner, repo, dir).await {
            Ok(entries) => entries,
            Err(_) => return,
        };
        for entry in entries {
            if is_excluded_dir(&entry.path) {
                continue;
            }
            if entry.is_dir {
                if depth < SEARCH_DEPTH_CAP {
                    Box::pin(self.search_dir(owner, repo, &entry.path, depth + 1, found)).await;
                }
            } else if entry.path.ends_with("Dockerfile") {
                if let Ok(content) = self.client.read_file(owner, repo, &entry.path).await {
                    found.push((entry.path, content));
                }
            }
        }
    }

    async fn find_terraform(&self, owner: &str, repo: &str) -> ScmResult<(HashMap<String, String>, Option<String>)> {
        let mut files = HashMap::new();

        if let Ok(entries) = self.client.list_directory(owner, repo, "terraform").await {
            for entry in entries.iter().filter(|e| !e.is_dir && e.path.ends_with(".tf")) {
                if let Ok(content) = self.client.read_file(owner, repo, &entry.path).await {
                    files.insert(entry.path.clone(), content);
                }
            }
            if !files.is_empty() {
                return Ok((files, Some("terraform".to_string())));
            }
        }

        if let Ok(entries) = self.client.list_directory(owner, repo, "").await {
            for entry in entries.iter().filter(|e| !e.is_dir && e.path.ends_with(".tf")) {
                if let Ok(content) = self.client.read_file(owner, repo, &entry.path).await {
                    files.insert(entry.path.clone(), content);
                }
            }
        }
        let location = if files.is_empty() { None } else { Some("root".to_string()) };
        if location.is_none() {
            warn!(owner, repo, "no pre-existing terraform files found");
        }
        Ok((files, location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RepoEntry;
    use async_trait::async_trait;
    use std::collections::HashMap as StdHashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeClient {
        dirs: StdHashMap<String, Vec<RepoEntry>>,
        files: Mutex<StdHashMap<String, String>>,
    }

    #[async_trait]
    impl SourceControlClient for FakeClient {
        async fn list_installation_repositories(&self) -> ScmResult<Vec<crate::models::RepositorySummary>> {
            Ok(vec![])
        }
        async fn list_directory(&self, _owner: &str, _repo: &str, path: &str) -> ScmResult<Vec<RepoEntry>> {
            Ok(self.dirs.get(path).cloned().unwrap_or_default())
        }
        async fn read_file(&self, _owner: &str, _repo: &str, path: &str) -> ScmResult<String> {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| crate::error::ScmError::NotAFile(path.to_string()))
        }
        async fn create_or_update_file(&self, _: &str, _: &str, _: &str, _: &str, _: &str, _: &str) -> ScmResult<()> {
            Ok(())
        }
        async fn open_change_request(&self, _: &str, _: &str, _: &str, _: &str, _: &str, _: &str) -> ScmResult<u64> {
            Ok(1)
        }
    }

    #[test]
    fn language_detection_picks_argmax() {
        let paths = vec!["a.py".to_string(), "b.py".to_string(), "c.js".to_string()];
        assert_eq!(detect_language(&paths), Some("python".to_string()));
    }

    #[test]
    fn language_detection_empty_yields_none() {
        assert_eq!(detect_language(&[]), None);
    }

    #[test]
    fn truncation_adds_marker_past_cap() {
        let big = "x".repeat(MANIFEST_CAP_BYTES + 100);
        let truncated = truncate(big);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        assert_eq!(truncated.len(), MANIFEST_CAP_BYTES + TRUNCATION_MARKER.len());
    }

    #[test]
    fn short_content_is_untouched() {
        let short = "hello".to_string();
        assert_eq!(truncate(short.clone()), short);
    }

    #[test]
    fn node_modules_dockerfile_is_excluded() {
        assert!(is_excluded_dir("node_modules/x/Dockerfile"));
        assert!(!is_excluded_dir("app/Dockerfile"));
    }

    #[tokio::test]
    async fn inspector_fetches_manifests_for_detected_language() {
        let mut dirs = StdHashMap::new();
        dirs.insert(
            "".to_string(),
            vec![
                RepoEntry { path: "app.py".into(), is_dir: false },
                RepoEntry { path: "requirements.txt".into(), is_dir: false },
            ],
        );
        let mut files = StdHashMap::new();
        files.insert("requirements.txt".to_string(), "fastapi\nuvicorn\n".to_string());
        let client = FakeClient { dirs, files: Mutex::new(files) };

        let inspector = RepositoryInspector::new(&client);
        let snapshot = inspector.inspect("acme", "widgets").await.unwrap();

        assert_eq!(snapshot.dominant_language.as_deref(), Some("python"));
        assert!(snapshot.manifests.contains_key("requirements.txt"));
        assert!(!snapshot.has_existing_dockerfile());
    }
}

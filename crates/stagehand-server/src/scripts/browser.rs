//! Script directory browser rooted at the configured scripts directory.
//!
//! Paths are resolved lexically against the root and then checked again
//! after canonicalization, so neither `..` nor symlinks can leave the root.
//! Each controller keeps its own browse position.

use crate::session::{ConnectionId, ControllerCleanup};
use async_trait::async_trait;
use stagehand_core::messages::{BreadcrumbEntry, BrowseOption, OptionKind, ScriptOptions};
use stagehand_core::{ResultExt, StageError, StageResult};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

const ROOT_LABEL: &str = "scripts";

pub struct ScriptBrowser {
    root: PathBuf,
    cursors: RwLock<HashMap<ConnectionId, PathBuf>>,
}

/// Lexically resolve `requested` to a path relative to the root.
fn normalize(requested: &str) -> StageResult<PathBuf> {
    let mut rel = PathBuf::new();
    for comp in Path::new(requested.trim()).components() {
        match comp {
            Component::CurDir => {}
            Component::Normal(part) => rel.push(part),
            Component::ParentDir => {
                if !rel.pop() {
                    return Err(StageError::InvalidPath(format!(
                        "'{requested}' is outside the scripts directory"
                    )));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(StageError::InvalidPath(format!(
                    "'{requested}' must be relative to the scripts directory"
                )));
            }
        }
    }
    Ok(rel)
}

/// Display form: `.` for the root, `/`-joined components otherwise.
fn rel_string(rel: &Path) -> String {
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

fn is_script_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
}

fn breadcrumb(rel: &Path) -> Vec<BreadcrumbEntry> {
    let mut crumbs = vec![BreadcrumbEntry {
        name: ROOT_LABEL.to_string(),
        path: ".".to_string(),
    }];
    let mut acc = PathBuf::new();
    for comp in rel.components() {
        acc.push(comp);
        crumbs.push(BreadcrumbEntry {
            name: comp.as_os_str().to_string_lossy().into_owned(),
            path: rel_string(&acc),
        });
    }
    crumbs
}

impl ScriptBrowser {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cursors: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Confirm the canonical target still lives under the canonical root.
    async fn contained(&self, full: &Path) -> StageResult<()> {
        let root = tokio::fs::canonicalize(&self.root).await?;
        let target = tokio::fs::canonicalize(full).await?;
        if target.starts_with(&root) {
            Ok(())
        } else {
            Err(StageError::InvalidPath(
                "path resolves outside the scripts directory".into(),
            ))
        }
    }

    /// List `requested` and make it this controller's browse position.
    pub async fn browse(&self, conn: ConnectionId, requested: &str) -> StageResult<ScriptOptions> {
        let rel = normalize(requested).tagged("path_traversal")?;
        let full = self.root.join(&rel);

        let meta = tokio::fs::metadata(&full).await.map_err(|_| {
            StageError::InvalidPath(format!("'{}' not found", rel_string(&rel)))
                .tagged("path_not_found")
        })?;
        if !meta.is_dir() {
            return Err(StageError::InvalidPath(format!(
                "'{}' is not a directory",
                rel_string(&rel)
            ))
            .tagged("not_a_directory"));
        }
        self.contained(&full).await.tagged("path_traversal")?;

        let options = self.list(&rel, &full).await.tagged("browse_error")?;
        self.cursors.write().await.insert(conn, rel.clone());
        debug!(conn_id = conn, path = %rel_string(&rel), entries = options.len(), "browsed scripts");

        Ok(ScriptOptions {
            current_path: rel_string(&rel),
            breadcrumb: breadcrumb(&rel),
            options,
        })
    }

    /// This controller's last good browse position.
    pub async fn current(&self, conn: ConnectionId) -> String {
        self.cursors
            .read()
            .await
            .get(&conn)
            .map(|p| rel_string(p))
            .unwrap_or_else(|| ".".to_string())
    }

    async fn list(&self, rel: &Path, full: &Path) -> StageResult<Vec<BrowseOption>> {
        let mut dirs = Vec::new();
        let mut files = Vec::new();

        let mut entries = tokio::fs::read_dir(full).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let Ok(meta) = tokio::fs::metadata(entry.path()).await else {
                continue;
            };
            let path = rel_string(&rel.join(&name));
            if meta.is_dir() {
                dirs.push(BrowseOption {
                    name: format!("{name}/"),
                    path,
                    kind: OptionKind::BrowseDir,
                });
            } else if meta.is_file() && is_script_name(&name) {
                files.push(BrowseOption {
                    name,
                    path,
                    kind: OptionKind::ScriptFile,
                });
            }
        }
        dirs.sort_by(|a, b| a.name.cmp(&b.name));
        files.sort_by(|a, b| a.name.cmp(&b.name));

        let mut options = Vec::with_capacity(dirs.len() + files.len() + 1);
        if rel.components().next().is_some() {
            let parent = rel.parent().unwrap_or(Path::new(""));
            options.push(BrowseOption {
                name: "../".to_string(),
                path: rel_string(parent),
                kind: OptionKind::BrowseDir,
            });
        }
        options.extend(dirs);
        options.extend(files);
        Ok(options)
    }

    /// Resolve a script path for loading.
    ///
    /// Returns the full path and the file name shown to the presenter.
    pub async fn resolve_script(&self, filename: &str) -> StageResult<(PathBuf, String)> {
        if filename.trim().is_empty() {
            return Err(StageError::InvalidPath("no script file given".into())
                .tagged("load_no_filename"));
        }
        let rel = normalize(filename).tagged("load_path_traversal")?;
        let full = self.root.join(&rel);

        let is_file = tokio::fs::metadata(&full)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(StageError::InvalidPath(format!(
                "'{}' is not a file",
                rel_string(&rel)
            ))
            .tagged("load_not_a_file"));
        }
        self.contained(&full).await.tagged("load_path_traversal")?;

        let name = rel
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !is_script_name(&name) {
            return Err(StageError::InvalidPath("only .txt scripts can be loaded".into())
                .tagged("load_wrong_type"));
        }
        Ok((full, name))
    }
}

#[async_trait]
impl ControllerCleanup for ScriptBrowser {
    fn name(&self) -> &'static str {
        "script_browser"
    }

    async fn on_controller_gone(&self, id: ConnectionId) -> StageResult<()> {
        if self.cursors.write().await.remove(&id).is_some() {
            debug!(conn_id = id, "dropped browse position");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("episodes/ep1")).unwrap();
        std::fs::create_dir_all(root.join(".hidden")).unwrap();
        std::fs::write(root.join("intro.txt"), "hello\n").unwrap();
        std::fs::write(root.join("notes.md"), "skip\n").unwrap();
        std::fs::write(root.join("episodes/one.TXT"), "x\n").unwrap();
        dir
    }

    #[test]
    fn normalize_rejects_escapes() {
        assert_eq!(normalize(".").unwrap(), PathBuf::new());
        assert_eq!(normalize("a/./b/..").unwrap(), PathBuf::from("a"));
        assert!(normalize("..").is_err());
        assert!(normalize("a/../../b").is_err());
        assert!(normalize("/etc").is_err());
    }

    #[tokio::test]
    async fn root_listing_filters_and_sorts() {
        let dir = tree();
        let browser = ScriptBrowser::new(dir.path());
        let opts = browser.browse(1, ".").await.unwrap();
        assert_eq!(opts.current_path, ".");
        let names: Vec<&str> = opts.options.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["episodes/", "intro.txt"]);
        assert_eq!(opts.breadcrumb.len(), 1);
    }

    #[tokio::test]
    async fn subdirectory_has_parent_entry_and_breadcrumb() {
        let dir = tree();
        let browser = ScriptBrowser::new(dir.path());
        let opts = browser.browse(1, "episodes").await.unwrap();
        assert_eq!(opts.options[0].name, "../");
        assert_eq!(opts.options[0].path, ".");
        assert!(opts.options.iter().any(|o| o.path == "episodes/one.TXT"));
        assert!(opts.options.iter().any(|o| o.path == "episodes/ep1"));
        assert_eq!(opts.breadcrumb[1].path, "episodes");
        assert_eq!(browser.current(1).await, "episodes");
    }

    #[tokio::test]
    async fn traversal_keeps_previous_position() {
        let dir = tree();
        let browser = ScriptBrowser::new(dir.path());
        browser.browse(1, "episodes").await.unwrap();
        let err = browser.browse(1, "../..").await.unwrap_err();
        assert_eq!(err.context(), Some("path_traversal"));
        assert_eq!(browser.current(1).await, "episodes");
    }

    #[tokio::test]
    async fn browse_errors_are_tagged() {
        let dir = tree();
        let browser = ScriptBrowser::new(dir.path());
        assert_eq!(
            browser.browse(1, "missing").await.unwrap_err().context(),
            Some("path_not_found")
        );
        assert_eq!(
            browser.browse(1, "intro.txt").await.unwrap_err().context(),
            Some("not_a_directory")
        );
    }

    #[tokio::test]
    async fn resolve_script_checks() {
        let dir = tree();
        let browser = ScriptBrowser::new(dir.path());
        let (full, name) = browser.resolve_script("intro.txt").await.unwrap();
        assert!(full.ends_with("intro.txt"));
        assert_eq!(name, "intro.txt");

        let ctx = |r: StageResult<(PathBuf, String)>| r.unwrap_err().context().map(str::to_string);
        assert_eq!(ctx(browser.resolve_script("").await).as_deref(), Some("load_no_filename"));
        assert_eq!(ctx(browser.resolve_script("../x.txt").await).as_deref(), Some("load_path_traversal"));
        assert_eq!(ctx(browser.resolve_script("episodes").await).as_deref(), Some("load_not_a_file"));
        assert_eq!(ctx(browser.resolve_script("notes.md").await).as_deref(), Some("load_wrong_type"));
    }

    #[tokio::test]
    async fn cleanup_forgets_position() {
        let dir = tree();
        let browser = ScriptBrowser::new(dir.path());
        browser.browse(4, "episodes").await.unwrap();
        browser.on_controller_gone(4).await.unwrap();
        assert_eq!(browser.current(4).await, ".");
    }
}

use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};

/// The directory the filesystem tools are confined to.
///
/// Every agent-supplied path goes through [`Workspace::resolve`], which pins
/// the result under the root. Escapes via `..`, absolute paths, or symlinks
/// are rejected with an error the model can read and correct.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    max_file_bytes: u64,
}

impl Workspace {
    /// `max_file_bytes` caps how large a file the tools will read.
    pub fn new(root: impl Into<PathBuf>, max_file_bytes: u64) -> Result<Self> {
        let root = root.into();
        let root = root
            .canonicalize()
            .with_context(|| format!("workspace root does not exist: {}", root.display()))?;
        Ok(Self {
            root,
            max_file_bytes,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_bytes
    }

    /// Map an agent-supplied path to an absolute path under the root.
    ///
    /// Relative paths are taken relative to the root; absolute paths are
    /// accepted only when they already point inside it. `..` components are
    /// resolved lexically and must never climb past the root, so an escape
    /// fails even when the target does not exist yet.
    pub fn resolve(&self, supplied: &str) -> Result<PathBuf> {
        let candidate = Path::new(supplied);
        let relative = if candidate.is_absolute() {
            match candidate.strip_prefix(&self.root) {
                Ok(rest) => rest,
                Err(_) => bail!(
                    "path '{}' is outside the workspace '{}'",
                    supplied,
                    self.root.display()
                ),
            }
        } else {
            candidate
        };

        let mut resolved = self.root.clone();
        let mut depth: usize = 0;
        for component in relative.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    if depth == 0 {
                        bail!(
                            "path '{}' climbs out of the workspace '{}'",
                            supplied,
                            self.root.display()
                        );
                    }
                    depth -= 1;
                    resolved.pop();
                }
                Component::Normal(part) => {
                    depth += 1;
                    resolved.push(part);
                }
                Component::RootDir | Component::Prefix(_) => {
                    bail!("path '{}' is not a workspace-relative path", supplied);
                }
            }
        }

        // A symlink inside the tree may still point out of it; check the
        // real location of anything that already exists.
        if resolved.exists() {
            let real = resolved
                .canonicalize()
                .with_context(|| format!("cannot resolve path '{}'", supplied))?;
            if !real.starts_with(&self.root) {
                bail!(
                    "path '{}' resolves outside the workspace via a symlink",
                    supplied
                );
            }
            return Ok(real);
        }
        Ok(resolved)
    }

    /// Reject files over the configured byte limit before reading them.
    pub async fn check_readable(&self, path: &Path) -> Result<()> {
        let meta = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("cannot stat '{}'", path.display()))?;
        if meta.len() > self.max_file_bytes {
            bail!(
                "file is {} bytes, over the {}-byte read limit",
                meta.len(),
                self.max_file_bytes
            );
        }
        Ok(())
    }
}

//! # Git Provider
//!
//! Git projects are checked out into a deterministic cache directory derived
//! from the repository host, the repository path and the normalized ref. The
//! resolution engine only needs the [`GitProvider`] trait; [`SystemGit`] is the
//! default implementation and shells out to the system `git` command, which
//! picks up SSH keys, credential helpers and anything configured in
//! `~/.gitconfig`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info};
use url::Url;

use crate::error::{Error, Result};
use crate::link::GitRef;

/// Makes a git checkout available on disk.
pub trait GitProvider {
    /// Ensure `dest` holds a checkout of `url` at `git_ref`.
    ///
    /// Clones when `dest` does not exist yet, otherwise fetches and hard-resets
    /// the existing checkout to the remote ref. Returns the checkout path.
    fn ensure_cloned(&self, url: &str, git_ref: &GitRef, dest: &Path) -> Result<PathBuf>;
}

/// The default provider backed by the `git` binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemGit;

impl GitProvider for SystemGit {
    fn ensure_cloned(&self, url: &str, git_ref: &GitRef, dest: &Path) -> Result<PathBuf> {
        if dest.join(".git").is_dir() {
            debug!("Updating cached checkout {} at {}", url, dest.display());
            run_git(url, git_ref, dest, &["fetch", "--depth=1", "origin", git_ref.name()])?;
            run_git(url, git_ref, dest, &["reset", "--hard", "FETCH_HEAD"])?;
        } else {
            info!("Cloning {}@{} into {}", url, git_ref, dest.display());
            clone_shallow(url, git_ref, dest)?;
        }
        Ok(dest.to_path_buf())
    }
}

/// Clone a repository at a specific ref using a shallow clone.
pub fn clone_shallow(url: &str, git_ref: &GitRef, target_dir: &Path) -> Result<()> {
    // git refuses to clone into an existing non-empty directory
    if target_dir.exists() {
        fs::remove_dir_all(target_dir)?;
    }
    if let Some(parent) = target_dir.parent() {
        fs::create_dir_all(parent)?;
    }

    let output = Command::new("git")
        .args(["clone", "--depth=1", "--branch", git_ref.name(), url])
        .arg(target_dir)
        .output()
        .map_err(|e| Error::GitClone {
            url: url.to_string(),
            r#ref: git_ref.to_string(),
            message: e.to_string(),
            hint: Some("Is git installed and on PATH?".to_string()),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let hint = if stderr.contains("Authentication failed")
            || stderr.contains("Permission denied")
            || stderr.contains("Could not read from remote repository")
        {
            Some(
                "Make sure you have access to the repository (SSH key, credential helper or token)"
                    .to_string(),
            )
        } else if stderr.contains("not found in upstream") {
            Some(format!("Check that {} exists on the remote", git_ref))
        } else {
            None
        };

        return Err(Error::GitClone {
            url: url.to_string(),
            r#ref: git_ref.to_string(),
            message: stderr.trim().to_string(),
            hint,
        });
    }

    Ok(())
}

fn run_git(url: &str, git_ref: &GitRef, dir: &Path, args: &[&str]) -> Result<()> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| Error::GitCommand {
            command: args.join(" "),
            url: url.to_string(),
            stderr: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(Error::GitCommand {
            command: format!("{} ({})", args.join(" "), git_ref),
            url: url.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Split a git URL into its host and repository path.
///
/// Accepts URLs with a scheme (`https://host/org/repo.git`,
/// `ssh://git@host/org/repo`) and scp-like addresses (`git@host:org/repo.git`).
/// The trailing `.git` and surrounding slashes are dropped from the path.
pub fn split_git_url(url: &str) -> Result<(String, String)> {
    let (host, path) = if url.contains("://") {
        let parsed = Url::parse(url)?;
        let host = match parsed.host_str() {
            Some(host) => host.to_string(),
            None if parsed.scheme() == "file" => "local".to_string(),
            None => {
                return Err(Error::Resolution {
                    key: url.to_string(),
                    message: "git url has no host".to_string(),
                })
            }
        };
        (host, parsed.path().to_string())
    } else if let Some((user_host, path)) = url.split_once(':') {
        let host = user_host.rsplit('@').next().unwrap_or(user_host);
        (host.to_string(), path.to_string())
    } else {
        return Err(Error::Resolution {
            key: url.to_string(),
            message: "unrecognized git url".to_string(),
        });
    };

    let path = path.trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    if host.is_empty() || path.is_empty() {
        return Err(Error::Resolution {
            key: url.to_string(),
            message: "git url needs both a host and a repository path".to_string(),
        });
    }
    Ok((host, path.to_string()))
}

/// The checkout directory for `url` at `git_ref` under `cache_root`.
///
/// Layout: `<cache_root>/<host>/<repo path>/<kind>-<ref name>`, with each
/// component passed through [`encode_path_component`]. Distinct urls and refs
/// never share a directory.
pub fn cache_path(cache_root: &Path, url: &str, git_ref: &GitRef) -> Result<PathBuf> {
    let (host, repo_path) = split_git_url(url)?;
    let mut path = cache_root.join(encode_path_component(&host));
    for segment in repo_path.split('/').filter(|s| !s.is_empty()) {
        path.push(encode_path_component(segment));
    }
    path.push(format!(
        "{}-{}",
        git_ref.kind(),
        encode_path_component(git_ref.name())
    ));
    Ok(path)
}

/// Encode a string as a single filesystem-safe path component.
///
/// ASCII letters, digits, `-`, `_` and `.` pass through; every other byte is
/// written as `%XX`. The encoding is reversible, so different inputs always
/// give different components. A component made only of dots is fully escaped
/// so it can never be `.` or `..`.
pub fn encode_path_component(value: &str) -> String {
    let all_dots = !value.is_empty() && value.bytes().all(|b| b == b'.');
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'.' if all_dots => encoded.push_str("%2E"),
            b if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.') => {
                encoded.push(b as char)
            }
            b => encoded.push_str(&format!("%{:02X}", b)),
        }
    }
    encoded
}

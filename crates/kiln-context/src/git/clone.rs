//! Repository checkout for backends that need a local context

use crate::error::{Error, Result};
use crate::git::url::mask_credentials;
use kiln_core::types::GitConfig;
use kiln_core::{CommandRunner, CommandSpec};
use std::path::Path;
use tracing::{debug, info, warn};

/// Clone `url` into `destination` and check out the requested branch/revision
///
/// The clone is shallow unless a revision is requested. Branch and revision
/// are checked out as separate steps. A failed branch checkout is retried
/// once after fetching the branch from `origin`.
pub async fn clone_repository(
    runner: &dyn CommandRunner,
    url: &str,
    destination: &Path,
    git: &GitConfig,
) -> Result<()> {
    let masked = mask_credentials(url);
    info!("Cloning repository: {} -> {}", masked, destination.display());

    let revision = non_empty(git.revision.as_deref());
    let branch = non_empty(git.branch.as_deref());

    let mut clone = CommandSpec::new("git").arg("clone");
    if revision.is_none() {
        clone = clone.args(["--depth", "1"]);
    }
    let clone = clone
        .arg(url)
        .arg(destination.to_string_lossy().into_owned());

    debug!("Running: git clone {}", masked);
    let output = runner.run(&clone).await?;
    if !output.success {
        return Err(Error::clone_failed(mask_credentials(&output.error_message())));
    }

    if let Some(branch) = branch {
        checkout_branch(runner, destination, branch).await?;
    }

    if let Some(revision) = revision {
        debug!("Checking out revision {}", revision);
        let output = runner.run(&git_in(destination, ["checkout", revision])).await?;
        if !output.success {
            return Err(Error::checkout_failed(
                revision,
                mask_credentials(&output.error_message()),
            ));
        }
    }

    info!("Repository cloned successfully");
    Ok(())
}

async fn checkout_branch(runner: &dyn CommandRunner, repo: &Path, branch: &str) -> Result<()> {
    debug!("Checking out branch {}", branch);
    let output = runner.run(&git_in(repo, ["checkout", branch])).await?;
    if output.success {
        return Ok(());
    }

    warn!(
        "Checkout of '{}' failed, fetching it from origin and retrying",
        branch
    );
    let fetch = runner
        .run(&git_in(repo, ["fetch", "origin", branch]))
        .await?;
    if !fetch.success {
        return Err(Error::checkout_failed(
            branch,
            mask_credentials(&fetch.error_message()),
        ));
    }

    // a shallow single-branch clone has no remote-tracking ref for `branch`
    let retry = runner
        .run(&git_in(repo, ["checkout", "-B", branch, "FETCH_HEAD"]))
        .await?;
    if !retry.success {
        return Err(Error::checkout_failed(
            branch,
            mask_credentials(&retry.error_message()),
        ));
    }
    Ok(())
}

fn git_in<'a>(repo: &Path, args: impl IntoIterator<Item = &'a str>) -> CommandSpec {
    CommandSpec::new("git").args(args).current_dir(repo)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

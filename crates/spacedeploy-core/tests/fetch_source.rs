//! Tests for shallow source cloning against local repositories.

mod support;

use git2::Repository;
use spacedeploy_core::git::{GitFetcher, SourceRef};
use support::git::{UpstreamRepo, commit_all, git_output, write_files};
use tempfile::TempDir;

#[tokio::test]
async fn clones_default_branch_at_depth_one() {
    let upstream_dir = TempDir::new().unwrap();
    let upstream = UpstreamRepo::create(upstream_dir.path(), &[("main.go", "package main")]);
    write_files(upstream_dir.path(), &[("main.go", "package main // v2")]);
    commit_all(&upstream.repo, "second commit");

    let work = TempDir::new().unwrap();
    let dest = work.path().join("source");
    let result = GitFetcher::default()
        .fetch(&SourceRef::new(&upstream.url), &dest)
        .await
        .unwrap();

    assert_eq!(result.tree_dir, dest);
    assert_eq!(result.commit_sha, upstream.head());
    assert_eq!(
        std::fs::read_to_string(dest.join("main.go")).unwrap(),
        "package main // v2"
    );
    assert_eq!(
        git_output(&dest, &["rev-parse", "--is-shallow-repository"]),
        "true"
    );
    assert_eq!(git_output(&dest, &["rev-list", "--count", "HEAD"]), "1");
}

#[tokio::test]
async fn clones_requested_branch() {
    let upstream_dir = TempDir::new().unwrap();
    let upstream = UpstreamRepo::create(upstream_dir.path(), &[("VERSION", "stable")]);
    let default_ref = upstream.repo.head().unwrap().name().unwrap().to_string();
    {
        let head = upstream.repo.head().unwrap().peel_to_commit().unwrap();
        upstream.repo.branch("release", &head, false).unwrap();
    }
    upstream.repo.set_head("refs/heads/release").unwrap();
    upstream
        .repo
        .checkout_head(Some(git2::build::CheckoutBuilder::new().force()))
        .unwrap();
    write_files(upstream_dir.path(), &[("VERSION", "release")]);
    let release_commit = commit_all(&upstream.repo, "release");
    upstream.repo.set_head(&default_ref).unwrap();
    upstream
        .repo
        .checkout_head(Some(git2::build::CheckoutBuilder::new().force()))
        .unwrap();

    let work = TempDir::new().unwrap();
    let dest = work.path().join("source");
    let source = SourceRef::new(&upstream.url).with_branch("release");
    let result = GitFetcher::default().fetch(&source, &dest).await.unwrap();

    assert_eq!(result.commit_sha, release_commit.to_string());
    assert_eq!(
        std::fs::read_to_string(dest.join("VERSION")).unwrap(),
        "release"
    );
}

#[tokio::test]
async fn unknown_branch_fails() {
    let upstream_dir = TempDir::new().unwrap();
    let upstream = UpstreamRepo::create(upstream_dir.path(), &[("main.go", "package main")]);

    let work = TempDir::new().unwrap();
    let source = SourceRef::new(&upstream.url).with_branch("does-not-exist");
    let err = GitFetcher::default()
        .fetch(&source, &work.path().join("source"))
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("Failed to clone"));
}

#[tokio::test]
async fn clone_is_a_working_copy_with_origin() {
    let upstream_dir = TempDir::new().unwrap();
    let upstream = UpstreamRepo::create(upstream_dir.path(), &[("a.txt", "a")]);

    let work = TempDir::new().unwrap();
    let dest = work.path().join("source");
    GitFetcher::default()
        .fetch(&SourceRef::new(&upstream.url), &dest)
        .await
        .unwrap();

    let cloned = Repository::open(&dest).unwrap();
    assert!(cloned.find_remote("origin").is_ok());
    assert!(!cloned.is_bare());
}

use std::path::Path;
use std::process::Command;

use git2::{IndexAddOption, Repository, Signature};

const GIT_ENV_OVERRIDES: [&str; 4] = [
    "GIT_DIR",
    "GIT_WORK_TREE",
    "GIT_INDEX_FILE",
    "GIT_COMMON_DIR",
];

pub fn git_command() -> Command {
    let mut cmd = Command::new("git");
    for key in GIT_ENV_OVERRIDES {
        cmd.env_remove(key);
    }
    cmd
}

/// Run git in `dir` and return trimmed stdout.
pub fn git_output(dir: &Path, args: &[&str]) -> String {
    let output = git_command()
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git should run");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

pub fn commit_all(repo: &Repository, message: &str) -> git2::Oid {
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();

    let sig = Signature::now("spacedeploy tests", "tests@example.com").unwrap();
    let parents = match repo.head() {
        Ok(head) => vec![repo.find_commit(head.target().unwrap()).unwrap()],
        Err(_) => Vec::new(),
    };
    let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
        .unwrap()
}

/// Upstream repository with the given files committed, plus a `file://` URL.
pub struct UpstreamRepo {
    pub repo: Repository,
    pub url: String,
}

impl UpstreamRepo {
    pub fn create(dir: &Path, files: &[(&str, &str)]) -> Self {
        let repo = Repository::init(dir).unwrap();
        write_files(dir, files);
        commit_all(&repo, "initial import");
        Self {
            repo,
            url: format!("file://{}", dir.display()),
        }
    }

    pub fn head(&self) -> String {
        self.repo.head().unwrap().target().unwrap().to_string()
    }
}

pub fn write_files(dir: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }
}

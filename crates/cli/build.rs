use std::env;
use std::path::PathBuf;
use std::process::Command;

/// Trimmed stdout of a git command run at the workspace root.
fn git(root: &PathBuf, args: &[&str]) -> Option<String> {
    let output = Command::new("git").current_dir(root).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn main() {
    let manifest = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_default());
    let root = manifest.join("../..");

    // `cdmload --version` prints "<version> (<commit>)"; a trailing + marks
    // a build from a dirty tree
    let git_dir = root.join(".git");
    for watched in ["HEAD", "index", "refs/heads"] {
        println!("cargo:rerun-if-changed={}", git_dir.join(watched).display());
    }
    let commit = git(&root, &["describe", "--always", "--dirty=+", "--abbrev=7"])
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=GIT_COMMIT_HASH={commit}");

    println!(
        "cargo:rustc-env=TARGET={}",
        env::var("TARGET").unwrap_or_else(|_| "unknown".to_string())
    );
}

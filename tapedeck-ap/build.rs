//! Stamps the `/health` response with the commit, build time and profile

use std::process::Command;

fn git_short_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|hash| hash.trim().to_string())
}

fn main() {
    let built_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

    println!(
        "cargo:rustc-env=TAPEDECK_GIT_HASH={}",
        git_short_hash().unwrap_or_else(|| "unknown".to_string())
    );
    println!("cargo:rustc-env=TAPEDECK_BUILT_AT={}", built_at);
    println!(
        "cargo:rustc-env=TAPEDECK_BUILD_PROFILE={}",
        std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string())
    );
}

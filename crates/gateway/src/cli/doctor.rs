use rosterwatch_domain::config::{Config, ConfigSeverity};
use rosterwatch_store::transport::github::GithubTransport;
use rosterwatch_store::ContentStoreTransport;

/// Run all diagnostic checks and print a summary.
///
/// Returns `Ok(true)` when every check passes, `Ok(false)` when at least
/// one check failed.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("rosterwatch doctor");
    println!("===================\n");

    let mut all_passed = true;

    check_config_file(config_path, &mut all_passed);
    check_config_validation(config, &mut all_passed);
    check_github_token(&mut all_passed);
    check_store_reachable(config, &mut all_passed).await;

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists {
            config_path.to_owned()
        } else {
            format!("{config_path} not found (using defaults)")
        },
    );
    if !exists {
        *all_passed = false;
    }
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check(
            "Config validation",
            error_count == 0,
            format!("{} issue(s) ({error_count} error(s))", issues.len()),
        );
        for issue in &issues {
            println!("      {issue}");
        }
        if error_count > 0 {
            *all_passed = false;
        }
    }
}

fn check_github_token(all_passed: &mut bool) {
    let set = std::env::var("GITHUB_TOKEN").map(|t| !t.is_empty()).unwrap_or(false);
    print_check(
        "GITHUB_TOKEN set",
        set,
        if set { "present".into() } else { "missing".into() },
    );
    if !set {
        *all_passed = false;
    }
}

async fn check_store_reachable(config: &Config, all_passed: &mut bool) {
    let token = std::env::var("GITHUB_TOKEN").unwrap_or_default();
    if token.is_empty() {
        print_check("Store reachable", false, "skipped (no GITHUB_TOKEN)".into());
        *all_passed = false;
        return;
    }

    let transport = match GithubTransport::new(&config.github, token) {
        Ok(t) => t,
        Err(e) => {
            print_check("Store reachable", false, format!("transport init failed: {e}"));
            *all_passed = false;
            return;
        }
    };

    match transport.get().await {
        Ok(_) => print_check("Store reachable", true, config.github.document_path()),
        Err(e) => {
            print_check("Store reachable", false, format!("{e}"));
            *all_passed = false;
        }
    }
}

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}

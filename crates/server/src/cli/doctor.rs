use logsentry_core::config::{Config, ConfigSeverity};

/// Run all diagnostic checks and print a summary.
///
/// Returns `Ok(true)` when every check passes, `Ok(false)` when at least
/// one check failed.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("logsentry doctor");
    println!("=================\n");

    let mut all_passed = true;

    check_config_file(config_path);
    check_config_validation(config, &mut all_passed);
    check_writable("Data directory", &config.server.data_path, &mut all_passed);
    check_writable("Spool directory", &config.spool.path, &mut all_passed);
    check_pepper_env(&config.admin.pepper_env);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

fn check_config_file(config_path: &str) {
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
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();

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
    }

    if error_count > 0 {
        *all_passed = false;
    }
}

fn check_writable(name: &str, path: &std::path::Path, all_passed: &mut bool) {
    if let Err(e) = std::fs::create_dir_all(path) {
        print_check(name, false, format!("{} ({e})", path.display()));
        *all_passed = false;
        return;
    }

    let probe = path.join(".logsentry_doctor_probe");
    let writable = std::fs::write(&probe, b"probe").is_ok();
    let _ = std::fs::remove_file(&probe);

    print_check(
        name,
        writable,
        if writable {
            format!("{} (writable)", path.display())
        } else {
            format!("{} (not writable)", path.display())
        },
    );
    if !writable {
        *all_passed = false;
    }
}

/// Missing pepper is a warning in `Config::validate`, not a hard failure
/// here — this check exists just to surface it without re-reading
/// `validate()`'s output.
fn check_pepper_env(env_var: &str) {
    let set = std::env::var(env_var).is_ok_and(|v| !v.is_empty());
    print_check(
        "API key pepper configured",
        set,
        if set {
            format!("{env_var} is set")
        } else {
            format!("{env_var} is unset — an ephemeral pepper will be used (development only)")
        },
    );
}

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}

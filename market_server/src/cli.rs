use std::{env, env::VarError};

/// There's no real CLI for the server. Any argument prints the help text and the current configuration.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Keys, tokens and webhook secrets are deliberately absent from this list
    const DISPLAY_ENVS: [&str; 14] = [
        "RUST_LOG",
        "MKT_HOST",
        "MKT_PORT",
        "MKT_DATABASE_URL",
        "MKT_DATABASE_MAX_CONNECTIONS",
        "MKT_PLATFORM_USER_ID",
        "MKT_PUBLIC_URL",
        "MKT_FEE_FALLBACK_PERCENTAGE",
        "MKT_FEE_MINIMUM",
        "MKT_FEE_PROCESSOR_PERCENTAGE",
        "MKT_MP_API_URL",
        "MKT_MP_CURRENCY",
        "MKT_MP_TIMEOUT_SECS",
        "MKT_MP_SIGNATURE_CHECKS",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}

//! Thin console controller.
//!
//! Renders menus and relays input; every decision about who may do what
//! stays in the core. The controller only ever holds the opaque session
//! token and asks the registry to act on it.

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::Result;
use crossterm::style::Stylize;

use helmdeck_core::auth::{Session, SessionAuthenticator};
use helmdeck_core::modules::ModuleReport;
use helmdeck_core::registry::{Capability, HostCapabilities, ModuleRegistry};
use helmdeck_core::Error;

pub async fn run(auth: Arc<SessionAuthenticator>, registry: ModuleRegistry) -> Result<()> {
    print_banner();

    let Some(mut session) = login(&auth)? else {
        return Ok(());
    };

    loop {
        auth.prune();

        let available = registry.list_available(&session);
        println!();
        if available.is_empty() {
            println!("{}", "no modules available for this session".yellow());
        } else {
            for descriptor in &available {
                println!(
                    "  {} {}",
                    format!("({})", descriptor.id).cyan().bold(),
                    descriptor.display_name
                );
            }
        }
        println!(
            "  {} reload module   {} status table   {} quit",
            "(r <id>)".dark_grey(),
            "(t)".dark_grey(),
            "(q)".dark_grey()
        );

        let Some(input) = prompt("select")? else {
            break;
        };
        let input = input.trim().to_string();
        if input.is_empty() {
            continue;
        }

        match input.to_lowercase().as_str() {
            "q" => break,
            "t" => {
                print_status_table(&registry);
                continue;
            }
            _ => {}
        }

        if let Some(id) = input.strip_prefix("r ").or_else(|| input.strip_prefix("R ")) {
            match registry.reload(id.trim()) {
                Ok(status) => println!("{} {}", "reloaded:".green(), status),
                Err(e) => println!("{} {e}", "reload failed:".red()),
            }
            continue;
        }

        let id = input.to_uppercase();
        match registry.invoke(&id, &session).await {
            Ok(report) => print_report(&report),
            Err(Error::Authentication) => {
                println!("{}", "session expired, please log in again".yellow());
                match login(&auth)? {
                    Some(fresh) => session = fresh,
                    None => break,
                }
            }
            Err(Error::Authorization { required, held }) => {
                println!(
                    "{} requires {} privilege, this session holds {}",
                    "not allowed:".red(),
                    required,
                    held
                );
            }
            Err(Error::ModuleExecution { module, reason }) => {
                println!("{} module '{module}': {reason}", "failed:".red());
            }
            Err(e) => return Err(e.into()),
        }
    }

    auth.revoke(&session);
    println!("{}", "logged out".dark_grey());
    Ok(())
}

fn login(auth: &SessionAuthenticator) -> Result<Option<Session>> {
    let source = login_source();

    loop {
        let status = auth.lockout_status(&source);
        if let Some(remaining) = status.locked_remaining {
            println!(
                "{} locked out, retry in {}s",
                "!".red().bold(),
                remaining.as_secs()
            );
        }

        let Some(key) = prompt("operator key")? else {
            return Ok(None);
        };
        if key.trim().is_empty() {
            continue;
        }

        match auth.authenticate(&key, &source) {
            Ok(session) => {
                println!(
                    "{} {} ({}, until {})",
                    "welcome".green().bold(),
                    session.identity.clone().bold(),
                    session.privilege,
                    session.expires_at.format("%H:%M:%S")
                );
                return Ok(Some(session));
            }
            Err(Error::RateLimited { remaining }) => {
                println!(
                    "{} too many failed attempts, retry in {}s",
                    "!".red().bold(),
                    remaining.as_secs()
                );
            }
            Err(Error::Authentication) => {
                println!("{}", "key not recognized".red());
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Bucket key for the attempt ledger: the local user running the console.
fn login_source() -> String {
    std::env::var("USER").unwrap_or_else(|_| "local".to_string())
}

fn print_banner() {
    println!();
    println!(
        "{} {}",
        "Helmdeck".cyan().bold(),
        "server administration console".dark_grey()
    );
}

fn print_report(report: &ModuleReport) {
    println!();
    for line in &report.lines {
        println!("  {line}");
    }
    for warning in &report.warnings {
        println!("  {} {}", "!".yellow().bold(), warning.clone().yellow());
    }
}

pub fn print_status_table(registry: &ModuleRegistry) {
    println!();
    println!(
        "  {:<4} {:<20} {:<10} {}",
        "id".bold(),
        "module".bold(),
        "privilege".bold(),
        "status".bold()
    );
    for descriptor in registry.status_table() {
        let status = descriptor.status.to_string();
        let styled = match descriptor.status.label() {
            "loaded" => status.green(),
            "disabled" => status.dark_grey(),
            "deps-missing" | "load-failed" => status.red(),
            _ => status.yellow(),
        };
        println!(
            "  {:<4} {:<20} {:<10} {}",
            descriptor.id,
            descriptor.display_name,
            descriptor.min_privilege.to_string(),
            styled
        );
    }
}

pub fn print_self_check(host: &HostCapabilities, registry: &ModuleRegistry) {
    println!();
    println!("{}", "capabilities".bold());
    for capability in Capability::all() {
        let mark = if host.supports(capability) {
            "ok".green()
        } else {
            "absent".red()
        };
        println!("  {:<16} {}", capability.as_str(), mark);
    }
    print_status_table(registry);
}

fn prompt(label: &str) -> Result<Option<String>> {
    print!("{} ", format!("{label}>").bold());
    std::io::stdout().flush()?;

    let mut line = String::new();
    let read = std::io::stdin().lock().read_line(&mut line)?;
    if read == 0 {
        // EOF (ctrl-d)
        println!();
        return Ok(None);
    }
    Ok(Some(line.trim_end().to_string()))
}

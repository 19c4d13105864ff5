use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use remote_exec::{process::run_to_completion, Command, LocalLauncher, StreamKind};

#[derive(Args)]
pub struct CiArgs {
    #[command(subcommand)]
    cmd: CiCommand,
}

#[derive(Subcommand)]
pub enum CiCommand {
    /// Run all CI checks
    All,
    /// Format check (read-only)
    #[command(name = "fmt-check")]
    FmtCheck,
    /// Clippy lints
    Clippy,
    /// Run unit tests only (no features)
    UnitTests,
    /// Run unit and integration tests (no live ssh)
    IntegrationTests,
}

pub async fn run(args: CiArgs) -> Result<()> {
    match args.cmd {
        CiCommand::All => run_all().await,
        CiCommand::FmtCheck => run_fmt().await,
        CiCommand::Clippy => run_clippy().await,
        CiCommand::UnitTests => run_unit_tests().await,
        CiCommand::IntegrationTests => run_integration_tests().await,
    }
}

async fn run_all() -> Result<()> {
    println!("Running all CI checks\n");

    println!("Checking code formatting...");
    run_fmt().await?;
    println!("Format check passed\n");

    println!("Running clippy lints...");
    run_clippy().await?;
    println!("Clippy check passed\n");

    println!("Running unit tests (no features)...");
    run_unit_tests().await?;
    println!("Unit tests passed\n");

    println!("Running integration tests...");
    run_integration_tests().await?;
    println!("Integration tests passed\n");

    println!("All CI checks passed!");
    Ok(())
}

async fn run_fmt() -> Result<()> {
    if !run_cargo(&["fmt", "--all", "--", "--check"], &[]).await? {
        bail!("Format check failed. Run 'cargo fmt --all' to fix.");
    }
    Ok(())
}

async fn run_clippy() -> Result<()> {
    let success = run_cargo(
        &[
            "clippy",
            "--workspace",
            "--all-targets",
            "--all-features",
            "--",
            "-D",
            "warnings",
        ],
        &[],
    )
    .await?;
    if !success {
        bail!("Clippy check failed");
    }
    Ok(())
}

async fn run_unit_tests() -> Result<()> {
    if !run_cargo(&["test", "--workspace", "--lib", "--bins"], &[]).await? {
        bail!("Unit tests failed");
    }
    Ok(())
}

async fn run_integration_tests() -> Result<()> {
    // Live ssh tests stay behind the ssh-tests feature
    if !run_cargo(&["test", "--workspace", "--", "--nocapture"], &[]).await? {
        bail!("Integration tests failed");
    }
    Ok(())
}

/// Run cargo, echoing its output, and report whether it succeeded
pub async fn run_cargo(args: &[&str], env: &[(&str, &str)]) -> Result<bool> {
    run_cargo_with(args, env, |_| {}).await
}

/// Like [`run_cargo`], also handing every line to `on_line`
pub async fn run_cargo_with<F>(args: &[&str], env: &[(&str, &str)], mut on_line: F) -> Result<bool>
where
    F: FnMut(&str) + Send,
{
    let mut cmd = Command::builder("cargo").args(args).build();
    for (key, value) in env {
        cmd.env(key, value);
    }

    let output = run_to_completion(&LocalLauncher, cmd, None, |stream, line| {
        match stream {
            StreamKind::Stdout => println!("{line}"),
            StreamKind::Stderr => eprintln!("{line}"),
        }
        on_line(line);
    })
    .await?;

    Ok(output.status.success())
}

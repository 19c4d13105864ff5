use anyhow::{bail, Result};
use clap::Args;

#[derive(Args)]
pub struct TestArgs {
    /// Package to test
    #[arg(short, long)]
    package: Option<String>,

    /// Features to enable
    #[arg(short, long)]
    features: Option<String>,

    /// Run the live ssh tests against this host (`user@host:port`)
    #[arg(long)]
    ssh_host: Option<String>,

    /// Test name filter
    filter: Option<String>,
}

pub async fn run(args: TestArgs) -> Result<()> {
    println!("Running tests\n");

    let mut cmd_args = vec!["test"];

    if let Some(package) = &args.package {
        cmd_args.push("-p");
        cmd_args.push(package);
    } else {
        cmd_args.push("--workspace");
    }

    let mut features: Vec<&str> = args.features.as_deref().into_iter().collect();
    if args.ssh_host.is_some() {
        features.push("remote-exec/ssh-tests");
    }
    let features = features.join(",");
    if !features.is_empty() {
        cmd_args.push("--features");
        cmd_args.push(&features);
    }

    cmd_args.push("--");
    if let Some(filter) = &args.filter {
        cmd_args.push(filter);
    }
    cmd_args.push("--nocapture");

    let mut env = Vec::new();
    if let Some(host) = &args.ssh_host {
        env.push(("REMOTE_EXEC_TEST_HOST", host.as_str()));
    }

    println!("Command: cargo {}", cmd_args.join(" "));
    if let Some(host) = &args.ssh_host {
        println!("Live ssh host: {host}");
    }
    println!();

    let mut summary = TestSummary::default();
    let success = crate::ci::run_cargo_with(&cmd_args, &env, |line| summary.parse_line(line)).await?;

    println!("\n{summary}");

    if !success || summary.failed > 0 {
        bail!("Tests failed");
    }

    Ok(())
}

#[derive(Default)]
struct TestSummary {
    total: usize,
    passed: usize,
    failed: usize,
    ignored: usize,
}

impl TestSummary {
    fn parse_line(&mut self, line: &str) {
        if line.contains(" test") && line.contains(" ... ") {
            self.total += 1;
            if line.contains(" ... ok") {
                self.passed += 1;
            } else if line.contains(" ... FAILED") {
                self.failed += 1;
            } else if line.contains(" ... ignored") {
                self.ignored += 1;
            }
        }
    }
}

impl std::fmt::Display for TestSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.total > 0 {
            write!(
                f,
                "Test Summary: {} total, {} passed, {} failed, {} ignored",
                self.total, self.passed, self.failed, self.ignored
            )
        } else {
            write!(f, "No test results captured")
        }
    }
}

// src/exec/command.rs

//! Shell-command job bodies.

use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

/// Build a job body that runs `cmd` through the platform shell.
///
/// - stdout is inherited, so job output goes straight to the terminal;
/// - stderr is captured and logged at debug level, line by line;
/// - a non-zero exit status is reported as an error, which fails the job.
pub fn shell_task(name: String, cmd: String) -> impl FnOnce() -> Result<()> + Send + 'static {
    move || run_command(&name, &cmd)
}

fn run_command(name: &str, cmd: &str) -> Result<()> {
    info!(job = %name, cmd = %cmd, "starting job process");

    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    let output = command
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped())
        .output()
        .with_context(|| format!("spawning process for job '{name}'"))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    for line in stderr.lines() {
        debug!(job = %name, "stderr: {}", line);
    }

    let code = output.status.code().unwrap_or(-1);
    info!(
        job = %name,
        exit_code = code,
        success = output.status.success(),
        "job process exited"
    );

    if !output.status.success() {
        match stderr.lines().last() {
            Some(last) => bail!("job '{name}' exited with code {code}: {last}"),
            None => bail!("job '{name}' exited with code {code}"),
        }
    }

    Ok(())
}

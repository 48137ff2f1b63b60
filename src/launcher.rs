use std::process::{Command, ExitStatus};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::{environment::ChildEnvironment, error::Error};

/// Run `command` with `environment` applied and wait for it to finish.
///
/// Returns the child's exit code. On Unix a child killed by a signal maps to
/// `128 + signal`, the same convention shells use.
pub fn run(command: &[String], environment: &ChildEnvironment) -> Result<i32> {
    let (program, args) = command.split_first().ok_or(Error::NoCommand)?;

    info!("Running {}", program);
    debug!("Arguments: {:?}", args);

    let mut child = Command::new(program);
    child.args(args);
    environment.apply(&mut child);

    let status = child
        .status()
        .with_context(|| format!("Failed to execute {program}"))?;

    let code = exit_code(status);
    debug!("{} exited with code {}", program, code);
    Ok(code)
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

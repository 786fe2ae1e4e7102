use std::process::Command;

/// Runs a shell command and waits for completion
///
/// The command string is executed via `sh -c`. Returns an error if the
/// command fails to execute or returns a non-zero exit status.
pub fn run(cmd: &str) -> Result<(), Box<dyn std::error::Error>> {
    let status = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .status()
        .map_err(|e| format!("Failed to execute command: {}", e))?;

    if !status.success() {
        return Err(format!("Command failed with exit code: {:?}", status.code()).into());
    }

    Ok(())
}

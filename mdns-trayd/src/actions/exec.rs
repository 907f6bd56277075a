use tokio::process::Command;

/// A command to launch without waiting for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// Run through `sh -c`
    Shell(String),
    /// Run a program directly with literal arguments
    Program { program: String, args: Vec<String> },
}

/// Launches external commands. Implementations must not block the caller.
pub trait Executor: Send {
    fn spawn(&self, command: CommandLine);
}

/// Spawns commands on the tokio runtime and logs how they end.
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor;

impl Executor for ShellExecutor {
    fn spawn(&self, command: CommandLine) {
        tracing::debug!("Executing: {:?}", command);

        let mut process = match &command {
            CommandLine::Shell(line) => {
                let mut process = Command::new("sh");
                process.arg("-c").arg(line);
                process
            }
            CommandLine::Program { program, args } => {
                let mut process = Command::new(program);
                process.args(args);
                process
            }
        };

        let mut child = match process.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!("Failed to spawn {:?}: {}", command, e);
                return;
            }
        };

        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {
                    tracing::debug!("Command {:?} finished", command);
                }
                Ok(status) => {
                    tracing::warn!("Command {:?} exited with {}", command, status);
                }
                Err(e) => {
                    tracing::warn!("Failed to wait for {:?}: {}", command, e);
                }
            }
        });
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Executor that records what it was asked to run
    #[derive(Clone, Default)]
    pub(crate) struct RecordingExecutor {
        pub commands: Arc<Mutex<Vec<CommandLine>>>,
    }

    impl RecordingExecutor {
        pub fn take(&self) -> Vec<CommandLine> {
            std::mem::take(&mut *self.commands.lock().unwrap())
        }
    }

    impl Executor for RecordingExecutor {
        fn spawn(&self, command: CommandLine) {
            self.commands.lock().unwrap().push(command);
        }
    }

    #[tokio::test]
    async fn test_shell_executor_does_not_block_on_long_commands() {
        let started = std::time::Instant::now();
        ShellExecutor.spawn(CommandLine::Shell("sleep 5".to_string()));
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_shell_executor_survives_missing_program() {
        ShellExecutor.spawn(CommandLine::Program {
            program: "/nonexistent/mdns-trayd-test".to_string(),
            args: Vec::new(),
        });
    }
}

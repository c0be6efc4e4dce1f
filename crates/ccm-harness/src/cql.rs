//! Keyspace bootstrap through `cqlsh`.

use crate::runner::{CommandRunner, OutputMode, ShellCommand};
use crate::{Error, Result};
use tracing::info;

/// Replication used when none is given; one replica per default node.
pub const DEFAULT_REPLICATION: &str = "{'class': 'SimpleStrategy', 'replication_factor': 3}";

/// A keyspace to create before tests run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyspace {
    pub name: String,
    pub replication: String,
    /// Drop any existing keyspace of the same name first.
    pub drop_existing: bool,
}

impl Keyspace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            replication: DEFAULT_REPLICATION.to_string(),
            drop_existing: false,
        }
    }

    pub fn with_replication(mut self, replication: impl Into<String>) -> Self {
        self.replication = replication.into();
        self
    }

    pub fn dropping_existing(mut self) -> Self {
        self.drop_existing = true;
        self
    }

    /// CQL statements, in execution order.
    pub fn statements(&self) -> Vec<String> {
        let mut statements = Vec::with_capacity(2);
        if self.drop_existing {
            statements.push(format!("DROP KEYSPACE {};", self.name));
        }
        statements.push(format!(
            "CREATE KEYSPACE {} WITH replication = {};",
            self.name, self.replication
        ));
        statements
    }
}

/// Runs CQL against one node with the `cqlsh` tool.
#[derive(Debug, Clone)]
pub struct Cqlsh {
    binary: String,
    host: String,
    port: u16,
}

impl Cqlsh {
    pub fn new(binary: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            binary: binary.into(),
            host: host.into(),
            port,
        }
    }

    /// `cqlsh <host> <port> -e '<statement>'`.
    ///
    /// The statement is passed to the shell verbatim: no expansion of `$`,
    /// backticks or backslashes.
    pub fn command(&self, statement: &str) -> ShellCommand {
        ShellCommand::new(format!(
            "{} {} {} -e {}",
            self.binary,
            self.host,
            self.port,
            single_quoted(statement)
        ))
    }

    /// Executes one statement.
    pub async fn execute<R: CommandRunner>(&self, runner: &R, statement: &str) -> Result<()> {
        let output = runner
            .run(&self.command(statement), OutputMode::Captured)
            .await?;
        if !output.success() {
            return Err(Error::CqlFailed {
                code: output.code,
                stderr: output.stderr,
            });
        }
        Ok(())
    }

    /// Creates `keyspace`. A keyspace that already exists is not an error.
    pub async fn create_keyspace<R: CommandRunner>(
        &self,
        runner: &R,
        keyspace: &Keyspace,
    ) -> Result<()> {
        let mut statements = keyspace.statements();
        let Some(create) = statements.pop() else {
            return Ok(());
        };

        for statement in &statements {
            self.execute(runner, statement).await?;
        }

        match self.execute(runner, &create).await {
            Err(Error::CqlFailed { stderr, .. }) if is_already_exists(&stderr) => {
                info!(keyspace = %keyspace.name, "Keyspace already exists");
                Ok(())
            }
            result => result,
        }
    }
}

/// Quotes `value` as one `sh` word; embedded `'` become `'\''`.
fn single_quoted(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn is_already_exists(stderr: &str) -> bool {
    stderr.contains("AlreadyExists") || stderr.to_ascii_lowercase().contains("already exists")
}

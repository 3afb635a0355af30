// src/utils/command.rs: Validated, immutable command lines for the runner

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::defs::RunnerError;
use crate::utils::text::shell_quote;

/// An argv list plus the working directory and environment overlay it will
/// be spawned with. Immutable once built; the runner treats every token as
/// opaque and never re-splits or re-quotes it.
#[derive(Debug, Clone)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
    cwd: PathBuf,
    env: HashMap<String, String>,
}

impl CommandLine {
    pub fn builder(program: impl Into<String>) -> CommandLineBuilder {
        CommandLineBuilder {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: HashMap::new(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Entries overlaid on top of the inherited environment at spawn time.
    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

pub struct CommandLineBuilder {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    env: HashMap<String, String>,
}

impl CommandLineBuilder {
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs(mut self, vars: &HashMap<String, String>) -> Self {
        self.env
            .extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Validates and freezes the command line.
    ///
    /// The program must be non-empty and the working directory (current
    /// directory when unset) must exist, so that spawn failures surface
    /// here rather than deep inside the runner.
    pub fn build(self) -> Result<CommandLine, RunnerError> {
        if self.program.trim().is_empty() {
            return Err(RunnerError::InvalidCommand("empty program name".into()));
        }
        let cwd = match self.cwd {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        if !cwd.is_dir() {
            return Err(RunnerError::InvalidCommand(format!(
                "working directory does not exist: {}",
                cwd.display()
            )));
        }
        Ok(CommandLine {
            program: self.program,
            args: self.args,
            cwd,
            env: self.env,
        })
    }
}

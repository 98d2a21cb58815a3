//! Program + argument vectors handed to the OS.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::PathBuf;
use std::process::Command;

/// A program path and its arguments, consumed by the process-creation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInvocation {
    pub program: PathBuf,
    /// Value presented as `argv[0]`; defaults to `program`.
    pub arg0: Option<OsString>,
    /// Arguments after `argv[0]`.
    pub args: Vec<OsString>,
    pub workdir: Option<PathBuf>,
}

impl ProcessInvocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            arg0: None,
            args: Vec::new(),
            workdir: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    /// Re-invocation of `program` with a full argument vector as received by `main`.
    ///
    /// `argv[0]` is kept as `arg0`, the rest become `args`.
    pub fn from_argv<I>(program: impl Into<PathBuf>, argv: I) -> Self
    where
        I: IntoIterator<Item = OsString>,
    {
        let mut argv = argv.into_iter();
        Self {
            program: program.into(),
            arg0: argv.next(),
            args: argv.collect(),
            workdir: None,
        }
    }

    /// The running supervisor: `current_exe()` with the process's own arguments.
    pub fn current() -> io::Result<Self> {
        let exe = std::env::current_exe()?;
        Ok(Self::from_argv(exe, std::env::args_os()))
    }

    pub fn into_command(self) -> Command {
        let mut cmd = Command::new(&self.program);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            if let Some(arg0) = &self.arg0 {
                cmd.arg0(arg0);
            }
        }
        cmd.args(&self.args);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_argv_splits_arg0() {
        let inv = ProcessInvocation::from_argv(
            "/usr/local/bin/supervisor",
            ["supervisor", "run", "--miner-type", "simple"].map(OsString::from),
        );
        assert_eq!(inv.arg0, Some(OsString::from("supervisor")));
        assert_eq!(inv.args, ["run", "--miner-type", "simple"].map(OsString::from));
    }

    #[test]
    fn builder_appends_args_in_order() {
        let inv = ProcessInvocation::new("python3")
            .arg("neurons/miner.py")
            .args(["--miner_type", "loss"])
            .workdir("/srv/miner");
        assert_eq!(
            inv.args,
            ["neurons/miner.py", "--miner_type", "loss"].map(OsString::from)
        );
        assert_eq!(inv.workdir, Some(PathBuf::from("/srv/miner")));
    }

    #[test]
    fn into_command_keeps_program_and_args() {
        let cmd = ProcessInvocation::new("python3")
            .arg("neurons/miner.py")
            .into_command();
        assert_eq!(cmd.get_program(), "python3");
        let args: Vec<&OsStr> = cmd.get_args().collect();
        assert_eq!(args, [OsStr::new("neurons/miner.py")]);
    }
}

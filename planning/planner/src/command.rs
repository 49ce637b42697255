//! Command lines of the planner driver.

use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

use crate::config::DownwardConfig;

/// Files exchanged with the planner.
#[derive(Clone, Copy, Debug)]
pub struct Files<'a> {
    pub domain: &'a Path,
    pub problem: &'a Path,
    pub plan: &'a Path,
}

fn base_arguments(config: &DownwardConfig, files: Files) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["--plan-file".into(), files.plan.into()];
    if let Some(limit) = &config.search_time_limit {
        args.push("--search-time-limit".into());
        args.push(limit.into());
    }
    args.push("--log-level".into());
    args.push(config.log_level.to_string().into());
    args
}

fn arguments(config: &DownwardConfig, alias: Option<&str>, search: Option<&str>, files: Files) -> Vec<OsString> {
    let mut args = base_arguments(config, files);
    if let Some(alias) = alias {
        args.push("--alias".into());
        args.push(alias.into());
    }
    args.push(files.domain.into());
    args.push(files.problem.into());
    if !config.translate_options.is_empty() {
        args.push("--translate-options".into());
        args.extend(config.translate_options.iter().map(OsString::from));
    }
    if let Some(search) = search {
        args.push("--search-options".into());
        args.push("--search".into());
        args.extend(search.split_whitespace().map(OsString::from));
    }
    args
}

fn build(config: &DownwardConfig, args: Vec<OsString>) -> Command {
    let mut cmd = match &config.interpreter {
        Some(interpreter) => {
            let mut cmd = Command::new(interpreter);
            cmd.arg(&config.executable);
            cmd
        }
        None => Command::new(&config.executable),
    };
    cmd.args(args);
    cmd
}

/// Command of a single run of the planner.
pub fn command(config: &DownwardConfig, files: Files) -> Command {
    let args = arguments(config, config.alias.as_deref(), config.search_config.as_deref(), files);
    build(config, args)
}

/// Command of an anytime run, reporting every improving plan on its output.
pub fn anytime_command(config: &DownwardConfig, files: Files) -> Command {
    let args = arguments(
        config,
        config.anytime_alias.as_deref(),
        config.anytime_search_config.as_deref(),
        files,
    );
    build(config, args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    fn args(cmd: &Command) -> Vec<String> {
        cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    fn files() -> Files<'static> {
        Files {
            domain: Path::new("d.pddl"),
            problem: Path::new("p.pddl"),
            plan: Path::new("plan"),
        }
    }

    #[test]
    fn alias_command() {
        let mut config = DownwardConfig::satisficing();
        config.executable = "fd".into();
        let cmd = command(&config, files());
        assert_eq!(cmd.get_program(), "fd");
        assert_eq!(
            args(&cmd),
            ["--plan-file", "plan", "--log-level", "info", "--alias", "lama-first", "d.pddl", "p.pddl"]
        );

        let cmd = anytime_command(&config, files());
        assert_eq!(
            args(&cmd),
            ["--plan-file", "plan", "--log-level", "info", "--alias", "seq-sat-lama-2011", "d.pddl", "p.pddl"]
        );
    }

    #[test]
    fn search_command() {
        let mut config = DownwardConfig::optimal();
        config.executable = "fast-downward.py".into();
        config.interpreter = Some("python3".into());
        config.search_time_limit = Some("30s".to_string());
        config.log_level = LogLevel::Warning;
        config.translate_options = vec!["--keep-unimportant-variables".to_string()];
        config.search_config = Some("astar(lmcut(), bound=10)  ".to_string());
        assert_eq!(
            args(&command(&config, files())),
            [
                "fast-downward.py",
                "--plan-file",
                "plan",
                "--search-time-limit",
                "30s",
                "--log-level",
                "warning",
                "d.pddl",
                "p.pddl",
                "--translate-options",
                "--keep-unimportant-variables",
                "--search-options",
                "--search",
                "astar(lmcut(),",
                "bound=10)",
            ]
        );
    }
}

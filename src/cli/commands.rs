use crate::host::HostPlatform;
use clap::Parser;
use std::path::PathBuf;

/// Staged, profile-guided clang toolchain build with per-host packaging
#[derive(Parser, Debug)]
#[command(
    name = "clang-build",
    about = "Staged, profile-guided clang toolchain build with per-host packaging",
    version,
    long_about = "clang-build drives the stage1 and stage2 clang builds for every Android \
                  target product, optionally trains and applies a PGO profile, then installs \
                  and archives one toolchain per host.\n\n\
                  Examples:\n  \
                  clang-build --build-name r300080\n  \
                  clang-build --multi-stage --pgo-clang -j 32\n  \
                  clang-build --dry-run --emit-plan plan.json --host darwin"
)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "NAME",
        help = "Release name; packages are named clang-<NAME> (default: dev)"
    )]
    pub build_name: Option<String>,

    #[arg(
        short = 'j',
        long,
        value_name = "N",
        help = "Parallel jobs for each sub-build (default: CPU count)"
    )]
    pub jobs: Option<usize>,

    #[arg(long, help = "Log every action without performing it")]
    pub dry_run: bool,

    #[arg(
        long,
        value_name = "FILE",
        requires = "dry_run",
        help = "Write the recorded actions of a dry run as JSON"
    )]
    pub emit_plan: Option<PathBuf>,

    #[arg(long, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(long, help = "Emit logs as JSON")]
    pub log_json: bool,

    #[arg(short = 'v', long, help = "Debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,

    #[arg(long, help = "Reuse an existing stage1 install instead of creating it")]
    pub skip_stage1_install: bool,

    #[arg(long, overrides_with = "no_multi_stage", help = "Build stage2 with the stage1 compiler")]
    pub multi_stage: bool,

    #[arg(long, overrides_with = "multi_stage", hide = true)]
    pub no_multi_stage: bool,

    #[arg(
        long,
        overrides_with = "no_build_all_llvm_tools",
        help = "Build every LLVM tool in the final stage (default)"
    )]
    pub build_all_llvm_tools: bool,

    #[arg(long, overrides_with = "build_all_llvm_tools", hide = true)]
    pub no_build_all_llvm_tools: bool,

    #[arg(long, overrides_with = "no_debug_clang", help = "Build clang with debug info")]
    pub debug_clang: bool,

    #[arg(long, overrides_with = "debug_clang", hide = true)]
    pub no_debug_clang: bool,

    #[arg(
        long,
        overrides_with = "no_pgo_clang",
        help = "Optimize stage2 with a profile gathered from an instrumented build"
    )]
    pub pgo_clang: bool,

    #[arg(long, overrides_with = "pgo_clang", hide = true)]
    pub no_pgo_clang: bool,

    #[arg(
        long,
        value_name = "FILE",
        help = "Merged profile to optimize stage2 with, instead of gathering one"
    )]
    pub pgo_profile: Option<PathBuf>,

    #[arg(
        long = "host",
        value_name = "HOST",
        value_parser = parse_host,
        help = "Host to install and package for (repeatable; default: derived from the build machine)"
    )]
    pub hosts: Vec<HostPlatform>,

    #[arg(long, value_name = "FILE", help = "TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, value_name = "DIR", help = "Root of the source tree (default: .)")]
    pub source_root: Option<PathBuf>,
}

impl CliArgs {
    pub fn multi_stage(&self) -> Option<bool> {
        toggle(self.multi_stage, self.no_multi_stage)
    }

    pub fn build_all_llvm_tools(&self) -> Option<bool> {
        toggle(self.build_all_llvm_tools, self.no_build_all_llvm_tools)
    }

    pub fn debug_clang(&self) -> Option<bool> {
        toggle(self.debug_clang, self.no_debug_clang)
    }

    pub fn pgo_clang(&self) -> Option<bool> {
        toggle(self.pgo_clang, self.no_pgo_clang)
    }
}

/// A `--flag`/`--no-flag` pair; `None` when neither was given.
fn toggle(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn parse_host(s: &str) -> Result<HostPlatform, String> {
    s.parse::<HostPlatform>().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_args_verify() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = CliArgs::parse_from(["clang-build"]);
        assert!(args.build_name.is_none());
        assert!(args.jobs.is_none());
        assert!(!args.dry_run);
        assert!(args.hosts.is_empty());
        assert_eq!(args.multi_stage(), None);
        assert_eq!(args.pgo_clang(), None);
    }

    #[test]
    fn test_last_toggle_wins() {
        let args = CliArgs::parse_from(["clang-build", "--multi-stage", "--no-multi-stage"]);
        assert_eq!(args.multi_stage(), Some(false));

        let args = CliArgs::parse_from(["clang-build", "--no-debug-clang", "--debug-clang"]);
        assert_eq!(args.debug_clang(), Some(true));
    }

    #[test]
    fn test_repeatable_hosts() {
        let args = CliArgs::parse_from(["clang-build", "--host", "linux", "--host", "windows-x86"]);
        assert_eq!(args.hosts, vec![HostPlatform::Linux, HostPlatform::Windows]);
    }

    #[test]
    fn test_unknown_host_rejected() {
        assert!(CliArgs::try_parse_from(["clang-build", "--host", "solaris"]).is_err());
    }

    #[test]
    fn test_emit_plan_requires_dry_run() {
        assert!(CliArgs::try_parse_from(["clang-build", "--emit-plan", "plan.json"]).is_err());
        let args =
            CliArgs::parse_from(["clang-build", "--dry-run", "--emit-plan", "plan.json"]);
        assert_eq!(args.emit_plan, Some(PathBuf::from("plan.json")));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(CliArgs::try_parse_from(["clang-build", "-q", "-v"]).is_err());
    }
}

//! End-to-end pipeline runs against an in-memory checkout

mod support;

use clang_build::exec::{Executor, MemoryExecutor};
use clang_build::progress::{ProgressEvent, ProgressHandler};
use clang_build::stage::products;
use clang_build::{BuildError, BuildPipeline, HostPlatform, PipelineOptions, PipelineState};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use support::{builds, out, workspace};

#[derive(Default)]
struct RecordingHandler {
    events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressHandler for RecordingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

impl RecordingHandler {
    fn skipped(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::StateSkipped { state, .. } => Some(state.clone()),
                _ => None,
            })
            .collect()
    }
}

fn product_names() -> Vec<String> {
    products().iter().map(|p| p.name.to_string()).collect()
}

#[test]
fn test_single_stage_packages_stage1() {
    let hosts = [HostPlatform::Linux];
    let (exec, config) = workspace(&hosts);
    let options = PipelineOptions::new()
        .with_build_name("r1")
        .with_hosts(hosts.to_vec());

    let report = BuildPipeline::new(&exec, &config, &options).run().unwrap();

    assert_eq!(
        report.states,
        vec![
            PipelineState::Stage1Build,
            PipelineState::PackagePerHost,
            PipelineState::Done
        ]
    );
    let built = builds(&exec);
    assert_eq!(
        built.iter().map(|(_, p)| p.clone()).collect::<Vec<_>>(),
        product_names()
    );
    assert!(built.iter().all(|(dir, _)| dir == &out("stage1")));

    assert_eq!(report.final_out_dir, out("stage1"));
    assert_eq!(report.packages.len(), 1);
    assert_eq!(
        report.packages[0].tarball_path,
        PathBuf::from("/dist/clang-r1-linux-x86.tar.bz2")
    );
    assert!(exec.is_file(&out("install/linux-x86/clang-r1/bin/clang.real")));
    assert!(exec.is_file(&out("install/linux-x86/clang-r1/AndroidVersion.txt")));
    assert!(!exec.exists(&out("stage1-install")));
}

#[test]
fn test_single_stage_builds_full_tool_set() {
    let hosts = [HostPlatform::Linux];
    let (exec, config) = workspace(&hosts);
    let options = PipelineOptions::new()
        .with_debug_clang(true)
        .with_hosts(hosts.to_vec());

    BuildPipeline::new(&exec, &config, &options).run().unwrap();

    let first = &exec.commands()[0];
    assert!(first.has_arg("clang-toolchain-full"));
    assert!(first.has_arg("llvm-tools"));
    assert_eq!(
        first.env.get("FORCE_BUILD_LLVM_DEBUG").map(String::as_str),
        Some("true")
    );
    // Debug builds ship unstripped on Linux.
    assert!(!exec.commands().iter().any(|c| c.program == "strip"));
}

#[test]
fn test_pgo_pipeline() {
    let hosts = [HostPlatform::Linux];
    let (exec, config) = workspace(&hosts);
    let options = PipelineOptions::new()
        .with_multi_stage(true)
        .with_pgo_clang(true)
        .with_jobs(4)
        .with_hosts(hosts.to_vec());
    let progress = RecordingHandler::default();

    let report = BuildPipeline::new(&exec, &config, &options)
        .with_progress(&progress)
        .run()
        .unwrap();

    assert_eq!(
        report.states,
        vec![
            PipelineState::Stage1Build,
            PipelineState::Stage1Install,
            PipelineState::PgoInstrument,
            PipelineState::PgoGenerate,
            PipelineState::PgoMerge,
            PipelineState::Stage2Build,
            PipelineState::PackagePerHost,
            PipelineState::Done,
        ]
    );
    assert!(progress.skipped().is_empty());

    let built = builds(&exec);
    let dirs: Vec<&Path> = built.iter().map(|(d, _)| d.as_path()).collect();
    assert_eq!(dirs.iter().filter(|d| **d == out("stage1")).count(), 6);
    assert_eq!(
        built
            .iter()
            .filter(|(d, _)| *d == out("stage2-instrumented") || *d == out("stage2-profiled"))
            .map(|(_, p)| p.as_str())
            .collect::<Vec<_>>(),
        vec!["aosp_arm64", "aosp_arm64"]
    );
    assert_eq!(dirs.iter().filter(|d| **d == out("stage2")).count(), 6);

    let merged = out("stage2-instrumented-install/linux-x86/clang-dev/clang.profile");
    let profile = report.profile.as_ref().unwrap();
    assert_eq!(profile.merged_path, merged);
    assert_eq!(
        profile.source_raw_profiles,
        vec![out("stage2-profiled/profiles/aosp_arm64.profraw")]
    );

    let merge = exec
        .commands()
        .into_iter()
        .find(|c| c.has_arg("merge"))
        .unwrap();
    assert_eq!(
        merge.program,
        out("stage1-install/linux-x86/clang-dev/bin/llvm-profdata")
            .display()
            .to_string()
    );

    let stage2 = exec
        .commands()
        .into_iter()
        .find(|c| support::out_dir_of(c) == Some(out("stage2")))
        .unwrap();
    assert!(stage2.has_arg(&format!("FORCE_BUILD_LLVM_PROFILE_USE={}", merged.display())));
    assert!(stage2.has_arg(&format!(
        "LLVM_PREBUILTS_BASE={}",
        out("stage1-install").display()
    )));
    assert!(stage2.has_arg("-j4"));

    assert_eq!(report.final_out_dir, out("stage2"));
    assert!(exec.is_file(&out("stage1-install/linux-x86/clang-dev/bin/clang")));
    assert!(exec.is_file(&out(
        "stage2-instrumented-install/linux-x86/clang-dev/bin/clang"
    )));
}

#[test]
fn test_generate_sees_only_fresh_profiles() {
    let hosts = [HostPlatform::Linux];
    let (exec, config) = workspace(&hosts);
    exec.add_file(out("stage2-profiled/profiles/stale.profraw"), "old");
    let options = PipelineOptions::new()
        .with_multi_stage(true)
        .with_pgo_clang(true)
        .with_hosts(hosts.to_vec());

    let report = BuildPipeline::new(&exec, &config, &options).run().unwrap();

    assert_eq!(
        report.profile.unwrap().source_raw_profiles,
        vec![out("stage2-profiled/profiles/aosp_arm64.profraw")]
    );
}

#[test]
fn test_empty_profile_set_fails_the_run() {
    let hosts = [HostPlatform::Linux];
    let exec = MemoryExecutor::new();
    let config = support::config();
    support::source_checkout(&exec);
    // Profiling runs that write nothing.
    exec.on_command(
        |c| support::is_build(c) && c.env.contains_key("LLVM_PROFILE_FILE"),
        |_, _| Ok(String::new()),
    );
    support::simulate_builds(&exec, &config, &hosts);
    let options = PipelineOptions::new()
        .with_multi_stage(true)
        .with_pgo_clang(true)
        .with_hosts(hosts.to_vec());

    let err = BuildPipeline::new(&exec, &config, &options).run().unwrap_err();

    assert!(matches!(err, BuildError::EmptyProfileSet { .. }));
    assert!(!builds(&exec).iter().any(|(d, _)| *d == out("stage2")));
}

#[test]
fn test_skipped_stage1_install_must_exist() {
    let hosts = [HostPlatform::Linux];
    let (exec, config) = workspace(&hosts);
    let options = PipelineOptions::new()
        .with_multi_stage(true)
        .with_skip_stage1_install(true)
        .with_hosts(hosts.to_vec());

    let err = BuildPipeline::new(&exec, &config, &options).run().unwrap_err();

    match err {
        BuildError::MissingArtifact { path, .. } => {
            assert!(path.starts_with(out("stage1-install/linux-x86/clang-dev")));
        }
        other => panic!("expected MissingArtifact, got {:?}", other),
    }
    assert!(!builds(&exec).iter().any(|(d, _)| *d == out("stage2")));
}

#[test]
fn test_skipped_stage1_install_reuses_previous() {
    let hosts = [HostPlatform::Linux];
    let (exec, config) = workspace(&hosts);
    exec.add_file(out("stage1-install/linux-x86/clang-dev/bin/clang"), "clang");
    exec.add_file(
        out("stage1-install/linux-x86/clang-dev/bin/llvm-profdata"),
        "profdata",
    );
    let options = PipelineOptions::new()
        .with_multi_stage(true)
        .with_skip_stage1_install(true)
        .with_hosts(hosts.to_vec());
    let progress = RecordingHandler::default();

    let report = BuildPipeline::new(&exec, &config, &options)
        .with_progress(&progress)
        .run()
        .unwrap();

    assert!(!report.visited(PipelineState::Stage1Install));
    assert!(report.visited(PipelineState::Stage2Build));
    assert!(progress.skipped().contains(&"Stage1Install".to_string()));
    assert_eq!(
        exec.read_to_string(&out("stage1-install/linux-x86/clang-dev/bin/clang"))
            .unwrap(),
        "clang"
    );
}

#[test]
fn test_supplied_profile_skips_pgo() {
    let hosts = [HostPlatform::Linux];
    let (exec, config) = workspace(&hosts);
    exec.add_file("/profiles/clang.profile", "indexed");
    let options = PipelineOptions::new()
        .with_multi_stage(true)
        .with_pgo_clang(true)
        .with_pgo_profile(Some(PathBuf::from("/profiles/clang.profile")))
        .with_hosts(hosts.to_vec());

    let report = BuildPipeline::new(&exec, &config, &options).run().unwrap();

    assert!(!report.visited(PipelineState::PgoInstrument));
    assert!(report.profile.is_none());
    let stage2 = exec
        .commands()
        .into_iter()
        .find(|c| support::out_dir_of(c) == Some(out("stage2")))
        .unwrap();
    assert!(stage2.has_arg("FORCE_BUILD_LLVM_PROFILE_USE=/profiles/clang.profile"));
}

#[test]
fn test_pgo_skipped_on_darwin() {
    let hosts = [HostPlatform::Darwin];
    let (exec, config) = workspace(&hosts);
    let options = PipelineOptions::new()
        .with_multi_stage(true)
        .with_pgo_clang(true)
        .with_hosts(hosts.to_vec());

    let report = BuildPipeline::new(&exec, &config, &options).run().unwrap();

    assert!(!report.visited(PipelineState::PgoInstrument));
    assert!(report.visited(PipelineState::Stage2Build));
    assert!(!exec
        .commands()
        .iter()
        .any(|c| c.env.contains_key("LLVM_PROFILE_FILE")));
    assert_eq!(
        report.packages[0].tarball_path,
        PathBuf::from("/dist/clang-dev-darwin-x86.tar.bz2")
    );
}

#[test]
fn test_linux_machine_packages_windows_too() {
    let hosts = [HostPlatform::Linux, HostPlatform::Windows];
    let (exec, config) = workspace(&hosts);
    exec.add_file(out("stage1-install/windows-x86/stale"), "old");
    let options = PipelineOptions::new()
        .with_multi_stage(true)
        .with_hosts(hosts.to_vec());

    let report = BuildPipeline::new(&exec, &config, &options).run().unwrap();

    let tarballs: Vec<PathBuf> = report
        .packages
        .iter()
        .map(|p| p.tarball_path.clone())
        .collect();
    assert_eq!(
        tarballs,
        vec![
            PathBuf::from("/dist/clang-dev-linux-x86.tar.bz2"),
            PathBuf::from("/dist/clang-dev-windows-x86.tar.bz2"),
        ]
    );
    // Windows never gets a stage1 toolchain.
    assert!(!exec.exists(&out("stage1-install/windows-x86")));
    assert!(exec.is_file(&out("install/windows-x86/clang-dev/bin/clang.exe")));
    assert!(exec.is_file(&out(
        "install/windows-x86/clang-dev/bin/libwinpthread-1.dll"
    )));
    // Windows is stripped even though nothing else asks for it.
    assert!(exec
        .commands()
        .iter()
        .any(|c| c.program == "strip"
            && c.has_arg(&out("install/windows-x86/clang-dev/bin/clang.exe").display().to_string())));
}

#[test]
fn test_failed_build_stops_the_run() {
    let hosts = [HostPlatform::Linux];
    let exec = MemoryExecutor::new();
    let config = support::config();
    support::source_checkout(&exec);
    exec.fail_command(
        |c| support::product_of(c) == Some("aosp_mips"),
        2,
    );
    support::simulate_builds(&exec, &config, &hosts);
    let options = PipelineOptions::new().with_hosts(hosts.to_vec());
    let progress = RecordingHandler::default();

    let err = BuildPipeline::new(&exec, &config, &options)
        .with_progress(&progress)
        .run()
        .unwrap_err();

    assert_eq!(err.exit_code(), 2);
    assert_eq!(builds(&exec).len(), 3);
    assert!(!exec.exists(&out("install")));
    assert!(matches!(
        progress.events.lock().unwrap().last(),
        Some(ProgressEvent::Failed { .. })
    ));
}

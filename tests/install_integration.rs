//! Install tree assembly across hosts, in memory and on disk

mod support;

use clang_build::exec::{Executor, MemoryExecutor, RealExecutor};
use clang_build::install::{
    ArtifactKind, InstallManifest, InstallManifestEntry, InstallationAssembler, ManifestBuilder,
    ToolchainFlavor,
};
use clang_build::{BuildError, HostPlatform, ToolchainConfig};
use std::fs;
use std::path::Path;
use support::{out, populate_build, source_checkout};
use tempfile::TempDir;
use yare::parameterized;

fn checkout_with_build(hosts: &[HostPlatform]) -> (MemoryExecutor, ToolchainConfig) {
    let exec = MemoryExecutor::new();
    let config = support::config();
    source_checkout(&exec);
    populate_build(&exec, &config, &out("stage2"), hosts);
    (exec, config)
}

#[parameterized(
    linux = { HostPlatform::Linux },
    darwin = { HostPlatform::Darwin },
    windows = { HostPlatform::Windows },
)]
fn test_full_install_is_idempotent(host: HostPlatform) {
    let (exec, config) = checkout_with_build(&[host]);
    let assembler = InstallationAssembler::new(&exec, &config);
    let install_host_dir = out("install").join(host.tag());

    let install = || {
        assembler
            .install_toolchain(
                &out("stage2"),
                &install_host_dir,
                "clang-dev",
                host,
                true,
                ToolchainFlavor::Full,
            )
            .unwrap()
    };

    let root = install();
    let first = exec.tree(&install_host_dir);
    install();

    assert_eq!(first, exec.tree(&install_host_dir));
    assert_eq!(root, install_host_dir.join("clang-dev"));
    // One top-level entry, named after the package.
    let top: Vec<_> = first.keys().filter(|p| p.components().count() == 1).collect();
    assert_eq!(top, vec![Path::new("clang-dev")]);
}

#[parameterized(
    linux = { HostPlatform::Linux },
    darwin = { HostPlatform::Darwin },
    windows = { HostPlatform::Windows },
)]
fn test_no_source_from_another_host(host: HostPlatform) {
    let (exec, config) = checkout_with_build(&HostPlatform::ALL);
    let build_dir = out("stage2");
    let host_outputs = build_dir.join("host");

    let manifest = ManifestBuilder::new(&exec, &config, &build_dir, host, true)
        .build(ToolchainFlavor::Full)
        .unwrap();

    for path in manifest.source_paths() {
        if path.starts_with(&host_outputs) {
            assert!(
                path.starts_with(host_outputs.join(host.tag())),
                "{} reads {}",
                host,
                path.display()
            );
        }
    }
}

#[test]
fn test_minimal_install_layout() {
    let (exec, config) = checkout_with_build(&[HostPlatform::Linux]);
    let root = InstallationAssembler::new(&exec, &config)
        .install_toolchain(
            &out("stage2"),
            &out("stage1-install/linux-x86"),
            "clang-dev",
            HostPlatform::Linux,
            true,
            ToolchainFlavor::Minimal,
        )
        .unwrap();

    assert!(exec.is_file(&root.join("bin/llvm-profdata")));
    assert!(exec.is_file(&root.join("lib64/clang/5.0/include/stddef.h")));
    assert!(!exec.exists(&root.join("lib64/clang/5.0/include/CMakeLists.txt")));
    assert!(exec.exists(&root.join("lib64/clang/5.0.300080")));
    assert!(exec.is_file(
        &root.join("lib64/clang/5.0/lib/linux/libclang_rt.asan-aarch64-android.so")
    ));
    // Only the full toolchain ships scripts and provenance.
    assert!(!exec.exists(&root.join("bin/git-clang-format")));
    assert!(!exec.exists(&root.join("repo.prop")));
}

#[test]
fn test_missing_build_output_touches_nothing() {
    let (exec, config) = checkout_with_build(&[HostPlatform::Linux]);
    exec.add_file(out("install/linux-x86/clang-dev/bin/clang"), "previous");
    let mut manifest = InstallManifest::new();
    manifest.push(InstallManifestEntry::file(
        ArtifactKind::Binary,
        out("stage2/host/linux-x86/bin/clang-9000"),
        "bin/clang-9000",
    ));

    let err = InstallationAssembler::new(&exec, &config)
        .install(&manifest, &out("install/linux-x86"), "clang-dev")
        .unwrap_err();

    assert!(matches!(err, BuildError::MissingArtifact { .. }));
    assert_eq!(
        exec.read_to_string(&out("install/linux-x86/clang-dev/bin/clang"))
            .unwrap(),
        "previous"
    );
}

#[test]
fn test_install_on_disk() {
    let temp = TempDir::new().unwrap();
    let build = temp.path().join("build");
    fs::create_dir_all(build.join("bin")).unwrap();
    fs::create_dir_all(build.join("include/sub")).unwrap();
    fs::write(build.join("bin/clang"), "clang").unwrap();
    fs::write(build.join("include/a.h"), "a").unwrap();
    fs::write(build.join("include/sub/b.h"), "b").unwrap();
    fs::write(temp.path().join("wrapper"), "#!/bin/sh\n").unwrap();

    let mut manifest = InstallManifest::new();
    manifest.push(InstallManifestEntry::file(
        ArtifactKind::Binary,
        build.join("bin/clang"),
        "bin/clang",
    ));
    manifest.push(InstallManifestEntry::wrap("bin/clang", temp.path().join("wrapper")));
    manifest.push(InstallManifestEntry::dir(
        ArtifactKind::HeaderSet,
        build.join("include"),
        "include",
    ));
    manifest.push(InstallManifestEntry::generated(
        ArtifactKind::Provenance,
        "5.0.300080\n",
        false,
        "AndroidVersion.txt",
    ));

    let exec = RealExecutor::new();
    let config = ToolchainConfig::new().with_source_root(temp.path());
    let install_host_dir = temp.path().join("install/linux-x86");
    fs::create_dir_all(&install_host_dir).unwrap();
    fs::write(install_host_dir.join("stale"), "x").unwrap();

    let root = InstallationAssembler::new(&exec, &config)
        .install(&manifest, &install_host_dir, "clang-dev")
        .unwrap();

    assert_eq!(fs::read_to_string(root.join("bin/clang")).unwrap(), "#!/bin/sh\n");
    assert_eq!(fs::read_to_string(root.join("bin/clang.real")).unwrap(), "clang");
    assert_eq!(fs::read_to_string(root.join("include/sub/b.h")).unwrap(), "b");
    assert_eq!(
        fs::read_to_string(root.join("AndroidVersion.txt")).unwrap(),
        "5.0.300080\n"
    );
    assert!(!install_host_dir.join("stale").exists());
}

#[cfg(unix)]
#[test]
fn test_symlinks_on_disk() {
    let temp = TempDir::new().unwrap();
    let mut manifest = InstallManifest::new();
    manifest.push(InstallManifestEntry::generated(
        ArtifactKind::Binary,
        "clang",
        true,
        "bin/clang.real",
    ));
    manifest.push(InstallManifestEntry::symlink(
        ArtifactKind::Binary,
        "bin/clang++.real",
        "clang.real",
    ));

    let exec = RealExecutor::new();
    let config = ToolchainConfig::new().with_source_root(temp.path());
    let install_host_dir = temp.path().join("install");
    let root = InstallationAssembler::new(&exec, &config)
        .install(&manifest, &install_host_dir, "clang-dev")
        .unwrap();

    let link = root.join("bin/clang++.real");
    assert_eq!(fs::read_link(&link).unwrap(), Path::new("clang.real"));
    assert_eq!(fs::read_to_string(&link).unwrap(), "clang");
}

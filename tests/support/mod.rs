//! Shared fixtures: an in-memory source checkout and a build tool that
//! leaves every output the install step expects.
#![allow(dead_code)]

use clang_build::exec::{CommandSpec, Executor, MemoryExecutor};
use clang_build::install::manifest::Source;
use clang_build::install::{ManifestBuilder, ToolchainFlavor};
use clang_build::{HostPlatform, ToolchainConfig};
use std::path::{Path, PathBuf};

pub const SRC: &str = "/src";
pub const OUT: &str = "/out";
pub const DIST: &str = "/dist";

pub fn config() -> ToolchainConfig {
    ToolchainConfig::new()
        .with_source_root(SRC)
        .with_out_dir(OUT)
        .with_dist_dir(Some(PathBuf::from(DIST)))
        .with_available_cpus(8)
}

const LISTED_DIRS: [&str; 5] = [
    "external/clang/lib/Headers",
    "external/llvm/lib/Fuzzer",
    "external/openmp_llvm/runtime/src/generated/arm",
    "external/libcxx/include",
    "external/libcxxabi/include",
];

const PROJECTS: [&str; 8] = [
    "clang",
    "clang-tools-extra",
    "compiler-rt",
    "libcxx",
    "libcxxabi",
    "libunwind_llvm",
    "llvm",
    "openmp_llvm",
];

/// The parts of the checkout that are listed or read rather than copied.
pub fn source_checkout(exec: &MemoryExecutor) {
    let src = Path::new(SRC);
    for dir in LISTED_DIRS {
        exec.add_dir(src.join(dir));
    }
    exec.add_file(src.join("external/clang/lib/Headers/stddef.h"), "stddef");
    exec.add_file(src.join("external/clang/lib/Headers/CMakeLists.txt"), "cmake");
    exec.add_file(src.join("external/llvm/lib/Fuzzer/FuzzerInterface.h"), "fuzzer");
    exec.add_file(src.join("external/libcxx/include/vector"), "vector");
    exec.add_file(src.join("external/libcxxabi/include/cxxabi.h"), "cxxabi");
    exec.add_file(src.join("external/clang/compiler_wrapper"), "#!/usr/bin/env python");

    for project in PROJECTS {
        let dir = src.join("external").join(project);
        exec.add_file(dir.join("NOTICE"), &format!("{} notice", project));
        exec.add_file(dir.join("MODULE_LICENSE_BSD_LIKE"), "");
    }
    for project in ["llvm", "clang"] {
        exec.add_file(src.join("external").join(project).join("Android.bp"), "");
    }
    exec.add_file(Path::new(DIST).join("repo.prop"), "platform/external/clang abc123\n");
}

/// Fill `build_dir` with every output a full toolchain for each of
/// `hosts` is installed from. Files that already exist are kept.
pub fn populate_build(
    exec: &MemoryExecutor,
    config: &ToolchainConfig,
    build_dir: &Path,
    hosts: &[HostPlatform],
) {
    for &host in hosts {
        let manifest = ManifestBuilder::new(exec, config, build_dir, host, true)
            .build(ToolchainFlavor::Full)
            .expect("manifest of a populated checkout");
        for entry in manifest.entries() {
            match &entry.source {
                Source::Dir { path, .. } if !exec.exists(path) => exec.add_dir(path),
                Source::File(path) if !exec.exists(path) => {
                    exec.add_file(path, &path.display().to_string())
                }
                _ => {}
            }
        }
    }
}

/// Product a build tool invocation was for.
pub fn product_of(command: &CommandSpec) -> Option<&str> {
    command.env.get("TARGET_PRODUCT").map(String::as_str)
}

pub fn out_dir_of(command: &CommandSpec) -> Option<PathBuf> {
    command.env.get("OUT_DIR").map(PathBuf::from)
}

pub fn is_build(command: &CommandSpec) -> bool {
    command.program == "make"
}

/// Make every build tool run produce its outputs. A profiling run writes
/// one raw profile per product.
pub fn simulate_builds(exec: &MemoryExecutor, config: &ToolchainConfig, hosts: &[HostPlatform]) {
    let config = config.clone();
    let hosts = hosts.to_vec();
    exec.on_command(is_build, move |command, exec| {
        if let Some(pattern) = command.env.get("LLVM_PROFILE_FILE") {
            let profiles = Path::new(pattern)
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            let product = product_of(command).unwrap_or("unknown");
            exec.add_file(profiles.join(format!("{}.profraw", product)), "raw profile");
        } else if let Some(out_dir) = out_dir_of(command) {
            populate_build(exec, &config, &out_dir, &hosts);
        }
        Ok(String::new())
    });
}

/// A checkout whose builds all succeed.
pub fn workspace(hosts: &[HostPlatform]) -> (MemoryExecutor, ToolchainConfig) {
    let exec = MemoryExecutor::new();
    let config = config();
    source_checkout(&exec);
    simulate_builds(&exec, &config, hosts);
    (exec, config)
}

/// Build tool invocations, as `(out_dir, product)`.
pub fn builds(exec: &MemoryExecutor) -> Vec<(PathBuf, String)> {
    exec.commands()
        .iter()
        .filter(|c| is_build(c))
        .map(|c| {
            (
                out_dir_of(c).unwrap_or_default(),
                product_of(c).unwrap_or_default().to_string(),
            )
        })
        .collect()
}

pub fn out(rel: &str) -> PathBuf {
    Path::new(OUT).join(rel)
}

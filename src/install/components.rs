//! The components of an install tree, in install order

use super::layout::{
    built_host_files, BuildTree, InstallLayout, ANALYZER_TARGETS, HOST_SANITIZERS,
    LICENSE_PROJECTS, SANITIZER_TEST_ARCHES, TARGET_SANITIZERS,
};
use super::manifest::{ArtifactKind, InstallManifest, InstallManifestEntry};
use crate::config::ToolchainConfig;
use crate::error::{BuildError, Result};
use crate::exec::{check_artifact, CommandSpec, DirEntry, Executor};
use crate::host::HostPlatform;
use crate::stage::matrix::product_for_arch;
use crate::stage::products;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const MINGW_PREBUILTS: &str = "prebuilts/gcc/linux-x86/host/x86_64-w64-mingw32-4.8";
const WINPTHREAD_DLL: &str = "libwinpthread-1.dll";
const REPO_PROP: &str = "repo.prop";

/// Which toolchain to lay out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolchainFlavor {
    /// Just enough for the next stage to build with.
    Minimal,
    /// Host files and headers of an instrumented compiler.
    Instrumented,
    /// Everything that ships.
    Full,
}

/// Computes the manifest of one install tree. Only reads: directory
/// listings and a few source files decide what the manifest holds.
pub struct ManifestBuilder<'a> {
    exec: &'a dyn Executor,
    config: &'a ToolchainConfig,
    build: BuildTree,
    layout: InstallLayout,
    host: HostPlatform,
    strip: bool,
}

impl<'a> ManifestBuilder<'a> {
    pub fn new(
        exec: &'a dyn Executor,
        config: &'a ToolchainConfig,
        build_dir: &Path,
        host: HostPlatform,
        strip: bool,
    ) -> Self {
        Self {
            exec,
            config,
            build: BuildTree::new(build_dir, host),
            layout: InstallLayout::new(&config.version),
            host,
            strip,
        }
    }

    pub fn build(&self, flavor: ToolchainFlavor) -> Result<InstallManifest> {
        let mut m = InstallManifest::new();
        match flavor {
            ToolchainFlavor::Minimal => {
                self.host_files(&mut m, true);
                self.headers(&mut m)?;
                self.profile_runtimes(&mut m);
                self.sanitizers(&mut m);
            }
            ToolchainFlavor::Instrumented => {
                self.host_files(&mut m, true);
                self.headers(&mut m)?;
            }
            ToolchainFlavor::Full => {
                self.host_files(&mut m, false);
                if self.host.needs_winpthreads() {
                    self.winpthreads(&mut m);
                }
                if self.host.supports_compiler_wrapper() {
                    self.compiler_wrapper(&mut m);
                }
                self.scripts(&mut m);
                self.headers(&mut m)?;
                self.development_headers(&mut m)?;
                self.profile_runtimes(&mut m);
                self.sanitizers(&mut m);
                self.sanitizer_tests(&mut m);
                self.libfuzzer(&mut m)?;
                self.openmp(&mut m)?;
                self.libcxx_headers(&mut m)?;
                self.licenses(&mut m)?;
                self.provenance(&mut m);
            }
        }
        debug!(
            "{:?} manifest for {}: {} entries",
            flavor,
            self.host,
            m.len()
        );
        Ok(m)
    }

    fn source(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.config.source_path(rel)
    }

    /// Entries of a source directory, or nothing (with a warning) when a
    /// dry run finds it absent.
    fn list_source_dir(&self, artifact: &str, dir: &Path) -> Result<Vec<DirEntry>> {
        if !check_artifact(self.exec, artifact, dir)? {
            return Ok(Vec::new());
        }
        self.exec.read_dir(dir)
    }

    /// Copy a listed entry to `dest_dir/<name>`, as a tree when it is a
    /// directory.
    fn listed_entry(artifact: ArtifactKind, entry: &DirEntry, dest_dir: &Path) -> InstallManifestEntry {
        let dest = dest_dir.join(entry.file_name());
        if entry.is_dir() {
            InstallManifestEntry::dir(artifact, entry.path(), dest)
        } else {
            InstallManifestEntry::file(artifact, entry.path(), dest)
        }
    }

    fn host_files(&self, m: &mut InstallManifest, minimal: bool) {
        let host_dir = self.build.host_dir();
        for rel in built_host_files(self.host, minimal) {
            let artifact = if rel.starts_with("bin/") {
                ArtifactKind::Binary
            } else {
                ArtifactKind::SharedLib
            };
            let strip = self.strip && self.host.can_strip(Path::new(&rel));
            m.push(InstallManifestEntry::file(artifact, host_dir.join(&rel), &rel).stripped(strip));
        }
    }

    /// The pthreads DLL is linked dynamically whenever pthreads is used, so
    /// it ships next to the binaries and libraries. The 32-bit copy in `bin`
    /// is renamed by its consumers.
    fn winpthreads(&self, m: &mut InstallManifest) {
        let mingw = self.source(MINGW_PREBUILTS);
        let lib64 = mingw.join("x86_64-w64-mingw32/bin").join(WINPTHREAD_DLL);
        let lib32 = mingw.join("x86_64-w64-mingw32/lib32").join(WINPTHREAD_DLL);

        m.extend([
            InstallManifestEntry::file(ArtifactKind::SharedLib, &lib64, Path::new("bin").join(WINPTHREAD_DLL)),
            InstallManifestEntry::file(
                ArtifactKind::SharedLib,
                &lib32,
                Path::new("bin").join(format!("{}.32", WINPTHREAD_DLL)),
            ),
            InstallManifestEntry::file(ArtifactKind::SharedLib, &lib64, Path::new("lib64").join(WINPTHREAD_DLL)),
            InstallManifestEntry::file(ArtifactKind::SharedLib, &lib32, Path::new("lib").join(WINPTHREAD_DLL)),
        ]);
    }

    /// `clang` and `clang++` become `.real` with the wrapper in their place;
    /// `clang++.real` then points at `clang.real`.
    fn compiler_wrapper(&self, m: &mut InstallManifest) {
        let wrapper_dir = self.source("external/clang");
        let wrapper = wrapper_dir.join("compiler_wrapper");
        let ext = self.host.bin_ext();

        for name in ["clang", "clang++"] {
            m.push(InstallManifestEntry::wrap(
                format!("bin/{}{}", name, ext),
                &wrapper,
            ));
        }
        m.push(InstallManifestEntry::file(
            ArtifactKind::Script,
            wrapper_dir.join("bisect_driver.py"),
            "bin/bisect_driver.py",
        ));
        m.push(InstallManifestEntry::symlink(
            ArtifactKind::Binary,
            "bin/clang++.real",
            "clang.real",
        ));
    }

    fn scripts(&self, m: &mut InstallManifest) {
        m.push(InstallManifestEntry::file(
            ArtifactKind::Script,
            self.source("external/clang/tools/clang-format/git-clang-format"),
            "bin/git-clang-format",
        ));
        m.push(InstallManifestEntry::file(
            ArtifactKind::Script,
            self.source("external/compiler-rt/lib/asan/scripts/asan_device_setup"),
            "bin/asan_device_setup",
        ));

        for tool in ["scan-build", "scan-view"] {
            m.push(InstallManifestEntry::dir(
                ArtifactKind::Script,
                self.source("external/clang/tools").join(tool),
                Path::new("tools").join(tool),
            ));
        }

        for (abi, target) in ANALYZER_TARGETS {
            for suffix in ["", "++"] {
                m.push(InstallManifestEntry::generated(
                    ArtifactKind::Script,
                    analyzer_script(suffix, target),
                    true,
                    Path::new("bin").join(abi).join(format!("analyzer{}", suffix)),
                ));
            }
        }
    }

    /// Clang's builtin headers, minus build files, plus `stdatomic.h` and
    /// the generated `arm_neon.h`. `lib64/clang/<long>` aliases the resource
    /// directory.
    fn headers(&self, m: &mut InstallManifest) -> Result<()> {
        let dest = self.layout.resource_include();
        let headers_src = self.source("external/clang/lib/Headers");

        for entry in self.list_source_dir("clang headers", &headers_src)? {
            let name = entry.file_name().to_string_lossy();
            if matches!(name.as_ref(), "Makefile" | "CMakeLists.txt") || name.ends_with(".mk") {
                continue;
            }
            m.push(Self::listed_entry(ArtifactKind::HeaderSet, &entry, &dest));
        }

        m.push(InstallManifestEntry::file(
            ArtifactKind::HeaderSet,
            self.source("bionic/libc/include/stdatomic.h"),
            dest.join("stdatomic.h"),
        ));
        m.push(InstallManifestEntry::file(
            ArtifactKind::HeaderSet,
            self.build.arm_neon_header(),
            dest.join("arm_neon.h"),
        ));
        m.push(InstallManifestEntry::symlink(
            ArtifactKind::HeaderSet,
            self.layout.resource_alias(),
            self.layout.version().short(),
        ));
        Ok(())
    }

    /// LLVM and Clang headers for building against libLLVM/libclang.
    fn development_headers(&self, m: &mut InstallManifest) -> Result<()> {
        if !self.host.supports_dev_headers() {
            return Ok(());
        }

        let llvm_config = Path::new("llvm/Config");
        for project in ["llvm", "clang", "compiler-rt"] {
            let dest = self.layout.prebuilt_include(project);
            let src = self.source("external").join(project).join("include");

            if project == "llvm" {
                // The host's pre-generated config headers replace the
                // source tree's.
                m.push(InstallManifestEntry::dir(ArtifactKind::HeaderSet, src, &dest).skipping([llvm_config]));
                m.push(InstallManifestEntry::dir(
                    ArtifactKind::HeaderSet,
                    self.source("external/llvm/host/include").join(llvm_config),
                    dest.join(llvm_config),
                ));
                m.push(InstallManifestEntry::file(
                    ArtifactKind::HeaderSet,
                    self.source("external/llvm/include")
                        .join(llvm_config)
                        .join("llvm-platform-config.h"),
                    dest.join(llvm_config).join("llvm-platform-config.h"),
                ));
            } else {
                m.push(InstallManifestEntry::dir(ArtifactKind::HeaderSet, src, &dest));
            }

            if project != "compiler-rt" {
                self.generated_headers(m, project, &dest)?;
            }
        }
        Ok(())
    }

    /// Headers produced by tblgen rules, found by name under the project's
    /// build intermediates. Each name must match exactly one file.
    fn generated_headers(&self, m: &mut InstallManifest, project: &str, dest: &Path) -> Result<()> {
        let blueprint = self.source("external").join(project).join("Android.bp");
        if !check_artifact(self.exec, "blueprint", &blueprint)? {
            return Ok(());
        }
        let headers = tblgen_outputs(&self.exec.read_to_string(&blueprint)?);

        let search_root = self.build.soong_intermediates(project);
        let built = if headers.is_empty() || !self.exec.is_dir(&search_root) {
            Vec::new()
        } else {
            self.exec.walk_files(&search_root)?
        };

        for header in headers {
            let header = PathBuf::from(header);
            if header.starts_with("llvm/Config") {
                continue;
            }
            let Some(name) = header.file_name() else {
                continue;
            };
            let matches: Vec<&PathBuf> = built
                .iter()
                .filter(|p| p.file_name() == Some(name))
                .collect();

            match matches.as_slice() {
                [src] => m.push(InstallManifestEntry::file(
                    ArtifactKind::HeaderSet,
                    *src,
                    dest.join(&header),
                )),
                found if self.exec.is_dry_run() => {
                    warn!(
                        "Generated header {} has {} candidate(s) under {} (dry run)",
                        header.display(),
                        found.len(),
                        search_root.display()
                    );
                }
                found => {
                    return Err(BuildError::missing(
                        format!(
                            "single build output for generated header {} ({} found)",
                            header.display(),
                            found.len()
                        ),
                        search_root,
                    ))
                }
            }
        }
        Ok(())
    }

    fn profile_runtimes(&self, m: &mut InstallManifest) {
        let lib_dir = self.layout.runtime_dir();
        for product in products() {
            m.push(InstallManifestEntry::file(
                ArtifactKind::RuntimeLib,
                self.build.target_static_lib(product, "libprofile_rt"),
                lib_dir.join(format!(
                    "libclang_rt.profile-{}-android.a",
                    product.arch.profile_rt_name()
                )),
            ));
        }

        if self.host.supports_host_profile_rt() {
            for (arch, obj_dir) in [("i686", "obj32"), ("x86_64", "obj")] {
                m.push(InstallManifestEntry::file(
                    ArtifactKind::RuntimeLib,
                    self.build.host_static_lib(obj_dir, "libprofile_rt"),
                    lib_dir.join(format!("libclang_rt.profile-{}.a", arch)),
                ));
            }
        }
    }

    fn sanitizers(&self, m: &mut InstallManifest) {
        let lib_dir = self.layout.runtime_dir();
        m.push(InstallManifestEntry::dir(
            ArtifactKind::HeaderSet,
            self.source("external/compiler-rt/include/sanitizer"),
            self.layout.resource_include().join("sanitizer"),
        ));

        if self.host.supports_sanitizers() {
            for (lib, multilib) in HOST_SANITIZERS {
                let module = format!("lib{}", lib);
                m.push(InstallManifestEntry::file(
                    ArtifactKind::RuntimeLib,
                    self.build.host_static_lib("obj", &module),
                    lib_dir.join(format!("libclang_rt.{}-x86_64.a", lib)),
                ));
                if multilib {
                    m.push(InstallManifestEntry::file(
                        ArtifactKind::RuntimeLib,
                        self.build.host_static_lib("obj32", &module),
                        lib_dir.join(format!("libclang_rt.{}-i686.a", lib)),
                    ));
                }
            }
        }

        for product in products() {
            let arch = product.arch.sanitizer_name();
            for sanitizer in TARGET_SANITIZERS {
                if sanitizer == "tsan" && !product.arch.supports_tsan() {
                    continue;
                }
                let module = format!("libclang_rt.{}-{}-android", sanitizer, arch);
                m.push(InstallManifestEntry::file(
                    ArtifactKind::RuntimeLib,
                    self.build.target_shared_lib(product, &module),
                    lib_dir.join(format!("{}.so", module)),
                ));
            }
        }
    }

    /// `asan_test` is prebuilt with this toolchain so the platform's test
    /// matches its runtime.
    fn sanitizer_tests(&self, m: &mut InstallManifest) {
        for arch in SANITIZER_TEST_ARCHES {
            let product = product_for_arch(arch);
            m.push(InstallManifestEntry::file(
                ArtifactKind::Binary,
                self.build.target_native_test(&product, "asan_test"),
                Path::new("test")
                    .join(arch.sanitizer_name())
                    .join("bin/asan_test"),
            ));
        }
    }

    fn libfuzzer(&self, m: &mut InstallManifest) -> Result<()> {
        const MODULE: &str = "libLLVMFuzzer";

        if self.host.supports_host_fuzzer() {
            m.push(InstallManifestEntry::file(
                ArtifactKind::RuntimeLib,
                self.build.host_static_lib("obj", MODULE),
                self.layout.host_runtime_dir(self.host).join("libFuzzer.a"),
            ));
        }

        if !self.host.supports_target_runtimes() {
            return Ok(());
        }

        let headers_src = self.source("external/llvm/lib/Fuzzer");
        let headers_dest = PathBuf::from("prebuilt_include/llvm/lib/Fuzzer");
        for entry in self.list_source_dir("libFuzzer headers", &headers_src)? {
            let name = entry.file_name().to_string_lossy();
            if !entry.is_dir() && (name.ends_with(".h") || name.ends_with(".def")) {
                m.push(Self::listed_entry(ArtifactKind::HeaderSet, &entry, &headers_dest));
            }
        }

        for product in products() {
            m.push(InstallManifestEntry::file(
                ArtifactKind::RuntimeLib,
                self.build.target_static_lib(product, MODULE),
                self.layout
                    .runtime_arch_dir(product.arch.fuzzer_name())
                    .join("libFuzzer.a"),
            ));
        }
        Ok(())
    }

    /// OpenMP headers are generated per architecture but identical, so the
    /// ARM ones are installed.
    fn openmp(&self, m: &mut InstallManifest) -> Result<()> {
        if !self.host.supports_target_runtimes() {
            return Ok(());
        }

        let headers_src = self.source("external/openmp_llvm/runtime/src/generated/arm");
        let headers_dest = self.layout.resource_include();
        for entry in self.list_source_dir("OpenMP headers", &headers_src)? {
            m.push(Self::listed_entry(ArtifactKind::HeaderSet, &entry, &headers_dest));
        }

        for product in products() {
            let module = format!("libomp-{}", product.arch.android_name());
            m.push(InstallManifestEntry::file(
                ArtifactKind::RuntimeLib,
                self.build.target_static_lib(product, &module),
                self.layout
                    .runtime_arch_dir(product.arch.openmp_name())
                    .join("libomp.a"),
            ));
        }
        Ok(())
    }

    /// libc++ and libc++abi headers. libc++'s `__cxxabi_config.h` is a link
    /// to the libc++abi one, which is installed instead.
    fn libcxx_headers(&self, m: &mut InstallManifest) -> Result<()> {
        let dest = self.layout.libcxx_include();

        let cxx = self.source("external/libcxx/include");
        for entry in self.list_source_dir("libc++ headers", &cxx)? {
            if matches!(
                entry.file_name().to_str(),
                Some("CMakeLists.txt" | "__cxxabi_config.h")
            ) {
                continue;
            }
            m.push(Self::listed_entry(ArtifactKind::HeaderSet, &entry, &dest));
        }

        let cxxabi = self.source("external/libcxxabi/include");
        for entry in self.list_source_dir("libc++abi headers", &cxxabi)? {
            m.push(Self::listed_entry(ArtifactKind::HeaderSet, &entry, &dest));
        }
        Ok(())
    }

    /// `MODULE_LICENSE_*` markers of every project, and their notices
    /// concatenated into one `NOTICE`.
    fn licenses(&self, m: &mut InstallManifest) -> Result<()> {
        let mut notices = Vec::new();
        for project in LICENSE_PROJECTS {
            let project_dir = self.source("external").join(project);

            for entry in self.list_source_dir("project", &project_dir)? {
                let marker = entry.file_name().to_string_lossy().starts_with("MODULE_LICENSE_");
                if marker && !entry.is_dir() {
                    m.push(InstallManifestEntry::file(
                        ArtifactKind::License,
                        entry.path(),
                        entry.file_name(),
                    ));
                }
            }

            let notice = project_dir.join("NOTICE");
            if check_artifact(self.exec, "NOTICE", &notice)? {
                notices.push(self.exec.read_to_string(&notice)?);
            }
        }

        m.push(InstallManifestEntry::generated(
            ArtifactKind::License,
            notices.join("\n"),
            false,
            "NOTICE",
        ));
        Ok(())
    }

    /// `AndroidVersion.txt` and `repo.prop`. A `repo.prop` already in the
    /// dist directory wins over asking repo.
    fn provenance(&self, m: &mut InstallManifest) {
        m.push(InstallManifestEntry::generated(
            ArtifactKind::Provenance,
            format!("{}\n", self.config.version.long()),
            false,
            "AndroidVersion.txt",
        ));

        let entry = match &self.config.dist_dir {
            Some(dist) => {
                InstallManifestEntry::file(ArtifactKind::Provenance, dist.join(REPO_PROP), REPO_PROP)
            }
            None => InstallManifestEntry::command_output(
                ArtifactKind::Provenance,
                repo_manifest_command(&self.config.source_root),
                REPO_PROP,
            ),
        };
        m.push(entry);
    }
}

/// Pins every project of the checkout to its current commit.
pub fn repo_manifest_command(source_root: &Path) -> CommandSpec {
    CommandSpec::new("repo")
        .args(["forall", "-c", "echo $REPO_PROJECT $(git rev-parse HEAD)"])
        .current_dir(source_root)
}

/// Wrapper script that runs clang (`suffix` is `""` or `"++"`) for
/// `target` unless the caller already passed `-cc1`.
pub fn analyzer_script(suffix: &str, target: &str) -> String {
    format!(
        "#!/bin/bash\n\
         if [ \"$1\" != \"-cc1\" ]; then\n\
         \x20   `dirname $0`/../clang{suffix} -target {target} \"$@\"\n\
         else\n\
         \x20   # target/triple already spelled out.\n\
         \x20   `dirname $0`/../clang{suffix} \"$@\"\n\
         fi\n",
        suffix = suffix,
        target = target
    )
}

/// Output headers of every tblgen rule in a blueprint file, in order.
pub fn tblgen_outputs(blueprint: &str) -> Vec<String> {
    let outs_re = Regex::new(r"(?s)tblgen \{.*?outs: \[\n?(.*?),?\n?\]").expect("valid regex");

    outs_re
        .captures_iter(blueprint)
        .flat_map(|caps| {
            caps[1]
                .split(',')
                .map(|item| {
                    item.chars()
                        .filter(|c| *c != '"' && !c.is_whitespace())
                        .collect::<String>()
                })
                .collect::<Vec<_>>()
        })
        .filter(|header| !header.is_empty())
        .collect()
}

//! Paths and per-architecture names inside build and install trees

use crate::config::ToolchainVersion;
use crate::host::HostPlatform;
use crate::stage::{TargetArch, TargetProduct};
use std::path::{Path, PathBuf};

/// Android ABIs that get `analyzer`/`analyzer++` scripts, with the target
/// triple each one passes to clang.
pub const ANALYZER_TARGETS: [(&str, &str); 8] = [
    ("arm64-v8a", "aarch64-none-linux-android"),
    ("armeabi", "armv5te-none-linux-androideabi"),
    ("armeabi-v7a", "armv7-none-linux-androideabi"),
    ("armeabi-v7a-hard", "armv7-none-linux-androideabi"),
    ("mips", "mipsel-none-linux-android"),
    ("mips64", "mips64el-none-linux-android"),
    ("x86", "i686-none-linux-android"),
    ("x86_64", "x86_64-none-linux-android"),
];

/// Upstream projects whose licenses ship with the toolchain.
pub const LICENSE_PROJECTS: [&str; 8] = [
    "clang",
    "clang-tools-extra",
    "compiler-rt",
    "libcxx",
    "libcxxabi",
    "libunwind_llvm",
    "llvm",
    "openmp_llvm",
];

/// Host static sanitizer runtimes, and whether a 32-bit one exists too.
pub const HOST_SANITIZERS: [(&str, bool); 6] = [
    ("asan", true),
    ("asan_cxx", true),
    ("ubsan_standalone", true),
    ("ubsan_standalone_cxx", true),
    ("tsan", false),
    ("tsan_cxx", false),
];

pub const TARGET_SANITIZERS: [&str; 3] = ["asan", "ubsan_standalone", "tsan"];

/// Architectures `asan_test` is shipped for.
pub const SANITIZER_TEST_ARCHES: [TargetArch; 5] = [
    TargetArch::Arm,
    TargetArch::Arm64,
    TargetArch::X86,
    TargetArch::Mips,
    TargetArch::Mips64,
];

/// Runtimes spell architecture names differently.
impl TargetArch {
    pub fn profile_rt_name(self) -> &'static str {
        match self {
            TargetArch::Arm => "arm",
            TargetArch::Arm64 => "aarch64",
            TargetArch::Mips => "mipsel",
            TargetArch::Mips64 => "mips64el",
            TargetArch::X86 => "i686",
            TargetArch::X86_64 => "x86_64",
        }
    }

    pub fn sanitizer_name(self) -> &'static str {
        match self {
            TargetArch::Arm => "arm",
            TargetArch::Arm64 => "aarch64",
            TargetArch::Mips => "mips",
            TargetArch::Mips64 => "mips64",
            TargetArch::X86 => "i686",
            TargetArch::X86_64 => "x86_64",
        }
    }

    pub fn fuzzer_name(self) -> &'static str {
        match self {
            TargetArch::X86 => "i386",
            other => other.sanitizer_name(),
        }
    }

    pub fn openmp_name(self) -> &'static str {
        match self {
            TargetArch::X86 => "i386",
            other => other.profile_rt_name(),
        }
    }

    pub fn supports_tsan(self) -> bool {
        matches!(self, TargetArch::Arm64 | TargetArch::X86_64)
    }
}

/// Host files copied from `<build_dir>/host/<tag>/`, relative paths.
pub fn built_host_files(host: HostPlatform, minimal: bool) -> Vec<String> {
    let bin = |name: &str| format!("bin/{}{}", name, host.bin_ext());
    let lib = |dir: &str, name: &str| format!("{}/{}{}", dir, name, host.lib_ext());
    let is_windows = host == HostPlatform::Windows;

    let mut files = vec![bin("clang"), bin("clang++")];
    if !is_windows {
        files.push(bin("llvm-profdata"));
        files.push(lib("lib64", "libc++"));
    }
    if minimal {
        return files;
    }

    files.extend([
        bin("clang-format"),
        bin("clang-tidy"),
        lib("lib64", "LLVMgold"),
        lib("lib64", "libLLVM"),
    ]);

    if is_windows {
        files.extend([bin("clang_32"), lib("lib", "LLVMgold"), lib("lib", "libLLVM")]);
    } else {
        files.extend(
            [
                "FileCheck",
                "llvm-ar",
                "llvm-as",
                "llvm-dis",
                "llvm-link",
                "llvm-symbolizer",
                "sancov",
                "sanstats",
            ]
            .into_iter()
            .map(|name| bin(name)),
        );
        files.push(lib("lib64", "libclang"));
    }
    files
}

/// Where things are found in one stage's build output.
#[derive(Debug, Clone)]
pub struct BuildTree {
    root: PathBuf,
    host: HostPlatform,
}

impl BuildTree {
    pub fn new(root: impl Into<PathBuf>, host: HostPlatform) -> Self {
        Self {
            root: root.into(),
            host,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<build>/host/<tag>`
    pub fn host_dir(&self) -> PathBuf {
        self.root.join("host").join(self.host.tag())
    }

    /// A static library of the host build; `obj` or `obj32` for 32-bit.
    pub fn host_static_lib(&self, obj_dir: &str, module: &str) -> PathBuf {
        self.host_dir()
            .join(obj_dir)
            .join("STATIC_LIBRARIES")
            .join(format!("{}_intermediates", module))
            .join(format!("{}.a", module))
    }

    pub fn product_dir(&self, product: &TargetProduct) -> PathBuf {
        self.root.join("target/product").join(product.device)
    }

    pub fn target_static_lib(&self, product: &TargetProduct, module: &str) -> PathBuf {
        self.product_dir(product)
            .join("obj/STATIC_LIBRARIES")
            .join(format!("{}_intermediates", module))
            .join(format!("{}.a", module))
    }

    /// Packed shared library of a target build.
    pub fn target_shared_lib(&self, product: &TargetProduct, module: &str) -> PathBuf {
        self.product_dir(product)
            .join("obj/SHARED_LIBRARIES")
            .join(format!("{}_intermediates", module))
            .join("PACKED")
            .join(format!("{}.so", module))
    }

    pub fn target_native_test(&self, product: &TargetProduct, module: &str) -> PathBuf {
        self.product_dir(product)
            .join("obj/NATIVE_TESTS")
            .join(format!("{}_intermediates", module))
            .join("PACKED")
            .join(module)
    }

    /// Soong intermediates of an `external/` project.
    pub fn soong_intermediates(&self, project: &str) -> PathBuf {
        self.root.join("soong/.intermediates/external").join(project)
    }

    pub fn arm_neon_header(&self) -> PathBuf {
        self.soong_intermediates("clang")
            .join("clang-gen-arm-neon/gen/clang/Basic/arm_neon.h")
    }
}

/// Destinations inside an install root, all relative.
#[derive(Debug, Clone)]
pub struct InstallLayout {
    version: ToolchainVersion,
}

impl InstallLayout {
    pub fn new(version: &ToolchainVersion) -> Self {
        Self {
            version: version.clone(),
        }
    }

    pub fn version(&self) -> &ToolchainVersion {
        &self.version
    }

    /// `lib64/clang/<short>`
    pub fn resource_dir(&self) -> PathBuf {
        PathBuf::from("lib64/clang").join(self.version.short())
    }

    /// `lib64/clang/<long>`, a symlink to the resource directory.
    pub fn resource_alias(&self) -> PathBuf {
        PathBuf::from("lib64/clang").join(self.version.long())
    }

    pub fn resource_include(&self) -> PathBuf {
        self.resource_dir().join("include")
    }

    /// `lib64/clang/<short>/lib/linux`
    pub fn runtime_dir(&self) -> PathBuf {
        self.resource_dir().join("lib/linux")
    }

    pub fn runtime_arch_dir(&self, arch: &str) -> PathBuf {
        self.runtime_dir().join(arch)
    }

    /// `lib64/clang/<short>/lib/<os>/host`
    pub fn host_runtime_dir(&self, host: HostPlatform) -> PathBuf {
        self.resource_dir()
            .join("lib")
            .join(host.os_name())
            .join("host")
    }

    pub fn prebuilt_include(&self, project: &str) -> PathBuf {
        PathBuf::from("prebuilt_include").join(project).join("include")
    }

    pub fn libcxx_include(&self) -> PathBuf {
        PathBuf::from("include/c++/v1")
    }
}

//! Target products every stage is built for

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TargetArch {
    Arm,
    Arm64,
    Mips,
    Mips64,
    X86,
    X86_64,
}

impl TargetArch {
    /// Android ABI family name.
    pub fn android_name(self) -> &'static str {
        match self {
            TargetArch::Arm => "arm",
            TargetArch::Arm64 => "arm64",
            TargetArch::Mips => "mips",
            TargetArch::Mips64 => "mips64",
            TargetArch::X86 => "x86",
            TargetArch::X86_64 => "x86_64",
        }
    }

    pub fn is_64bit(self) -> bool {
        matches!(self, TargetArch::Arm64 | TargetArch::Mips64 | TargetArch::X86_64)
    }
}

impl fmt::Display for TargetArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.android_name())
    }
}

/// A lunch target. `device` is the directory its outputs land in under
/// `target/product/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TargetProduct {
    pub name: &'static str,
    pub device: &'static str,
    pub arch: TargetArch,
}

/// Built in this order. Products share one output directory, so they are
/// never built concurrently.
pub const PRODUCTS: [TargetProduct; 6] = [
    TargetProduct {
        name: "aosp_arm",
        device: "generic",
        arch: TargetArch::Arm,
    },
    TargetProduct {
        name: "aosp_arm64",
        device: "generic_arm64",
        arch: TargetArch::Arm64,
    },
    TargetProduct {
        name: "aosp_mips",
        device: "generic_mips",
        arch: TargetArch::Mips,
    },
    TargetProduct {
        name: "aosp_mips64",
        device: "generic_mips64",
        arch: TargetArch::Mips64,
    },
    TargetProduct {
        name: "aosp_x86",
        device: "generic_x86",
        arch: TargetArch::X86,
    },
    TargetProduct {
        name: "aosp_x86_64",
        device: "generic_x86_64",
        arch: TargetArch::X86_64,
    },
];

/// Products of a full stage build.
pub fn products() -> &'static [TargetProduct] {
    &PRODUCTS
}

/// The single product the PGO sub-builds use.
pub fn profiling_product() -> TargetProduct {
    PRODUCTS[1]
}

pub fn product_for_arch(arch: TargetArch) -> TargetProduct {
    PRODUCTS
        .iter()
        .copied()
        .find(|p| p.arch == arch)
        .unwrap_or(PRODUCTS[0])
}

// ABOUTME: Platform identifiers shared by manifests and the hub RPC.
// ABOUTME: Uses linux/darwin/windows and amd64/arm64 naming, the keys module manifests are written with.

/// Key into a manifest's `executable` map for the running platform.
pub fn platform_key() -> &'static str {
    os_key(std::env::consts::OS)
}

/// Alternate spellings accepted for the running platform, tried after [`platform_key`].
pub fn platform_aliases() -> &'static [&'static str] {
    match std::env::consts::OS {
        "macos" => &["macos"],
        _ => &[],
    }
}

pub fn arch_key() -> &'static str {
    arch_name(std::env::consts::ARCH)
}

fn os_key(os: &'static str) -> &'static str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

fn arch_name(arch: &'static str) -> &'static str {
    match arch {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64",
        other => other,
    }
}

// ABOUTME: Builds the environment a module process is launched with.
// ABOUTME: Drops inherited UI-toolkit variables and injects the hub address and launch flags.

use std::collections::BTreeMap;
use std::ffi::OsString;

pub const HUB_ADDR_SUFFIX: &str = "HUB_ADDR";
pub const SHOW_UI_SUFFIX: &str = "SHOW_UI";
pub const AUTO_CONNECT_SUFFIX: &str = "AUTO_CONNECT";

/// How a module should behave once launched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaunchFlags {
    pub show_ui: bool,
    pub auto_connect: bool,
}

/// Environment settings from the supervisor config.
#[derive(Debug, Clone)]
pub struct EnvPolicy<'a> {
    pub strip_prefixes: &'a [String],
    pub prefix: &'a str,
    pub extra: &'a BTreeMap<String, String>,
}

fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

/// Compute the child environment from the parent's variables.
///
/// Variables starting with any strip prefix are removed, as are stale copies of
/// the injected keys. `extra` is applied last and may override anything.
/// Values that are not valid UTF-8 pass through untouched.
pub fn build_module_env<I>(
    parent: I,
    policy: &EnvPolicy<'_>,
    hub_addr: &str,
    flags: LaunchFlags,
) -> BTreeMap<OsString, OsString>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let injected = [HUB_ADDR_SUFFIX, SHOW_UI_SUFFIX, AUTO_CONNECT_SUFFIX]
        .map(|suffix| OsString::from(format!("{}_{}", policy.prefix, suffix)));

    let mut env: BTreeMap<OsString, OsString> = parent
        .into_iter()
        .filter(|(key, _)| {
            let key = key.to_string_lossy();
            !policy
                .strip_prefixes
                .iter()
                .any(|prefix| !prefix.is_empty() && key.starts_with(prefix.as_str()))
        })
        .filter(|(key, _)| !injected.contains(key))
        .collect();

    let [hub_key, ui_key, connect_key] = injected;
    env.insert(hub_key, hub_addr.into());
    env.insert(ui_key, flag(flags.show_ui).into());
    env.insert(connect_key, flag(flags.auto_connect).into());

    for (key, value) in policy.extra {
        env.insert(key.into(), value.into());
    }
    env
}

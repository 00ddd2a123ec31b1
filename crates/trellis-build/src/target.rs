//! Target axis value types
//!
//! A [`Target`] is one concrete build variant: platform, toolchain, optimization,
//! output kind, launch mode and build backend. Optimization and launch mode are
//! flag axes: a project requests a [`FlagSet`] of them and every set bit becomes
//! its own Target when the axes are expanded.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;
use std::ops::BitOr;

/// Target platform
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Platform {
    Win32,
    Win64,
    Linux,
    MacOs,
    Android,
    Ios,
    /// Platform not known to trellis, kept by name
    Custom(String),
}

impl Platform {
    /// Get platform name
    pub fn name(&self) -> &str {
        match self {
            Self::Win32 => "win32",
            Self::Win64 => "win64",
            Self::Linux => "linux",
            Self::MacOs => "macos",
            Self::Android => "android",
            Self::Ios => "ios",
            Self::Custom(name) => name,
        }
    }
}

impl From<String> for Platform {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "win32" => Self::Win32,
            "win64" => Self::Win64,
            "linux" => Self::Linux,
            "macos" => Self::MacOs,
            "android" => Self::Android,
            "ios" => Self::Ios,
            _ => Self::Custom(s),
        }
    }
}

impl From<Platform> for String {
    fn from(p: Platform) -> Self {
        p.name().to_string()
    }
}

/// Toolchain / IDE version
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DevEnv {
    Vs2019,
    Vs2022,
    Make,
    Xcode,
    Custom(String),
}

impl DevEnv {
    /// Get toolchain name
    pub fn name(&self) -> &str {
        match self {
            Self::Vs2019 => "vs2019",
            Self::Vs2022 => "vs2022",
            Self::Make => "make",
            Self::Xcode => "xcode",
            Self::Custom(name) => name,
        }
    }
}

impl From<String> for DevEnv {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "vs2019" => Self::Vs2019,
            "vs2022" => Self::Vs2022,
            "make" => Self::Make,
            "xcode" => Self::Xcode,
            _ => Self::Custom(s),
        }
    }
}

impl From<DevEnv> for String {
    fn from(d: DevEnv) -> Self {
        d.name().to_string()
    }
}

/// Kind of artifact a project produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Static library
    Lib,
    /// Dynamic library
    Dll,
    /// Executable program
    Exe,
}

impl OutputKind {
    /// Get output kind name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Lib => "lib",
            Self::Dll => "dll",
            Self::Exe => "exe",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build backend that will consume the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildSystem {
    MsBuild,
    FastBuild,
    Make,
    Ninja,
}

impl BuildSystem {
    /// Get build system name
    pub fn name(&self) -> &'static str {
        match self {
            Self::MsBuild => "msbuild",
            Self::FastBuild => "fastbuild",
            Self::Make => "make",
            Self::Ninja => "ninja",
        }
    }
}

/// A value of a flag axis that can be combined into a [`FlagSet`]
pub trait Flag: Copy + Eq + 'static {
    /// Every flag value in bit order
    const ALL: &'static [Self];

    /// Axis name used in error messages
    const AXIS: &'static str;

    /// Bit position of this flag
    fn index(self) -> u32;

    /// Lowercase name
    fn name(self) -> &'static str;

    /// Parse a lowercase name
    fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|flag| flag.name().eq_ignore_ascii_case(name))
    }
}

/// Optimization level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Optimization {
    Debug,
    Release,
    Retail,
}

impl Flag for Optimization {
    const ALL: &'static [Self] = &[Self::Debug, Self::Release, Self::Retail];
    const AXIS: &'static str = "optimization";

    fn index(self) -> u32 {
        self as u32
    }

    fn name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
            Self::Retail => "retail",
        }
    }
}

/// How the built program is launched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchMode {
    Editor,
    Client,
    Server,
}

impl Flag for LaunchMode {
    const ALL: &'static [Self] = &[Self::Editor, Self::Client, Self::Server];
    const AXIS: &'static str = "launch_mode";

    fn index(self) -> u32 {
        self as u32
    }

    fn name(self) -> &'static str {
        match self {
            Self::Editor => "editor",
            Self::Client => "client",
            Self::Server => "server",
        }
    }
}

/// Bitmask of flag values requested on one axis
pub struct FlagSet<F: Flag> {
    bits: u32,
    _marker: PhantomData<F>,
}

pub type OptimizationSet = FlagSet<Optimization>;
pub type LaunchModeSet = FlagSet<LaunchMode>;

impl<F: Flag> FlagSet<F> {
    /// The empty set
    pub fn empty() -> Self {
        Self {
            bits: 0,
            _marker: PhantomData,
        }
    }

    /// Every flag of the axis
    pub fn all() -> Self {
        F::ALL.iter().copied().collect()
    }

    /// Whether `flag` is set
    pub fn contains(&self, flag: F) -> bool {
        self.bits & (1 << flag.index()) != 0
    }

    /// Set `flag`
    pub fn insert(&mut self, flag: F) {
        self.bits |= 1 << flag.index();
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Explode the set into single flags, in bit order
    pub fn iter(&self) -> impl Iterator<Item = F> + '_ {
        F::ALL.iter().copied().filter(move |flag| self.contains(*flag))
    }
}

impl<F: Flag> Clone for FlagSet<F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F: Flag> Copy for FlagSet<F> {}

impl<F: Flag> PartialEq for FlagSet<F> {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl<F: Flag> Eq for FlagSet<F> {}

impl<F: Flag> Default for FlagSet<F> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<F: Flag> fmt::Debug for FlagSet<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|flag| flag.name())).finish()
    }
}

impl<F: Flag> FromIterator<F> for FlagSet<F> {
    fn from_iter<I: IntoIterator<Item = F>>(iter: I) -> Self {
        let mut set = Self::empty();
        for flag in iter {
            set.insert(flag);
        }
        set
    }
}

impl<F: Flag> From<F> for FlagSet<F> {
    fn from(flag: F) -> Self {
        std::iter::once(flag).collect()
    }
}

impl<F: Flag> BitOr<F> for FlagSet<F> {
    type Output = Self;

    fn bitor(mut self, rhs: F) -> Self {
        self.insert(rhs);
        self
    }
}

impl BitOr for Optimization {
    type Output = OptimizationSet;

    fn bitor(self, rhs: Self) -> OptimizationSet {
        FlagSet::from(self) | rhs
    }
}

impl BitOr for LaunchMode {
    type Output = LaunchModeSet;

    fn bitor(self, rhs: Self) -> LaunchModeSet {
        FlagSet::from(self) | rhs
    }
}

impl<F: Flag> Serialize for FlagSet<F> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(|flag| flag.name()))
    }
}

impl<'de, F: Flag> Deserialize<'de> for FlagSet<F> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        names
            .iter()
            .map(|name| {
                F::parse(name).ok_or_else(|| {
                    serde::de::Error::custom(format!("unknown {} value '{}'", F::AXIS, name))
                })
            })
            .collect()
    }
}

/// One concrete build variant
///
/// Two targets are equal iff every field matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub platform: Platform,
    pub dev_env: DevEnv,
    pub optimization: Optimization,
    pub output_kind: OutputKind,
    pub launch_mode: LaunchMode,
    pub build_system: BuildSystem,
}

impl Target {
    /// Create a target from its six axis values
    pub fn new(
        platform: Platform,
        dev_env: DevEnv,
        optimization: Optimization,
        output_kind: OutputKind,
        launch_mode: LaunchMode,
        build_system: BuildSystem,
    ) -> Self {
        Self {
            platform,
            dev_env,
            optimization,
            output_kind,
            launch_mode,
            build_system,
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_optimization(mut self, optimization: Optimization) -> Self {
        self.optimization = optimization;
        self
    }

    pub fn with_launch_mode(mut self, launch_mode: LaunchMode) -> Self {
        self.launch_mode = launch_mode;
        self
    }

    pub fn with_output_kind(mut self, output_kind: OutputKind) -> Self {
        self.output_kind = output_kind;
        self
    }

    /// Stable textual identity, e.g. `win64-vs2022-debug-lib-editor-fastbuild`
    pub fn key(&self) -> String {
        format!(
            "{}-{}-{}-{}-{}-{}",
            self.platform.name(),
            self.dev_env.name(),
            self.optimization.name(),
            self.output_kind.name(),
            self.launch_mode.name(),
            self.build_system.name()
        )
    }

    /// Configuration name, e.g. `Debug_Editor`
    pub fn configuration_name(&self) -> String {
        format!(
            "{}_{}",
            capitalize(self.optimization.name()),
            capitalize(self.launch_mode.name())
        )
    }
}

impl Default for Target {
    fn default() -> Self {
        Self {
            platform: Platform::Win64,
            dev_env: DevEnv::Vs2022,
            optimization: Optimization::Debug,
            output_kind: OutputKind::Lib,
            launch_mode: LaunchMode::Editor,
            build_system: BuildSystem::FastBuild,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

pub(crate) fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_key() {
        assert_eq!(
            Target::default().key(),
            "win64-vs2022-debug-lib-editor-fastbuild"
        );
    }

    #[test]
    fn test_configuration_name() {
        let target = Target::default()
            .with_optimization(Optimization::Release)
            .with_launch_mode(LaunchMode::Server);
        assert_eq!(target.configuration_name(), "Release_Server");
    }

    #[test]
    fn test_targets_equal_iff_all_fields_match() {
        let a = Target::default();
        let b = Target::default();
        assert_eq!(a, b);
        assert_ne!(a, b.clone().with_output_kind(OutputKind::Dll));
        assert_ne!(a, b.with_platform(Platform::Linux));
    }

    #[test]
    fn test_flag_set_iterates_in_bit_order() {
        let set = LaunchMode::Server | LaunchMode::Editor;
        let flags: Vec<_> = set.iter().collect();
        assert_eq!(flags, vec![LaunchMode::Editor, LaunchMode::Server]);
        assert_eq!(set.len(), 2);
        assert!(!set.contains(LaunchMode::Client));
    }

    #[test]
    fn test_flag_set_serde() {
        let set = Optimization::Debug | Optimization::Release;
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["debug","release"]"#);

        let parsed: OptimizationSet = serde_json::from_str(r#"["release","Debug"]"#).unwrap();
        assert_eq!(parsed, set);

        let err = serde_json::from_str::<OptimizationSet>(r#"["fast"]"#).unwrap_err();
        assert!(err.to_string().contains("unknown optimization value 'fast'"));
    }

    #[test]
    fn test_platform_custom_roundtrip() {
        assert_eq!(Platform::from("WIN64".to_string()), Platform::Win64);
        let custom = Platform::from("switch".to_string());
        assert_eq!(custom, Platform::Custom("switch".to_string()));
        assert_eq!(custom.name(), "switch");
    }
}

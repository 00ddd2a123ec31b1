//! Target axis expansion
//!
//! Turns the axis value-sets a project requests into the concrete list of
//! [`Target`]s it is built for.

use crate::error::{BuildError, BuildResult};
use crate::target::{
    BuildSystem, DevEnv, LaunchMode, LaunchModeSet, Optimization, OptimizationSet, OutputKind,
    Platform, Target,
};
use serde::{Deserialize, Serialize};

/// Axis value-sets requested by a project or solution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetAxes {
    pub platforms: Vec<Platform>,
    pub dev_envs: Vec<DevEnv>,
    /// Exploded: one target per set flag
    pub optimizations: OptimizationSet,
    pub output_kinds: Vec<OutputKind>,
    /// Exploded: one target per set flag
    pub launch_modes: LaunchModeSet,
    pub build_systems: Vec<BuildSystem>,
}

impl TargetAxes {
    /// Axes with a single value on every axis, taken from `target`
    pub fn single(target: &Target) -> Self {
        Self {
            platforms: vec![target.platform.clone()],
            dev_envs: vec![target.dev_env.clone()],
            optimizations: target.optimization.into(),
            output_kinds: vec![target.output_kind],
            launch_modes: target.launch_mode.into(),
            build_systems: vec![target.build_system],
        }
    }

    pub fn with_platforms(mut self, platforms: Vec<Platform>) -> Self {
        self.platforms = platforms;
        self
    }

    pub fn with_dev_envs(mut self, dev_envs: Vec<DevEnv>) -> Self {
        self.dev_envs = dev_envs;
        self
    }

    pub fn with_optimizations(mut self, optimizations: impl Into<OptimizationSet>) -> Self {
        self.optimizations = optimizations.into();
        self
    }

    pub fn with_output_kinds(mut self, output_kinds: Vec<OutputKind>) -> Self {
        self.output_kinds = output_kinds;
        self
    }

    pub fn with_launch_modes(mut self, launch_modes: impl Into<LaunchModeSet>) -> Self {
        self.launch_modes = launch_modes.into();
        self
    }

    pub fn with_build_systems(mut self, build_systems: Vec<BuildSystem>) -> Self {
        self.build_systems = build_systems;
        self
    }

    /// Check that no axis is empty
    pub fn validate(&self) -> BuildResult<()> {
        if self.platforms.is_empty() {
            return Err(BuildError::invalid_axis("platform", "no values requested"));
        }
        if self.dev_envs.is_empty() {
            return Err(BuildError::invalid_axis("dev_env", "no values requested"));
        }
        if self.optimizations.is_empty() {
            return Err(BuildError::invalid_axis(
                "optimization",
                "no values requested",
            ));
        }
        if self.output_kinds.is_empty() {
            return Err(BuildError::invalid_axis("output_kind", "no values requested"));
        }
        if self.launch_modes.is_empty() {
            return Err(BuildError::invalid_axis("launch_mode", "no values requested"));
        }
        if self.build_systems.is_empty() {
            return Err(BuildError::invalid_axis(
                "build_system",
                "no values requested",
            ));
        }
        for platform in &self.platforms {
            check_key_segment("platform", platform.name())?;
        }
        for dev_env in &self.dev_envs {
            check_key_segment("dev_env", dev_env.name())?;
        }
        Ok(())
    }

    /// Whether `target` is one of the targets these axes expand to
    pub fn contains(&self, target: &Target) -> bool {
        self.platforms.contains(&target.platform)
            && self.dev_envs.contains(&target.dev_env)
            && self.optimizations.contains(target.optimization)
            && self.output_kinds.contains(&target.output_kind)
            && self.launch_modes.contains(target.launch_mode)
            && self.build_systems.contains(&target.build_system)
    }

    /// Expand the axes into concrete targets
    ///
    /// Targets are emitted nested in axis declaration order (platform outermost,
    /// build system innermost). Repeated values in a list are only expanded once.
    pub fn expand(&self) -> BuildResult<Vec<Target>> {
        self.validate()?;

        let platforms = dedup(&self.platforms);
        let dev_envs = dedup(&self.dev_envs);
        let optimizations: Vec<Optimization> = self.optimizations.iter().collect();
        let output_kinds = dedup(&self.output_kinds);
        let launch_modes: Vec<LaunchMode> = self.launch_modes.iter().collect();
        let build_systems = dedup(&self.build_systems);

        let mut targets = Vec::with_capacity(
            platforms.len()
                * dev_envs.len()
                * optimizations.len()
                * output_kinds.len()
                * launch_modes.len()
                * build_systems.len(),
        );

        for platform in &platforms {
            for dev_env in &dev_envs {
                for optimization in &optimizations {
                    for output_kind in &output_kinds {
                        for launch_mode in &launch_modes {
                            for build_system in &build_systems {
                                targets.push(Target::new(
                                    platform.clone(),
                                    dev_env.clone(),
                                    *optimization,
                                    *output_kind,
                                    *launch_mode,
                                    *build_system,
                                ));
                            }
                        }
                    }
                }
            }
        }

        Ok(targets)
    }
}

impl Default for TargetAxes {
    /// The engine-wide default: win64 / vs2022 / debug+release / lib /
    /// every launch mode / fastbuild
    fn default() -> Self {
        Self {
            platforms: vec![Platform::Win64],
            dev_envs: vec![DevEnv::Vs2022],
            optimizations: Optimization::Debug | Optimization::Release,
            output_kinds: vec![OutputKind::Lib],
            launch_modes: LaunchModeSet::all(),
            build_systems: vec![BuildSystem::FastBuild],
        }
    }
}

/// Axis names are joined with `-` in target keys, so a name must not contain one
fn check_key_segment(axis: &'static str, name: &str) -> BuildResult<()> {
    if name.is_empty() || name.contains('-') || name.contains(char::is_whitespace) {
        return Err(BuildError::invalid_axis(
            axis,
            format!("'{}' is not a valid name (empty, '-' or whitespace)", name),
        ));
    }
    Ok(())
}

fn dedup<T: Clone + PartialEq>(values: &[T]) -> Vec<T> {
    let mut unique: Vec<T> = Vec::with_capacity(values.len());
    for value in values {
        if !unique.contains(value) {
            unique.push(value.clone());
        }
    }
    unique
}

/// Merge several target lists, keeping first-seen order and dropping repeats
pub fn union_targets<'a>(lists: impl IntoIterator<Item = &'a [Target]>) -> Vec<Target> {
    let mut merged = indexmap::IndexSet::new();
    for list in lists {
        for target in list {
            merged.insert(target.clone());
        }
    }
    merged.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn base() -> TargetAxes {
        TargetAxes::single(&Target::default())
    }

    #[test]
    fn test_explodes_optimization_flags() {
        let axes = base()
            .with_platforms(vec![Platform::Custom("x".to_string())])
            .with_optimizations(Optimization::Debug | Optimization::Release);
        let targets = axes.expand().unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].optimization, Optimization::Debug);
        assert_eq!(targets[1].optimization, Optimization::Release);
    }

    #[rstest]
    #[case(Platform::Custom("xbox-one".to_string()), DevEnv::Vs2022)]
    #[case(Platform::Win64, DevEnv::Custom("one-gdk".to_string()))]
    #[case(Platform::Custom(String::new()), DevEnv::Vs2022)]
    fn test_rejects_names_that_break_target_keys(#[case] platform: Platform, #[case] dev_env: DevEnv) {
        let axes = base()
            .with_platforms(vec![platform])
            .with_dev_envs(vec![dev_env]);
        match axes.expand() {
            Err(BuildError::InvalidAxis { .. }) => {}
            other => panic!("Expected InvalidAxis error, got {:?}", other),
        }
    }

    #[test]
    fn test_contains_matches_expansion() {
        let axes = base()
            .with_platforms(vec![Platform::Win64, Platform::Linux])
            .with_optimizations(Optimization::Debug | Optimization::Release);
        for target in axes.expand().unwrap() {
            assert!(axes.contains(&target));
        }
        assert!(!axes.contains(&Target::default().with_platform(Platform::MacOs)));
        assert!(!axes.contains(&Target::default().with_launch_mode(LaunchMode::Server)));
    }

    #[test]
    fn test_explodes_launch_mode_bits() {
        let axes = base().with_launch_modes(LaunchModeSet::all());
        let modes: Vec<_> = axes
            .expand()
            .unwrap()
            .into_iter()
            .map(|t| t.launch_mode)
            .collect();
        assert_eq!(
            modes,
            vec![LaunchMode::Editor, LaunchMode::Client, LaunchMode::Server]
        );
    }

    #[test]
    fn test_cartesian_product_size_and_order() {
        let axes = TargetAxes::default().with_platforms(vec![Platform::Win64, Platform::Linux]);
        let targets = axes.expand().unwrap();
        // 2 platforms * 2 optimizations * 3 launch modes
        assert_eq!(targets.len(), 12);
        assert!(targets[..6].iter().all(|t| t.platform == Platform::Win64));
        assert!(targets[6..].iter().all(|t| t.platform == Platform::Linux));
        assert_eq!(targets[0].optimization, Optimization::Debug);
        assert_eq!(targets[3].optimization, Optimization::Release);
    }

    #[test]
    fn test_repeated_values_expand_once() {
        let axes = base().with_platforms(vec![Platform::Win64, Platform::Win64]);
        assert_eq!(axes.expand().unwrap().len(), 1);
    }

    #[rstest]
    #[case::platform(base().with_platforms(vec![]), "platform")]
    #[case::dev_env(base().with_dev_envs(vec![]), "dev_env")]
    #[case::optimization(base().with_optimizations(OptimizationSet::empty()), "optimization")]
    #[case::output_kind(base().with_output_kinds(vec![]), "output_kind")]
    #[case::launch_mode(base().with_launch_modes(LaunchModeSet::empty()), "launch_mode")]
    #[case::build_system(base().with_build_systems(vec![]), "build_system")]
    fn test_empty_axis_is_invalid(#[case] axes: TargetAxes, #[case] expected: &str) {
        match axes.expand() {
            Err(BuildError::InvalidAxis { axis, .. }) => assert_eq!(axis, expected),
            other => panic!("Expected InvalidAxis error, got {:?}", other),
        }
    }

    #[test]
    fn test_expansion_is_stable() {
        let axes = TargetAxes::default();
        assert_eq!(axes.expand().unwrap(), axes.expand().unwrap());
    }

    #[test]
    fn test_union_targets_keeps_first_order() {
        let a = base().expand().unwrap();
        let b = TargetAxes::default().expand().unwrap();
        let merged = union_targets([a.as_slice(), b.as_slice()]);
        assert_eq!(merged.len(), b.len());
        assert_eq!(merged[0], a[0]);
    }
}

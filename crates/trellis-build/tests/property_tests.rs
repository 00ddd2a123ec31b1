//! Property tests for axis expansion, ordering and plan determinism

use proptest::prelude::*;
use std::collections::HashSet;
use trellis_build::{
    emit_target, BuildSystem, ConfigurationCompiler, ConfigurationRule, DependencyEdge,
    DescriptorStore, DevEnv, LaunchMode, Optimization, OutputKind, Platform, Project, Target,
    TargetAxes, TargetPredicate, Visibility, Workspace, WorkspaceBuilder,
};

const PROJECTS: usize = 8;

fn name(i: usize) -> String {
    format!("P{}", i)
}

/// Projects P0..P7, each exporting one include path, with edges pointing from
/// higher to lower indices so the graph is always acyclic
fn workspace(edges: &[(usize, usize, bool)]) -> Workspace {
    let mut builder = WorkspaceBuilder::new();
    for i in 0..PROJECTS {
        let project = name(i);
        builder.project(Project::new(&project, &project)).unwrap();
        builder
            .project_rule(
                &project,
                ConfigurationRule::new("exports", TargetPredicate::all(), move |conf, _| {
                    conf.add_include_path(format!("P{}/include", i));
                }),
            )
            .unwrap();
    }
    for &(a, b, public) in edges {
        if a == b {
            continue;
        }
        let (from, to) = (a.max(b), a.min(b));
        let visibility = if public {
            Visibility::Public
        } else {
            Visibility::Private
        };
        builder.dependency(DependencyEdge::new(name(from), name(to), visibility));
    }
    builder.finish().unwrap()
}

fn roots() -> Vec<String> {
    (0..PROJECTS).map(name).collect()
}

fn edges_strategy() -> impl Strategy<Value = Vec<(usize, usize, bool)>> {
    prop::collection::vec((0..PROJECTS, 0..PROJECTS, any::<bool>()), 0..24)
}

proptest! {
    #[test]
    fn prop_axis_expansion_is_cartesian_product(
        platforms in prop::sample::subsequence(
            vec![Platform::Win64, Platform::Linux, Platform::MacOs], 1..=3),
        dev_envs in prop::sample::subsequence(vec![DevEnv::Vs2022, DevEnv::Make], 1..=2),
        optimizations in prop::sample::subsequence(
            vec![Optimization::Debug, Optimization::Release, Optimization::Retail], 1..=3),
        output_kinds in prop::sample::subsequence(
            vec![OutputKind::Lib, OutputKind::Dll, OutputKind::Exe], 1..=3),
        launch_modes in prop::sample::subsequence(
            vec![LaunchMode::Editor, LaunchMode::Client, LaunchMode::Server], 1..=3),
        build_systems in prop::sample::subsequence(
            vec![BuildSystem::FastBuild, BuildSystem::Ninja], 1..=2),
    ) {
        let expected = platforms.len()
            * dev_envs.len()
            * optimizations.len()
            * output_kinds.len()
            * launch_modes.len()
            * build_systems.len();

        let axes = TargetAxes::default()
            .with_platforms(platforms)
            .with_dev_envs(dev_envs)
            .with_optimizations(optimizations.into_iter().collect::<trellis_build::OptimizationSet>())
            .with_output_kinds(output_kinds)
            .with_launch_modes(launch_modes.into_iter().collect::<trellis_build::LaunchModeSet>())
            .with_build_systems(build_systems);

        let targets = axes.expand().unwrap();
        prop_assert_eq!(targets.len(), expected);
        let unique: HashSet<_> = targets.iter().map(Target::key).collect();
        prop_assert_eq!(unique.len(), expected);
    }

    #[test]
    fn prop_order_puts_dependencies_first(edges in edges_strategy()) {
        let ws = workspace(&edges);
        let resolution = ConfigurationCompiler::new(&ws)
            .resolve_target(&roots(), &Target::default(), &DescriptorStore::new())
            .unwrap();

        let position = |project: &str| resolution.order.iter().position(|p| p == project);
        for edge in ws.graph().edges() {
            prop_assert!(position(edge.to.as_str()) < position(edge.from.as_str()));
        }
        for descriptor in &resolution.descriptors {
            for dep in &descriptor.dependencies {
                prop_assert!(position(dep.as_str()) < position(descriptor.project.as_str()));
            }
        }

        // Every descriptor only references already emitted projects
        prop_assert!(emit_target(&resolution.target, &resolution.order, &resolution.descriptors).is_ok());
    }

    #[test]
    fn prop_direct_dependency_exports_are_visible(edges in edges_strategy()) {
        let ws = workspace(&edges);
        let resolution = ConfigurationCompiler::new(&ws)
            .resolve_target(&roots(), &Target::default(), &DescriptorStore::new())
            .unwrap();

        for edge in ws.graph().edges() {
            let from = resolution
                .descriptors
                .iter()
                .find(|d| d.project == edge.from)
                .unwrap();
            let include = format!("{}/include", edge.to);
            prop_assert!(from.include_paths.contains(&include));
        }
    }

    #[test]
    fn prop_parallel_resolution_matches_sequential(edges in edges_strategy()) {
        let ws = workspace(&edges);
        let target = Target::default();

        let parallel = ConfigurationCompiler::new(&ws)
            .resolve_target(&roots(), &target, &DescriptorStore::new())
            .unwrap();
        let sequential = ConfigurationCompiler::new(&ws)
            .parallel(false)
            .resolve_target(&roots(), &target, &DescriptorStore::new())
            .unwrap();

        let a = emit_target(&target, &parallel.order, &parallel.descriptors).unwrap();
        let b = emit_target(&target, &sequential.order, &sequential.descriptors).unwrap();
        prop_assert_eq!(a, b);
    }
}

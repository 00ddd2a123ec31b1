//! End-to-end planning tests
//!
//! Manifests are written to a temporary workspace, loaded through the config
//! loader, planned and emitted.

use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use trellis_build::{
    emit, load_workspace, stream, workspace_from_manifest, BuildDescriptor, CollectingExecutor,
    ConfigLoader, ErrorKind, ExecutorInput, Manifest, PlanConfig, Planner, Workspace,
};

const ROOT_MANIFEST: &str = r#"
include = ["Engine", "ThirdParty/zlib.trellis.toml"]

[workspace]
name = "Sample"

[workspace.variables]
ThirdParty = "/opt/thirdparty"

[axes.engine]
platforms = ["win64"]
optimizations = ["debug", "release"]
launch_modes = ["editor", "client"]

[[rule_set]]
id = "common"

[[rule_set.rule]]
name = "public-headers"
include_paths = ["[project.SourceRootPath]/Public"]
private_include_paths = ["[project.SourceRootPath]/Private"]

[[rule_set.rule]]
name = "debug"
when = { optimizations = ["debug"] }
defines = ["_DEBUG"]

[[solution]]
name = "Game"
projects = ["Game"]
startup_project = "Game"
axes = "engine"
"#;

const CORE_FRAGMENT: &str = r#"
[[project]]
name = "Core"
rule_set = "common"
axes = "engine"

[[project.rule]]
name = "exports"
export_defines = ["CORE_API"]
library_files = ["Core.lib"]
"#;

const RENDERER_FRAGMENT: &str = r#"
[[project]]
name = "Renderer"
rule_set = "common"
axes = "engine"
public_dependencies = ["Core"]
private_dependencies = ["zlib"]

[[project.rule]]
name = "exports"
export_defines = ["RENDERER_API"]
"#;

const GAME_FRAGMENT: &str = r#"
[[project]]
name = "Game"
rule_set = "common"
axes = "engine"
public_dependencies = ["Renderer"]

[[project.rule]]
name = "program"
output_kind = "exe"
target_file_name = "[project.Name]_[conf.Name]"
"#;

const ZLIB_FRAGMENT: &str = r#"
[[project]]
name = "zlib"
kind = "export"
axes = "engine"

[[project.rule]]
name = "package"
include_paths = ["%ThirdParty%/zlib/include"]
library_files = ["zlib.lib"]
"#;

/// Write the sample workspace; fragments live in their own directories
fn create_workspace() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::create_dir_all(root.join("Engine").join("Game")).unwrap();
    fs::create_dir_all(root.join("ThirdParty")).unwrap();

    fs::write(root.join("trellis.toml"), ROOT_MANIFEST).unwrap();
    fs::write(root.join("Engine").join("core.trellis.toml"), CORE_FRAGMENT).unwrap();
    fs::write(root.join("Engine").join("renderer.trellis.toml"), RENDERER_FRAGMENT).unwrap();
    fs::write(root.join("Engine").join("Game").join("game.trellis.toml"), GAME_FRAGMENT).unwrap();
    fs::write(root.join("ThirdParty").join("zlib.trellis.toml"), ZLIB_FRAGMENT).unwrap();
    temp_dir
}

fn load(root: &Path) -> Workspace {
    let config = ConfigLoader::new()
        .with_global_config_path(root.join("no-global.toml"))
        .load_from_directory(root)
        .unwrap();
    load_workspace(&config).unwrap()
}

fn descriptor<'a>(input: &'a ExecutorInput, key_part: &str, project: &str) -> &'a BuildDescriptor {
    input
        .targets
        .iter()
        .find(|t| t.key.contains(key_part))
        .and_then(|t| t.descriptors.iter().find(|d| d.project == project))
        .unwrap()
}

#[test]
fn test_solution_plan_end_to_end() {
    let temp_dir = create_workspace();
    let root = temp_dir.path();
    let workspace = load(root);

    let outcome = Planner::new(&workspace).with_solution("Game").plan().unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.stats.total_targets, 4);
    assert_eq!(outcome.startup_project.as_deref(), Some("Game"));

    let input = emit(&outcome).unwrap();
    let keys: Vec<_> = input.targets.iter().map(|t| t.key.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "win64-vs2022-debug-lib-editor-fastbuild",
            "win64-vs2022-debug-lib-client-fastbuild",
            "win64-vs2022-release-lib-editor-fastbuild",
            "win64-vs2022-release-lib-client-fastbuild",
        ]
    );

    // Ties between ready projects go to the earlier declaration
    for plan in &input.targets {
        assert_eq!(plan.order, vec!["Core", "zlib", "Renderer", "Game"]);
    }
}

#[test]
fn test_exports_follow_visibility() {
    let temp_dir = create_workspace();
    let root = temp_dir.path();
    let workspace = load(root);
    let input = emit(&Planner::new(&workspace).with_solution("Game").plan().unwrap()).unwrap();

    let core_public = format!("{}/Public", root.join("Core").display());
    let renderer_public = format!("{}/Public", root.join("Renderer").display());
    let zlib_include = "/opt/thirdparty/zlib/include".to_string();

    let renderer = descriptor(&input, "debug-lib-editor", "Renderer");
    assert!(renderer.include_paths.contains(&core_public));
    assert!(renderer.include_paths.contains(&zlib_include));
    assert!(renderer.library_files.contains(&"zlib.lib".to_string()));
    assert!(renderer.defines.contains_key("CORE_API"));

    let game = descriptor(&input, "debug-lib-editor", "Game");
    assert!(game.include_paths.contains(&core_public));
    assert!(game.include_paths.contains(&renderer_public));
    assert!(!game.include_paths.contains(&zlib_include));
    assert!(game.defines.contains_key("CORE_API"));
    assert!(game.defines.contains_key("RENDERER_API"));
    assert!(game.defines.contains_key("_DEBUG"));
    assert_eq!(game.dependencies, vec!["Core", "zlib", "Renderer"]);
    assert_eq!(game.target_file_name.as_deref(), Some("Game_Debug_Editor"));

    let release_game = descriptor(&input, "release-lib-client", "Game");
    assert!(!release_game.defines.contains_key("_DEBUG"));
    assert!(release_game
        .defines
        .contains_key("TRELLIS_CONFIGURATION_RELEASE_CLIENT"));
}

#[test]
fn test_export_project_has_no_outputs() {
    let temp_dir = create_workspace();
    let workspace = load(temp_dir.path());
    let input = emit(&Planner::new(&workspace).with_solution("Game").plan().unwrap()).unwrap();

    let zlib = descriptor(&input, "release-lib-editor", "zlib");
    assert_eq!(zlib.output_path, None);
    assert_eq!(zlib.intermediate_path, None);

    let core = descriptor(&input, "release-lib-editor", "Core");
    let expected = format!("{}/Binaries/Release_Editor", temp_dir.path().display());
    assert_eq!(core.output_path.as_deref(), Some(expected.as_str()));
}

#[test]
fn test_parallel_and_sequential_plans_are_identical() {
    let temp_dir = create_workspace();
    let workspace = load(temp_dir.path());

    let parallel = Planner::new(&workspace)
        .with_config(PlanConfig {
            jobs: Some(4),
            ..PlanConfig::default()
        })
        .plan()
        .unwrap();
    let sequential = Planner::new(&workspace).with_parallel(false).plan().unwrap();

    assert_eq!(
        emit(&parallel).unwrap().to_json().unwrap(),
        emit(&sequential).unwrap().to_json().unwrap()
    );
}

#[test]
fn test_stream_delivers_producers_first() {
    let temp_dir = create_workspace();
    let workspace = load(temp_dir.path());
    let outcome = Planner::new(&workspace)
        .with_targets(vec!["win64-vs2022-debug-lib-editor-fastbuild".to_string()])
        .plan()
        .unwrap();
    let input = emit(&outcome).unwrap();

    let mut executor = CollectingExecutor::default();
    stream(&input, &mut executor).unwrap();

    assert_eq!(executor.targets, vec!["win64-vs2022-debug-lib-editor-fastbuild"]);
    let projects: Vec<_> = executor
        .descriptors
        .iter()
        .map(|d| d.project.as_str())
        .collect();
    assert_eq!(projects, vec!["Core", "zlib", "Renderer", "Game"]);
}

#[test]
fn test_failing_target_does_not_block_others() {
    let manifest = Manifest::parse(
        r#"
[axes.both]
platforms = ["win64", "linux"]
optimizations = ["debug"]
launch_modes = ["client"]

[[project]]
name = "Audio"
axes = "both"

[[project.rule]]
name = "windows-only"
when = { platforms = ["win64"] }
library_files = ["xaudio2.lib"]

[[project]]
name = "Game"
axes = "both"
public_dependencies = ["Audio"]
"#,
    )
    .unwrap();
    let workspace = workspace_from_manifest(&manifest, Path::new("/ws")).unwrap();

    let outcome = Planner::new(&workspace).plan().unwrap();
    assert!(!outcome.is_success());
    assert_eq!(outcome.stats.planned_targets, 1);
    assert_eq!(outcome.stats.failed_targets, 1);
    assert!(outcome.failures.has_kind(ErrorKind::MissingTargetVariant));

    let failure = outcome.failures.iter().next().unwrap();
    assert!(failure.target.starts_with("linux-"));
    assert_eq!(failure.project.as_deref(), Some("Game"));

    let input = emit(&outcome).unwrap();
    assert_eq!(input.targets.len(), 1);
    assert!(input.targets[0].key.starts_with("win64-"));
}

#[test]
fn test_cycle_reported_per_target() {
    let manifest = Manifest::parse(
        r#"
[axes.one]
optimizations = ["debug"]
launch_modes = ["editor"]

[[project]]
name = "A"
axes = "one"
public_dependencies = ["B"]

[[project]]
name = "B"
axes = "one"

[[project.dependency]]
project = "A"
visibility = "private"
when = { platforms = ["win64"] }
"#,
    )
    .unwrap();
    let workspace = workspace_from_manifest(&manifest, Path::new("/ws")).unwrap();

    let outcome = Planner::new(&workspace).plan().unwrap();
    assert!(outcome.failures.has_kind(ErrorKind::CyclicDependency));
    let report = outcome.failures.to_string();
    assert!(report.contains("A -> B -> A"));
}

use mpm_core::manifest::{DependenciesMap, DependencyGroup, ProjectManifest, MANIFEST_NAME};
use mpm_util::errors::MpmError;
use tempfile::TempDir;

fn write_manifest(dir: &std::path::Path, content: &str) {
    std::fs::write(dir.join(MANIFEST_NAME), content).unwrap();
}

#[test]
fn find_fails_without_manifest() {
    let tmp = TempDir::new().unwrap();
    let err = ProjectManifest::find(tmp.path()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MpmError>(),
        Some(MpmError::MissingManifest { .. })
    ));
}

#[test]
fn reads_both_groups() {
    let tmp = TempDir::new().unwrap();
    write_manifest(
        tmp.path(),
        r#"{
  "name": "app",
  "dependencies": { "left-pad": "^1.0.0" },
  "devDependencies": { "jest": "~29.0.0" }
}"#,
    );
    let manifest = ProjectManifest::find(tmp.path()).unwrap();
    let map = manifest.dependencies_map().unwrap();
    assert_eq!(
        map.group(DependencyGroup::Dependencies).unwrap()["left-pad"],
        "^1.0.0"
    );
    assert_eq!(
        map.group(DependencyGroup::DevDependencies).unwrap()["jest"],
        "~29.0.0"
    );
    assert_eq!(map.len(), 2);
}

#[test]
fn missing_groups_are_none() {
    let tmp = TempDir::new().unwrap();
    write_manifest(tmp.path(), r#"{ "name": "app" }"#);
    let map = ProjectManifest::find(tmp.path())
        .unwrap()
        .dependencies_map()
        .unwrap();
    assert_eq!(map, DependenciesMap::default());
    assert!(map.is_empty());
}

#[test]
fn write_sorts_groups_and_preserves_other_fields() {
    let tmp = TempDir::new().unwrap();
    write_manifest(
        tmp.path(),
        r#"{
  "name": "app",
  "version": "1.0.0",
  "devDependencies": { "jest": "^29.0.0" },
  "scripts": { "test": "jest" }
}"#,
    );
    let manifest = ProjectManifest::find(tmp.path()).unwrap();
    let mut map = manifest.dependencies_map().unwrap();
    map.add_packages(
        &["zod".to_string(), "axios".to_string()],
        DependencyGroup::Dependencies,
    );
    map.group_mut(DependencyGroup::Dependencies)
        .insert("zod".to_string(), "^3.22.0".to_string());
    map.dev_dependencies = None;
    manifest.write_dependencies_map(&map).unwrap();

    let text = std::fs::read_to_string(manifest.path()).unwrap();
    let name = text.find("\"name\"").unwrap();
    let scripts = text.find("\"scripts\"").unwrap();
    assert!(name < scripts);
    assert!(!text.contains("devDependencies"));
    let axios = text.find("\"axios\"").unwrap();
    let zod = text.find("\"zod\"").unwrap();
    assert!(axios < zod);

    let reread = manifest.dependencies_map().unwrap();
    assert_eq!(reread.group(DependencyGroup::Dependencies).unwrap()["zod"], "^3.22.0");
    assert_eq!(reread.group(DependencyGroup::Dependencies).unwrap()["axios"], "");
}

#[test]
fn empty_group_is_omitted() {
    let tmp = TempDir::new().unwrap();
    write_manifest(tmp.path(), r#"{ "name": "app", "dependencies": { "a": "^1.0.0" } }"#);
    let manifest = ProjectManifest::find(tmp.path()).unwrap();
    let mut map = manifest.dependencies_map().unwrap();
    map.group_mut(DependencyGroup::Dependencies).clear();
    manifest.write_dependencies_map(&map).unwrap();
    let text = std::fs::read_to_string(manifest.path()).unwrap();
    assert!(!text.contains("dependencies"));
}

#[test]
fn add_packages_to_dev_group() {
    let mut map = DependenciesMap::default();
    map.add_packages(&["jest".to_string()], DependencyGroup::DevDependencies);
    assert!(map.dependencies.is_none());
    assert_eq!(map.dev_dependencies.as_ref().unwrap()["jest"], "");
}

#[test]
fn iter_lists_groups_in_order() {
    let mut map = DependenciesMap::default();
    map.group_mut(DependencyGroup::DevDependencies)
        .insert("b".to_string(), "^1".to_string());
    map.group_mut(DependencyGroup::Dependencies)
        .insert("a".to_string(), "^2".to_string());
    let all: Vec<_> = map.iter().collect();
    assert_eq!(
        all,
        vec![
            (DependencyGroup::Dependencies, "a", "^2"),
            (DependencyGroup::DevDependencies, "b", "^1"),
        ]
    );
}

#[test]
fn non_object_manifest_is_rejected() {
    let tmp = TempDir::new().unwrap();
    write_manifest(tmp.path(), "[]");
    let err = ProjectManifest::find(tmp.path())
        .unwrap()
        .dependencies_map()
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MpmError>(),
        Some(MpmError::Manifest { .. })
    ));
}

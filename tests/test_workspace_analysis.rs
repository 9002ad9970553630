//! End-to-end tests through `AnalysisHost`: workspace loading, incremental
//! re-indexing, type resolution and local rename.

use std::fs;
use std::path::Path;

use magik::hir::{AnalysisConfiguration, Definition, DefinitionKind, MethodDefinition, TypeString};
use magik::ide::{AnalysisHost, Resolution};
use magik::{LineCol, TextRange, TextSize};
use rstest::rstest;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn sorted_names(definitions: &[Definition]) -> Vec<String> {
    let mut names: Vec<String> = definitions.iter().map(|d| d.qualified_name().to_string()).collect();
    names.sort();
    names
}

fn user(name: &str) -> TypeString {
    TypeString::simple("user", name)
}

#[test]
fn test_load_workspace_indexes_modules_and_skips_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "rope/module.def", "rope_module\ndescription\n  Ropes.\nend\n");
    write(root, "rope/source/rope.magik", "def_slotted_exemplar(:rope, {{:items, _unset}})\n");
    write(root, "rope/source/methods.magik", "_method rope.size\n  >> 0\n_endmethod\n");
    write(root, "build/generated.magik", "def_mixin(:generated)\n");

    let host = AnalysisHost::with_configuration(AnalysisConfiguration::default().with_ignore(["build/**"]));
    let summary = host.load_workspace(root).unwrap();

    assert_eq!(summary.indexed, 3);
    assert_eq!(summary.failed, 0);
    assert!(!summary.cancelled);
    assert!(host.keeper().module("rope_module").is_some());

    let rope = host.keeper().get_definitions("user:rope");
    assert_eq!(rope.len(), 1);
    assert_eq!(rope[0].provenance().module.as_deref(), Some("rope_module"));
    assert!(host.keeper().get_definitions("user:generated").is_empty());
}

#[test]
fn test_reload_drops_files_that_disappeared() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "a.magik", "def_mixin(:a)\n");
    write(root, "b.magik", "def_mixin(:b)\n");

    let host = AnalysisHost::new();
    host.load_workspace(root).unwrap();
    fs::remove_file(root.join("b.magik")).unwrap();
    let summary = host.load_workspace(root).unwrap();

    assert_eq!(summary.removed, 1);
    assert_eq!(host.keeper().get_definitions("user:a").len(), 1);
    assert!(host.keeper().get_definitions("user:b").is_empty());
}

#[test]
fn test_reindexing_unchanged_file_is_idempotent() {
    let host = AnalysisHost::new();
    let source = "def_slotted_exemplar(:rope, {})\n_method rope.add(item)\n_endmethod\n";

    let first = host.set_file_content("/ws/rope.magik", source);
    let before = sorted_names(&host.keeper().get_definitions_in_file(first.file));
    let second = host.set_file_content("/ws/rope.magik", source);
    let after = sorted_names(&host.keeper().get_definitions_in_file(second.file));

    assert_eq!(first.file, second.file);
    assert!(second.delta.is_empty());
    assert_eq!(before, after);
}

#[test]
fn test_deleting_file_removes_only_its_definitions() {
    let host = AnalysisHost::new();
    host.set_file_content("/ws/a.magik", "def_mixin(:a)\n_method a.m _endmethod\n");
    host.set_file_content("/ws/b.magik", "def_mixin(:b)\n");
    let total = host.keeper().len();

    host.remove_file("/ws/a.magik");

    assert_eq!(host.keeper().len(), total - 2);
    assert!(host.keeper().get_definitions("user:a").is_empty());
    assert_eq!(host.keeper().get_definitions("user:b").len(), 1);
    assert!(host.file_id("/ws/a.magik").is_none());
}

#[test]
fn test_failed_parse_empties_partition() {
    let host = AnalysisHost::new();
    let outcome = host.set_file_content("/ws/a.magik", "def_mixin(:a)\n");
    assert_eq!(host.keeper().get_definitions_in_file(outcome.file).len(), 1);

    let outcome = host.set_file_content("/ws/a.magik", "def_mixin(:a)\n_method a.broken\n");

    assert!(outcome.parse_error);
    assert!(host.keeper().get_definitions_in_file(outcome.file).is_empty());
    assert_eq!(host.analysis().diagnostics(outcome.file).len(), 1);
}

#[test]
fn test_cyclic_mixins_across_files() {
    let host = AnalysisHost::new();
    host.set_file_content("/ws/a.magik", "def_mixin(:a, {:b})\n");
    host.set_file_content("/ws/b.magik", "def_mixin(:b, {:a})\n");

    let resolver = host.analysis().type_resolver();

    assert_eq!(resolver.get_parents(&user("a")).to_vec(), vec![user("b")]);
    assert_eq!(resolver.get_parents(&user("b")).to_vec(), vec![user("a")]);
}

#[rstest]
#[case(":readonly", [false, true, true])]
#[case(":public", [false, false, false])]
#[case(":private", [true, true, true])]
fn test_shared_variable_accessors(#[case] flavour: &str, #[case] private: [bool; 3]) {
    let host = AnalysisHost::new();
    let source = format!("_package sw\nobject.define_shared_variable(:x, 1, {flavour})\n");
    host.set_file_content("/ws/shared.magik", &source);

    let resolver = host.analysis().type_resolver();
    let accessors: Vec<std::sync::Arc<MethodDefinition>> = ["x", "x<<", "x<<<"]
        .iter()
        .map(|name| resolver.get_method(&TypeString::SW_OBJECT, name).expect(name))
        .collect();

    let flags: Vec<bool> = accessors.iter().map(|m| m.is_private()).collect();
    assert_eq!(flags, private.to_vec());
}

#[test]
fn test_block_local_resolve_and_rename() {
    let host = AnalysisHost::new();
    let source = "_block _local var; show(var) _endblock";
    let outcome = host.set_file_content("/ws/block.magik", source);
    let analysis = host.analysis();
    let usage = LineCol::new(0, 24);

    match analysis.resolve(outcome.file, usage).unwrap() {
        Resolution::Local { name, declaration, .. } => {
            assert_eq!(name, "var");
            assert_eq!(declaration, TextRange::new(TextSize::from(14), TextSize::from(17)));
        }
        other => panic!("expected local, got {other:?}"),
    }

    let edits = analysis.rename(outcome.file, usage, "new").unwrap();
    let ranges: Vec<TextRange> = edits.iter().map(|e| e.range).collect();
    assert_eq!(
        ranges,
        vec![
            TextRange::new(TextSize::from(14), TextSize::from(17)),
            TextRange::new(TextSize::from(24), TextSize::from(27)),
        ]
    );
    assert!(edits.iter().all(|e| e.new_text == "new"));
}

#[test]
fn test_hover_after_method_is_added_in_another_file() {
    let host = AnalysisHost::new();
    let outcome = host.set_file_content(
        "/ws/use.magik",
        "_method a.b\n    _local r << rope.new()\n    r.size\n_endmethod\n",
    );
    let position = LineCol::new(2, 7);
    let before = host.analysis().hover(outcome.file, position).unwrap();
    assert!(before.contents.contains("Unknown method size"), "{}", before.contents);

    host.set_file_content(
        "/ws/rope.magik",
        "def_slotted_exemplar(:rope, {})\n\
         _method rope.new()\n  ## @return {_self}\n  >> _clone\n_endmethod\n\
         _method rope.size\n  ## Number of elements.\n  >> 0\n_endmethod\n",
    );
    let after = host.analysis().hover(outcome.file, position).unwrap();

    assert!(after.contents.contains("user:rope.size"), "{}", after.contents);
    assert!(after.contents.contains("Number of elements."), "{}", after.contents);
}

#[test]
fn test_modules_and_products_are_workspace_symbols() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "product.def", "rope_tools layered_product\n");
    write(root, "rope/module.def", "rope_module 1\n");
    write(root, "rope/rope.magik", "def_mixin(:rope_mixin)\n");

    let host = AnalysisHost::new();
    host.load_workspace(root).unwrap();
    let symbols = host.analysis().workspace_symbols("rope_");
    let kinds: Vec<(String, DefinitionKind)> = symbols.iter().map(|s| (s.name.to_string(), s.kind)).collect();

    assert_eq!(
        kinds,
        vec![
            ("rope_module".to_string(), DefinitionKind::Module),
            ("rope_tools".to_string(), DefinitionKind::Product),
            ("user:rope_mixin".to_string(), DefinitionKind::Exemplar),
        ]
    );
}

#[test]
fn test_open_buffer_shadows_disk_until_closed() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "a.magik", "def_mixin(:on_disk)\n");
    let host = AnalysisHost::new();
    host.set_file_content(root.join("a.magik"), "def_mixin(:in_editor)\n");

    host.load_workspace(root).unwrap();
    assert!(host.keeper().get_definitions("user:on_disk").is_empty());
    assert_eq!(host.keeper().get_definitions("user:in_editor").len(), 1);

    host.close_file(root.join("a.magik")).unwrap();
    assert_eq!(host.keeper().get_definitions("user:on_disk").len(), 1);
    assert!(host.keeper().get_definitions("user:in_editor").is_empty());
}

//! Tests for versioned relocation of document blocks

use rstest::{fixture, rstest};
use serde_yaml::Value;

use cfgshift::domain::{
    CommentLine, Document, DomainError, KeyFormat, NodeRole, Path, Position, Relocations,
    Relocator, VersionCatalog,
};
use cfgshift::infrastructure::yaml::{parse_document, parse_document_with};
use cfgshift::util::testing;

fn p(text: &str) -> Path {
    Path::parse(text, '.').unwrap()
}

fn value_at(doc: &Document, path: &str) -> Option<Value> {
    doc.get(&p(path)).and_then(|node| doc.value(node)).cloned()
}

fn comment(doc: &mut Document, path: &str, text: &str) {
    let node = doc.get(&p(path)).unwrap();
    doc.comments_mut(node).unwrap().set(
        NodeRole::Key,
        Position::Before,
        vec![CommentLine::block(text)],
    );
}

fn comment_at(doc: &Document, path: &str) -> Option<String> {
    let node = doc.get(&p(path))?;
    doc.comments(node)?
        .get(NodeRole::Key, Position::Before)
        .map(|lines| lines[0].text.clone())
}

#[fixture]
fn catalog() -> VersionCatalog {
    testing::init_test_setup();
    VersionCatalog::new(["1", "2", "3", "4"]).unwrap()
}

fn apply(doc: &mut Document, relocations: &Relocations, catalog: &VersionCatalog, from: &str, to: &str) {
    let current = catalog.parse(from).unwrap();
    let target = catalog.parse(to).unwrap();
    Relocator::new(relocations)
        .apply(doc, &current, &target)
        .unwrap();
}

#[rstest]
fn given_value_at_source_when_relocated_then_found_at_destination_and_parent_pruned(
    catalog: VersionCatalog,
) {
    let mut doc = parse_document("server:\n  port: 80\nname: x\n").unwrap();
    comment(&mut doc, "server.port", " the port");
    let mut relocations = Relocations::new();
    relocations.insert("2", p("server.port"), p("port"));

    apply(&mut doc, &relocations, &catalog, "1", "2");

    assert_eq!(value_at(&doc, "port"), Some(Value::from(80)));
    assert_eq!(comment_at(&doc, "port").as_deref(), Some(" the port"));
    assert!(doc.get(&p("server.port")).is_none());
    assert!(doc.get(&p("server")).is_none(), "empty parent section is pruned");
    assert!(doc.get(&p("name")).is_some());
}

#[rstest]
fn given_cyclic_relocation_when_applied_then_values_swapped_with_comments(
    catalog: VersionCatalog,
) {
    let mut doc = parse_document("a: Va\nb: Vb\n").unwrap();
    comment(&mut doc, "a", " about a");
    comment(&mut doc, "b", " about b");
    let mut relocations = Relocations::new();
    relocations.insert("2", p("a"), p("b"));
    relocations.insert("2", p("b"), p("a"));

    apply(&mut doc, &relocations, &catalog, "1", "2");

    assert_eq!(value_at(&doc, "a"), Some(Value::from("Vb")));
    assert_eq!(value_at(&doc, "b"), Some(Value::from("Va")));
    assert_eq!(comment_at(&doc, "a").as_deref(), Some(" about b"));
    assert_eq!(comment_at(&doc, "b").as_deref(), Some(" about a"));
}

#[rstest]
#[case::only_source("a: Va\n", "b", "Va", "a")]
#[case::only_destination("b: Vb\n", "a", "Vb", "b")]
fn given_swap_with_one_side_absent_when_applied_then_value_crosses_once(
    catalog: VersionCatalog,
    #[case] yaml: &str,
    #[case] landed: &str,
    #[case] value: &str,
    #[case] emptied: &str,
) {
    let mut doc = parse_document(yaml).unwrap();
    let mut relocations = Relocations::new();
    relocations.insert("2", p("a"), p("b"));
    relocations.insert("2", p("b"), p("a"));

    apply(&mut doc, &relocations, &catalog, "1", "2");

    assert_eq!(value_at(&doc, landed), Some(Value::from(value)));
    assert!(doc.get(&p(emptied)).is_none());
}

fn rotation() -> Relocations {
    let mut relocations = Relocations::new();
    relocations.insert("2", p("a"), p("b"));
    relocations.insert("2", p("b"), p("c"));
    relocations.insert("2", p("c"), p("a"));
    relocations
}

#[rstest]
fn given_three_cycle_fully_populated_when_applied_then_rotated(catalog: VersionCatalog) {
    let mut doc = parse_document("a: Va\nb: Vb\nc: Vc\n").unwrap();

    let current = catalog.parse("1").unwrap();
    let target = catalog.parse("2").unwrap();
    let report = Relocator::new(&rotation())
        .apply(&mut doc, &current, &target)
        .unwrap();

    assert_eq!(value_at(&doc, "a"), Some(Value::from("Vc")));
    assert_eq!(value_at(&doc, "b"), Some(Value::from("Va")));
    assert_eq!(value_at(&doc, "c"), Some(Value::from("Vb")));
    assert_eq!(report.moved, 3);
}

#[rstest]
#[case::first_member("a: Va\n", "b", "Va")]
#[case::middle_member("b: Vb\n", "c", "Vb")]
#[case::last_member("c: Vc\n", "a", "Vc")]
fn given_three_cycle_with_one_member_when_applied_then_moves_one_step(
    catalog: VersionCatalog,
    #[case] yaml: &str,
    #[case] landed: &str,
    #[case] value: &str,
) {
    let mut doc = parse_document(yaml).unwrap();

    apply(&mut doc, &rotation(), &catalog, "1", "2");

    assert_eq!(value_at(&doc, landed), Some(Value::from(value)));
    assert_eq!(doc.leaf_paths(), vec![p(landed)], "value is not carried further round");
}

#[rstest]
fn given_two_of_three_cycle_members_when_applied_then_each_moves_one_step(
    catalog: VersionCatalog,
) {
    let mut doc = parse_document("a: Va\nc: Vc\n").unwrap();

    apply(&mut doc, &rotation(), &catalog, "1", "2");

    assert_eq!(value_at(&doc, "a"), Some(Value::from("Vc")));
    assert_eq!(value_at(&doc, "b"), Some(Value::from("Va")));
    assert!(doc.get(&p("c")).is_none());
}

#[rstest]
#[case::native_keys(KeyFormat::Native)]
#[case::string_keys(KeyFormat::String)]
fn given_integer_keys_when_relocated_from_toml_then_moved(
    catalog: VersionCatalog,
    #[case] format: KeyFormat,
) {
    let mut doc = parse_document_with("ports:\n  80: http\n  443: https\n", format).unwrap();
    let value: toml::Value = toml::from_str(
        r#"
        [2]
        "ports.80" = "web.80"
        "#,
    )
    .unwrap();
    let relocations = Relocations::from_toml(&value, '.', format).unwrap();

    let current = catalog.parse("1").unwrap();
    let target = catalog.parse("2").unwrap();
    let report = Relocator::new(&relocations)
        .apply(&mut doc, &current, &target)
        .unwrap();

    let at = |text: &str| {
        doc.get(&Path::parse_with(text, '.', format).unwrap())
            .and_then(|node| doc.value(node))
            .cloned()
    };
    assert_eq!(report.moved, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(at("web.80"), Some(Value::from("http")));
    assert_eq!(at("ports.443"), Some(Value::from("https")));
    assert_eq!(at("ports.80"), None);
}

#[rstest]
fn given_integer_keys_when_relocated_from_yaml_then_moved(catalog: VersionCatalog) {
    let mut doc = parse_document("ports:\n  80: http\n").unwrap();
    let value: Value = serde_yaml::from_str("2:\n  ports.80: web.80\n").unwrap();
    let relocations = Relocations::from_yaml(&value, '.', KeyFormat::Native).unwrap();

    apply(&mut doc, &relocations, &catalog, "1", "2");

    let moved = Path::parse_with("web.80", '.', KeyFormat::Native).unwrap();
    assert_eq!(doc.get(&moved).and_then(|node| doc.value(node)), Some(&Value::from("http")));
    assert!(doc.get(&p("ports")).is_none());
}

#[rstest]
#[case::head_first(&[("a", "b"), ("b", "c")])]
#[case::tail_first(&[("b", "c"), ("a", "b")])]
fn given_chain_when_applied_then_value_ends_at_chain_end(
    catalog: VersionCatalog,
    #[case] entries: &[(&str, &str)],
) {
    let mut doc = parse_document("a: Va\n").unwrap();
    let mut relocations = Relocations::new();
    for (from, to) in entries {
        relocations.insert("2", p(from), p(to));
    }

    apply(&mut doc, &relocations, &catalog, "1", "2");

    assert_eq!(value_at(&doc, "c"), Some(Value::from("Va")));
    assert!(doc.get(&p("a")).is_none());
    assert!(doc.get(&p("b")).is_none());
}

#[rstest]
fn given_chain_with_occupied_middle_when_applied_then_both_values_shift(
    catalog: VersionCatalog,
) {
    let mut doc = parse_document("a: Va\nb: Vb\n").unwrap();
    let mut relocations = Relocations::new();
    relocations.insert("2", p("a"), p("b"));
    relocations.insert("2", p("b"), p("c"));

    apply(&mut doc, &relocations, &catalog, "1", "2");

    assert!(doc.get(&p("a")).is_none());
    assert_eq!(value_at(&doc, "b"), Some(Value::from("Va")));
    assert_eq!(value_at(&doc, "c"), Some(Value::from("Vb")));
}

#[rstest]
fn given_absent_source_when_relocated_then_tree_unchanged(catalog: VersionCatalog) {
    let mut doc = parse_document("keep: 1\nnested:\n  value: 2\n").unwrap();
    let before = doc.leaf_paths();
    let mut relocations = Relocations::new();
    relocations.insert("2", p("x"), p("y"));
    relocations.insert("2", p("nested.missing"), p("y"));

    let current = catalog.parse("1").unwrap();
    let target = catalog.parse("2").unwrap();
    let report = Relocator::new(&relocations)
        .apply(&mut doc, &current, &target)
        .unwrap();

    assert_eq!(doc.leaf_paths(), before);
    assert_eq!(report.moved, 0);
    assert_eq!(report.skipped, 2);
    assert!(doc.get(&p("nested")).is_some(), "failed lookups never prune");
}

#[rstest]
fn given_maps_for_two_versions_when_upgrading_then_applied_in_order(catalog: VersionCatalog) {
    let mut relocations = Relocations::new();
    relocations.insert("2", p("a"), p("b"));
    relocations.insert("3", p("b"), p("c"));

    let mut doc = parse_document("a: Va\n").unwrap();
    let current = catalog.parse("1").unwrap();
    let target = catalog.parse("3").unwrap();
    let report = Relocator::new(&relocations)
        .apply(&mut doc, &current, &target)
        .unwrap();
    assert_eq!(report.versions, vec!["2".to_string(), "3".to_string()]);
    assert_eq!(value_at(&doc, "c"), Some(Value::from("Va")));

    let mut current_doc = parse_document("a: Va\n").unwrap();
    let at_target = catalog.parse("3").unwrap();
    let report = Relocator::new(&relocations)
        .apply(&mut current_doc, &at_target, &at_target)
        .unwrap();
    assert!(report.versions.is_empty());
    assert_eq!(value_at(&current_doc, "a"), Some(Value::from("Va")));
}

#[rstest]
fn given_map_after_target_when_upgrading_then_never_consulted(catalog: VersionCatalog) {
    let mut relocations = Relocations::new();
    relocations.insert("2", p("a"), p("b"));
    relocations.insert("4", p("b"), p("z"));
    let mut doc = parse_document("a: Va\n").unwrap();

    apply(&mut doc, &relocations, &catalog, "1", "3");

    assert_eq!(value_at(&doc, "b"), Some(Value::from("Va")));
    assert!(doc.get(&p("z")).is_none());
}

#[rstest]
fn given_sole_root_child_moved_when_relocated_then_root_survives(catalog: VersionCatalog) {
    let mut doc = parse_document("only:\n  leaf: 1\n").unwrap();
    let root = doc.root();
    let mut relocations = Relocations::new();
    relocations.insert("2", p("only.leaf"), p("moved.leaf"));

    apply(&mut doc, &relocations, &catalog, "1", "2");

    assert_eq!(doc.root(), root);
    assert!(doc.block(root).is_some());
    assert!(doc.get(&p("only")).is_none());
    assert_eq!(value_at(&doc, "moved.leaf"), Some(Value::from(1)));
}

#[rstest]
fn given_deep_destination_when_relocated_then_intermediate_sections_created(
    catalog: VersionCatalog,
) {
    let mut doc = parse_document("flat: 1\n").unwrap();
    let mut relocations = Relocations::new();
    relocations.insert("2", p("flat"), p("x.y.z"));

    apply(&mut doc, &relocations, &catalog, "1", "2");

    assert!(doc.is_section(doc.get(&p("x")).unwrap()));
    assert!(doc.is_section(doc.get(&p("x.y")).unwrap()));
    assert_eq!(value_at(&doc, "x.y.z"), Some(Value::from(1)));
}

#[rstest]
fn given_section_source_when_relocated_then_subtree_and_identity_travel(
    catalog: VersionCatalog,
) {
    let mut doc = parse_document("db:\n  host: h\n  port: 5432\n").unwrap();
    comment(&mut doc, "db", " database");
    let db = doc.get(&p("db")).unwrap();
    let mut relocations = Relocations::new();
    relocations.insert("2", p("db"), p("storage.primary"));

    apply(&mut doc, &relocations, &catalog, "1", "2");

    assert_eq!(doc.get(&p("storage.primary")), Some(db));
    assert_eq!(comment_at(&doc, "storage.primary").as_deref(), Some(" database"));
    assert_eq!(value_at(&doc, "storage.primary.port"), Some(Value::from(5432)));
    assert!(doc.get(&p("db")).is_none());
}

#[rstest]
fn given_occupied_destination_not_scheduled_when_relocated_then_replaced(
    catalog: VersionCatalog,
) {
    let mut doc = parse_document("old: new value\nnew: stale\n").unwrap();
    let mut relocations = Relocations::new();
    relocations.insert("2", p("old"), p("new"));

    apply(&mut doc, &relocations, &catalog, "1", "2");

    assert_eq!(value_at(&doc, "new"), Some(Value::from("new value")));
    assert!(doc.get(&p("old")).is_none());
}

#[rstest]
fn given_versions_of_different_catalogs_when_applied_then_mismatch(catalog: VersionCatalog) {
    let other = VersionCatalog::new(["1", "2", "3", "4"]).unwrap();
    let mut doc = Document::new();
    let relocations = Relocations::new();
    let current = catalog.parse("1").unwrap();
    let target = other.parse("2").unwrap();

    let result = Relocator::new(&relocations).apply(&mut doc, &current, &target);

    assert!(matches!(result, Err(DomainError::CatalogMismatch { .. })));
}

#[test]
fn given_malformed_relocation_table_when_parsed_then_rejected() {
    let value: toml::Value = toml::from_str(
        r#"
        [2]
        "a" = "b"

        [3]
        "c" = 1
        "#,
    )
    .unwrap();

    let result = Relocations::from_toml(&value, '.', KeyFormat::Native);

    assert!(matches!(
        result,
        Err(DomainError::InvalidRelocations { version, .. }) if version == "3"
    ));
}

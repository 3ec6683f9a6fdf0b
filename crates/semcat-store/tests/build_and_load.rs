//! End-to-end: build a store from a catalog and an embedding corpus, then
//! read every object back.

use semcat_pca::ComponentCount;
use semcat_store::{BuildOptions, KnowledgeStore, StoreBuilder, StoreError, load_catalog};
use semcat_types::{ActionProperty, EMBEDDING_DIM, HIERARCHY_ROOT, ObjectRecord, material_term};
use std::io::Cursor;

const CATALOG: &str = r#"[
  {"Object Type": "Apple", "Conceptnet Name": "apple", "Wordnet Name": "apple.n.01",
   "Contextual Interactions": "Can be sliced into pieces",
   "Scenes": ["Kitchen"], "Default Compatible Receptacles": ["Bowl", "Plate", "Bowl"],
   "Material Properties": ["Food"], "Actionable Properties": ["Pickup", "Slice (Some)"],
   "path": [["Food", "Produce", "Fruit"]], "RoboCSE": ["edible", "graspable"]},
  {"Object Type": "Mug", "Conceptnet Name": "mug",
   "Scenes": ["Kitchen", "LivingRoom"], "Default Compatible Receptacles": ["Sink", "Shelf"],
   "Material Properties": ["Ceramic"], "Actionable Properties": ["Fill", "Break (Some)"],
   "path": [["Household", "Kitchenware", "Cups"]]},
  {"Object Type": "Pot", "Conceptnet Name": "pot",
   "Scenes": ["Kitchen"], "Material Properties": ["Cast Iron Metal"],
   "Actionable Properties": ["Fill"],
   "path": [["Household", "Kitchenware", "Cookware"]], "RoboCSE": ["container", "graspable"]},
  {"Object Type": "Book", "Conceptnet Name": "book",
   "Scenes": ["Bedroom", "LivingRoom"], "Actionable Properties": ["Open", "Pickup"],
   "path": [["Media", "Books"], ["Office", "Stationery"]], "RoboCSE": ["graspable", "readable"]},
  {"Object Type": "Sink", "Conceptnet Name": "sink",
   "Scenes": ["Kitchen", "Bathroom"], "Actionable Properties": ["ToggleOn (Some)"],
   "path": [["Household", "Fixtures"]], "RoboCSE": ["container"]},
  {"Object Type": "Bread", "Conceptnet Name": "bread",
   "Scenes": ["Kitchen"], "Actionable Properties": ["Slice"],
   "path": [["Food", "Bakery"]], "RoboCSE": ["edible"]},
  {"Object Type": "Knife", "Conceptnet Name": "knife",
   "Scenes": ["Kitchen"], "Material Properties": ["Metal"],
   "path": [["Household", "Kitchenware", "Cutlery"]], "RoboCSE": ["graspable", "sharp"]},
  {"Object Type": "Pillow", "Conceptnet Name": "pillow",
   "Scenes": ["Bedroom"], "path": [["Household", "Bedding"]], "RoboCSE": []}
]"#;

fn vector_line(key: &str, seed: f32) -> String {
    let values: Vec<String> = (0..EMBEDDING_DIM)
        .map(|i| format!("{}", seed + i as f32 * 0.001))
        .collect();
    format!("{key} {}\n", values.join(" "))
}

fn corpus() -> String {
    let mut c = String::from("6 300\n");
    c.push_str(&vector_line("apple", 0.1));
    c.push_str(&vector_line("mug", 0.2));
    c.push_str(&vector_line("pot", 0.3));
    c.push_str(&vector_line("zebra", 0.4));
    c.push_str(&vector_line("book", 0.5));
    c.push_str(&vector_line("Bread", 0.6));
    c
}

fn build(components: ComponentCount) -> (KnowledgeStore, Vec<ObjectRecord>) {
    let records = load_catalog(Cursor::new(CATALOG)).unwrap();
    let store = KnowledgeStore::open_in_memory().unwrap();
    let options = BuildOptions {
        components,
        ..BuildOptions::default()
    };
    StoreBuilder::new(options)
        .build(&store, &records, Cursor::new(corpus()))
        .unwrap();
    (store, records)
}

// ── scenarios ────────────────────────────────────────────────────────────────

#[test]
fn apple_resolves_its_path_and_embedding() {
    let (store, _) = build(ComponentCount::Fixed(3));
    let apple = store.load("apple").unwrap();
    assert_eq!(apple.category_paths, vec![vec!["Food", "Produce", "Fruit"]]);
    let embedding = apple.embedding.unwrap();
    assert_eq!(embedding.len(), EMBEDDING_DIM);
    assert_eq!(embedding[0], 0.1);
}

#[test]
fn mug_without_annotation_has_all_false_flags_and_no_vector() {
    let (store, _) = build(ComponentCount::Fixed(3));
    let mug = store.load("Mug").unwrap();
    assert!(!mug.affordances.is_empty());
    assert!(mug.affordances.values().all(|v| !v));
    assert!(mug.reduced_affordances.is_none());
}

#[test]
fn shared_prefix_produces_one_kitchenware_node() {
    let (store, _) = build(ComponentCount::Fixed(3));
    let nodes = store.hierarchy_nodes().unwrap();
    assert_eq!(nodes.iter().filter(|n| *n == "Kitchenware").count(), 1);
    assert_eq!(
        store.parent_of("Kitchenware").unwrap(),
        Some(Some("Household".to_string()))
    );
}

#[test]
fn sink_without_embedding_still_loads() {
    let (store, _) = build(ComponentCount::Fixed(3));
    let sink = store.load("SINK").unwrap();
    assert!(sink.embedding.is_none());
    assert_eq!(sink.actions, vec![ActionProperty::new("ToggleOn", true)]);
}

// ── properties over every object ─────────────────────────────────────────────

#[test]
fn every_object_round_trips_against_its_record() {
    let (store, records) = build(ComponentCount::Fixed(3));
    for r in &records {
        let loaded = store.load(&format!("  {} ", r.key.to_uppercase())).unwrap();
        assert_eq!(loaded.key, r.key);
        assert_eq!(loaded.embedding_key, r.embedding_key);
        assert_eq!(loaded.lexical_tag, r.lexical_tag);
        assert_eq!(loaded.interaction_context, r.interaction_context);

        let mut scenes = loaded.scenes.clone();
        let mut expected_scenes = r.scenes.clone();
        scenes.sort();
        expected_scenes.sort();
        assert_eq!(scenes, expected_scenes);

        let mut receptacles = loaded.receptacles.clone();
        let mut expected_receptacles = r.receptacles.clone();
        receptacles.sort();
        expected_receptacles.sort();
        expected_receptacles.dedup();
        assert_eq!(receptacles, expected_receptacles);

        let expected_materials: Vec<&str> =
            r.materials.iter().filter_map(|m| material_term(m)).collect();
        assert_eq!(loaded.materials, expected_materials);

        let expected_actions: Vec<ActionProperty> =
            r.actions.iter().map(|a| ActionProperty::parse(a)).collect();
        assert_eq!(loaded.actions, expected_actions);

        let mut expected_paths = r.category_paths.clone();
        expected_paths.sort();
        assert_eq!(loaded.category_paths, expected_paths);

        for (flag, value) in &loaded.affordances {
            let expected = r.affordance_flags.as_ref().is_some_and(|f| f.contains(flag));
            assert_eq!(*value, expected, "{} / {flag}", r.key);
        }
    }
}

#[test]
fn every_path_climbs_to_a_true_root() {
    let (store, records) = build(ComponentCount::Fixed(3));
    for r in &records {
        for path in store.category_paths(&r.key).unwrap() {
            let top = path.first().unwrap();
            assert_eq!(
                store.parent_of(top).unwrap(),
                Some(Some(HIERARCHY_ROOT.to_string()))
            );
            assert_eq!(store.parent_of(HIERARCHY_ROOT).unwrap(), Some(None));
        }
    }
}

#[test]
fn affordance_key_sets_match_across_objects() {
    let (store, _) = build(ComponentCount::Fixed(3));
    let all = store.load_all().unwrap();
    assert!(all.failures.is_empty());
    assert_eq!(all.records.len(), 8);
    let kinds = store.affordance_kinds().unwrap();
    for record in all.records.values() {
        let keys: Vec<&String> = record.affordances.keys().collect();
        assert_eq!(keys, kinds.iter().collect::<Vec<_>>());
        if let Some(v) = &record.reduced_affordances {
            assert_eq!(v.len(), 3);
        }
    }
}

#[test]
fn mle_build_uses_one_component_count_everywhere() {
    let (store, _) = build(ComponentCount::Mle);
    let info = store.build_info().unwrap().unwrap();
    let k = info.n_components.unwrap();
    assert!(k <= info.affordance_flags);
    for record in store.load_all().unwrap().records.values() {
        if let Some(v) = &record.reduced_affordances {
            assert_eq!(v.len(), k);
        }
    }
}

#[test]
fn unknown_key_is_not_found() {
    let (store, _) = build(ComponentCount::Fixed(2));
    assert!(matches!(store.load("Toaster"), Err(StoreError::NotFound(_))));
}

// ── on-disk lifecycle ────────────────────────────────────────────────────────

#[test]
fn built_store_reopens_read_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");
    let records = load_catalog(Cursor::new(CATALOG)).unwrap();
    {
        let store = KnowledgeStore::open(&path).unwrap();
        let report = StoreBuilder::new(BuildOptions {
            components: ComponentCount::Fixed(2),
            ..BuildOptions::default()
        })
        .build(&store, &records, Cursor::new(corpus()))
        .unwrap();
        assert_eq!(report.embeddings, 5);
        assert_eq!(report.missing_embeddings, vec!["knife", "pillow", "sink"]);
        assert_eq!(report.error_curve.len(), 25);
        store.close().unwrap();
    }

    let store = KnowledgeStore::open_read_only(&path).unwrap();
    assert_eq!(store.object_count().unwrap(), records.len());
    let pot = store.load("pot").unwrap();
    assert_eq!(pot.materials, vec!["Iron"]);
    assert_eq!(pot.reduced_affordances.map(|v| v.len()), Some(2));
    store.close().unwrap();
}

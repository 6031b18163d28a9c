use catalog_core::db::open_db_in_memory;
use catalog_core::store::{
    Accumulator, DocumentCollection, Expr, Filter, FindOptions, Hint, IndexSpec, Pipeline,
    PlanStage, Projection, SortKey, SqliteCollection, StoreError, Update,
};
use rusqlite::Connection;
use serde_json::json;

fn seeded(conn: &Connection) -> SqliteCollection<'_> {
    let collection = SqliteCollection::try_new(conn, "items").unwrap();
    collection
        .insert_many(&[
            json!({"name": "alpha", "qty": 5, "tag": "a", "active": true}),
            json!({"name": "beta", "qty": 12, "tag": "b", "active": false}),
            json!({"name": "gamma", "qty": 7, "tag": "a", "active": true}),
            json!({"name": "delta", "qty": 12, "tag": "b", "active": true}),
        ])
        .unwrap();
    collection
}

fn names(documents: &[catalog_core::store::Document]) -> Vec<&str> {
    documents
        .iter()
        .map(|document| document["name"].as_str().unwrap())
        .collect()
}

#[test]
fn insert_assigns_increasing_ids() {
    let conn = open_db_in_memory().unwrap();
    let collection = SqliteCollection::try_new(&conn, "items").unwrap();

    let result = collection
        .insert_many(&[json!({"name": "one"}), json!({"name": "two"})])
        .unwrap();
    assert_eq!(result.inserted_count(), 2);
    assert!(result.inserted_ids[0] < result.inserted_ids[1]);

    let found = collection
        .find_one(&Filter::eq("name", "two"), &FindOptions::default())
        .unwrap()
        .unwrap();
    assert_eq!(found["_id"], json!(result.inserted_ids[1]));
}

#[test]
fn insert_rejects_caller_supplied_id() {
    let conn = open_db_in_memory().unwrap();
    let collection = SqliteCollection::try_new(&conn, "items").unwrap();

    let err = collection
        .insert_many(&[json!({"_id": 1, "name": "one"})])
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidDocument(_)));
    assert_eq!(collection.count_documents(&Filter::All).unwrap(), 0);
}

#[test]
fn filters_compare_numbers_strings_and_booleans() {
    let conn = open_db_in_memory().unwrap();
    let collection = seeded(&conn);
    let all = FindOptions::default();

    let big = collection.find(&Filter::gte("qty", 7), &all).unwrap();
    assert_eq!(names(&big), vec!["beta", "gamma", "delta"]);

    let active_b = collection
        .find(&Filter::eq("active", true).and(Filter::eq("tag", "b")), &all)
        .unwrap();
    assert_eq!(names(&active_b), vec!["delta"]);

    let either = collection
        .find(
            &Filter::Or(vec![Filter::lt("qty", 6), Filter::eq("name", "beta")]),
            &all,
        )
        .unwrap();
    assert_eq!(names(&either), vec!["alpha", "beta"]);

    let listed = collection
        .find(&Filter::in_values("name", ["gamma", "alpha"]), &all)
        .unwrap();
    assert_eq!(names(&listed), vec!["alpha", "gamma"]);

    assert_eq!(collection.count_documents(&Filter::ne("tag", "a")).unwrap(), 2);
}

#[test]
fn range_filters_skip_values_of_another_type() {
    let conn = open_db_in_memory().unwrap();
    let collection = SqliteCollection::try_new(&conn, "books").unwrap();
    collection
        .insert_many(&[
            json!({"title": "Numeric", "published_year": 1990}),
            json!({"title": "Text", "published_year": "abc"}),
            json!({"title": "Missing"}),
        ])
        .unwrap();
    let all = FindOptions::default();

    let after = collection.find(&Filter::gt("published_year", 1950), &all).unwrap();
    let titles: Vec<_> = after.iter().map(|doc| doc["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Numeric"]);

    let before = collection.find(&Filter::lt("published_year", "zzz"), &all).unwrap();
    let titles: Vec<_> = before.iter().map(|doc| doc["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Text"]);
}

#[test]
fn in_filter_accepts_booleans() {
    let conn = open_db_in_memory().unwrap();
    let collection = seeded(&conn);
    let all = FindOptions::default();

    let active = collection
        .find(&Filter::in_values("active", [true]), &all)
        .unwrap();
    assert_eq!(names(&active), vec!["alpha", "gamma", "delta"]);

    let mixed = collection
        .find(&Filter::in_values("name", [json!(false), json!("beta")]), &all)
        .unwrap();
    assert_eq!(names(&mixed), vec!["beta"]);
}

#[test]
fn filter_rejects_invalid_field_names() {
    let conn = open_db_in_memory().unwrap();
    let collection = seeded(&conn);

    let err = collection
        .find(&Filter::eq("qty'); DROP TABLE documents; --", 1), &FindOptions::default())
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidField(_)));
}

#[test]
fn sort_skip_limit_and_projection() {
    let conn = open_db_in_memory().unwrap();
    let collection = seeded(&conn);

    let options = FindOptions::default()
        .projection(Projection::include(["name"]).without_id())
        .sort(SortKey::desc("qty"))
        .skip(1)
        .limit(2);
    let documents = collection.find(&Filter::All, &options).unwrap();

    // Equal quantities keep insertion order.
    assert_eq!(names(&documents), vec!["delta", "gamma"]);
    assert!(documents
        .iter()
        .all(|document| document.len() == 1 && document.contains_key("name")));
}

#[test]
fn update_one_reports_matched_and_modified() {
    let conn = open_db_in_memory().unwrap();
    let collection = seeded(&conn);
    let beta = Filter::eq("name", "beta");

    let changed = collection
        .update_one(&beta, &Update::set("qty", 20))
        .unwrap();
    assert_eq!((changed.matched_count, changed.modified_count), (1, 1));

    let unchanged = collection
        .update_one(&beta, &Update::set("qty", 20))
        .unwrap();
    assert_eq!((unchanged.matched_count, unchanged.modified_count), (1, 0));

    let missing = collection
        .update_one(&Filter::eq("name", "omega"), &Update::set("qty", 1))
        .unwrap();
    assert_eq!((missing.matched_count, missing.modified_count), (0, 0));

    let stored = collection
        .find_one(&beta, &FindOptions::default())
        .unwrap()
        .unwrap();
    assert_eq!(stored["qty"], json!(20));
    assert_eq!(stored["tag"], json!("b"));
}

#[test]
fn delete_one_removes_first_match_only() {
    let conn = open_db_in_memory().unwrap();
    let collection = seeded(&conn);

    assert_eq!(collection.delete_one(&Filter::eq("qty", 12)).unwrap(), 1);
    let remaining = collection
        .find(&Filter::eq("qty", 12), &FindOptions::default())
        .unwrap();
    assert_eq!(names(&remaining), vec!["delta"]);
    assert_eq!(collection.delete_one(&Filter::eq("name", "omega")).unwrap(), 0);
    assert_eq!(collection.delete_many(&Filter::All).unwrap(), 3);
}

#[test]
fn pipeline_groups_and_sorts() {
    let conn = open_db_in_memory().unwrap();
    let collection = seeded(&conn);

    let pipeline = Pipeline::new()
        .match_filter(Filter::eq("active", true))
        .group(
            Expr::field("tag"),
            [
                ("total", Accumulator::Sum(Expr::field("qty"))),
                ("names", Accumulator::Push(Expr::field("name"))),
                ("count", Accumulator::Count),
            ],
        )
        .sort([SortKey::desc("count")]);
    let groups = collection.aggregate(&pipeline).unwrap();

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0]["_id"], json!("a"));
    assert_eq!(groups[0]["total"], json!(12));
    let mut a_names: Vec<_> = groups[0]["names"]
        .as_array()
        .unwrap()
        .iter()
        .map(|name| name.as_str().unwrap())
        .collect();
    a_names.sort_unstable();
    assert_eq!(a_names, vec!["alpha", "gamma"]);
    assert_eq!(groups[0]["count"], json!(2));
    assert_eq!(groups[1]["_id"], json!("b"));
    assert_eq!(groups[1]["names"], json!(["delta"]));
}

#[test]
fn pipeline_constant_key_folds_everything() {
    let conn = open_db_in_memory().unwrap();
    let collection = seeded(&conn);

    let pipeline = Pipeline::new().group(
        Expr::literal(0),
        [
            ("maxQty", Accumulator::Max(Expr::field("qty"))),
            ("minQty", Accumulator::Min(Expr::field("qty"))),
        ],
    );
    let rows = collection.aggregate(&pipeline).unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["maxQty"], json!(12));
    assert_eq!(rows[0]["minQty"], json!(5));
}

#[test]
fn pipeline_projects_arithmetic() {
    let conn = open_db_in_memory().unwrap();
    let collection = seeded(&conn);

    let pipeline = Pipeline::new()
        .project([
            ("name", Expr::field("name")),
            (
                "bucket",
                Expr::subtract(Expr::field("qty"), Expr::modulo(Expr::field("qty"), Expr::literal(5))),
            ),
        ])
        .sort([SortKey::asc("name")])
        .limit(2);
    let rows = collection.aggregate(&pipeline).unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], json!("alpha"));
    assert_eq!(rows[0]["bucket"], json!(5));
    assert_eq!(rows[1]["name"], json!("beta"));
    assert_eq!(rows[1]["bucket"], json!(10));
    assert!(rows[0].contains_key("_id"));
}

#[test]
fn pipeline_reals_keep_full_precision() {
    let conn = open_db_in_memory().unwrap();
    let collection = SqliteCollection::try_new(&conn, "ratios").unwrap();
    collection
        .insert_many(&[
            json!({"group": "x", "num": 1, "den": 3, "price": 0.1}),
            json!({"group": "x", "num": 2, "den": 3, "price": 0.2}),
        ])
        .unwrap();

    let averages = collection
        .aggregate(&Pipeline::new().group(
            Expr::field("group"),
            [
                ("avgPrice", Accumulator::Avg(Expr::field("price"))),
                ("maxPrice", Accumulator::Max(Expr::field("price"))),
                ("count", Accumulator::Sum(Expr::literal(1))),
            ],
        ))
        .unwrap();
    assert_eq!(averages.len(), 1);
    assert_eq!(averages[0]["avgPrice"].as_f64(), Some((0.1 + 0.2) / 2.0));
    assert_eq!(averages[0]["maxPrice"].as_f64(), Some(0.2));
    assert_eq!(averages[0]["count"], json!(2));
    assert_eq!(averages[0]["_id"], json!("x"));

    let ratios = collection
        .aggregate(
            &Pipeline::new()
                .project([(
                    "ratio",
                    Expr::divide(Expr::field("num"), Expr::field("den")),
                )])
                .sort([SortKey::asc("ratio")]),
        )
        .unwrap();
    assert_eq!(ratios[0]["ratio"].as_f64(), Some(1.0 / 3.0));
    assert_eq!(ratios[1]["ratio"].as_f64(), Some(2.0 / 3.0));
}

#[test]
fn indexes_are_named_listed_and_dropped() {
    let conn = open_db_in_memory().unwrap();
    let collection = seeded(&conn);

    let single = collection.create_index(&IndexSpec::new().asc("name")).unwrap();
    let compound = collection
        .create_index(&IndexSpec::new().asc("tag").desc("qty"))
        .unwrap();
    assert_eq!(single, "name_1");
    assert_eq!(compound, "tag_1_qty_-1");
    assert_eq!(
        collection.create_index(&IndexSpec::new().asc("name")).unwrap(),
        "name_1"
    );

    assert_eq!(
        collection.list_indexes().unwrap(),
        vec!["name_1".to_string(), "tag_1_qty_-1".to_string()]
    );
    assert!(collection.drop_index("name_1").unwrap());
    assert!(!collection.drop_index("name_1").unwrap());
    assert_eq!(collection.list_indexes().unwrap(), vec!["tag_1_qty_-1".to_string()]);
}

#[test]
fn explain_reports_scan_versus_index() {
    let conn = open_db_in_memory().unwrap();
    let collection = seeded(&conn);
    collection.create_index(&IndexSpec::new().asc("name")).unwrap();
    let gamma = Filter::eq("name", "gamma");

    let scan = collection
        .explain(&gamma, &FindOptions::default().hint(Hint::Natural))
        .unwrap();
    assert_eq!(scan.stage, PlanStage::CollectionScan);
    assert_eq!(scan.index_name, None);
    assert_eq!(scan.docs_returned, 1);

    let indexed = collection.explain(&gamma, &FindOptions::default()).unwrap();
    assert_eq!(indexed.stage, PlanStage::IndexScan);
    assert_eq!(indexed.index_name.as_deref(), Some("name_1"));
    assert_eq!(indexed.docs_returned, 1);
    assert!(indexed.docs_examined >= 1);
    assert!(scan.docs_examined >= indexed.docs_examined);
    assert!(!indexed.plan.is_empty());
}

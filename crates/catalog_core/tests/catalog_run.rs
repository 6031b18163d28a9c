use catalog_core::db::open_db_in_memory;
use catalog_core::report::StepReport;
use catalog_core::store::{DocumentCollection, Filter, FindOptions, SqliteCollection};
use catalog_core::{
    render_outcome, run_all, run_session, sample_books, CatalogConfig, CatalogError,
    CatalogService, CatalogSession, CatalogStep, RunOutcome, SUCCESS_MARKER,
};
use std::collections::BTreeMap;

fn service(conn: &rusqlite::Connection) -> CatalogService<SqliteCollection<'_>> {
    CatalogService::new(SqliteCollection::try_new(conn, "books").unwrap())
}

#[test]
fn seeding_twice_leaves_twelve_books() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    service.seed().unwrap();
    let second = service.seed().unwrap();

    assert_eq!(second.deleted, 12);
    assert_eq!(second.inserted, 12);
    assert_eq!(service.collection().count_documents(&Filter::All).unwrap(), 12);
}

#[test]
fn basic_operations_touch_only_target_records() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    service.seed().unwrap();

    service.basic_operations().unwrap();

    let collection = service.collection();
    assert_eq!(collection.count_documents(&Filter::All).unwrap(), 11);
    assert_eq!(
        collection
            .count_documents(&Filter::eq("title", "The Da Vinci Code"))
            .unwrap(),
        0
    );
    for book in sample_books() {
        if book.title == "The Da Vinci Code" {
            continue;
        }
        let stored = collection
            .find_one(&Filter::eq("title", book.title.as_str()), &FindOptions::default())
            .unwrap()
            .unwrap();
        let expected_price = if book.title == "1984" { 12.99 } else { book.price };
        assert_eq!(stored["price"].as_f64(), Some(expected_price), "{}", book.title);
        assert_eq!(stored["author"].as_str(), Some(book.author.as_str()));
    }
}

#[test]
fn pages_cover_first_ten_titles() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    service.seed().unwrap();

    let report = service.advanced_queries().unwrap();
    let paged: Vec<String> = report
        .pages
        .iter()
        .flatten()
        .map(|row| row.title.clone())
        .collect();

    let mut titles: Vec<String> = sample_books().into_iter().map(|book| book.title).collect();
    titles.sort();
    assert_eq!(paged, titles[..10].to_vec());
}

#[test]
fn genre_averages_match_seed_data() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    service.seed().unwrap();

    let report = service.aggregations().unwrap();

    let mut sums: BTreeMap<String, (f64, u64)> = BTreeMap::new();
    for book in sample_books() {
        let entry = sums.entry(book.genre).or_insert((0.0, 0));
        entry.0 += book.price;
        entry.1 += 1;
    }
    assert_eq!(report.genre_prices.len(), sums.len());
    for genre in &report.genre_prices {
        let (sum, count) = sums[&genre.genre];
        let expected = sum / count as f64;
        if count <= 2 {
            assert_eq!(genre.average_price, expected, "{}", genre.genre);
        } else {
            // Three-term sums may differ by the last bit of summation order.
            assert!(
                (genre.average_price - expected).abs() <= f64::EPSILON * expected,
                "{}: {} vs {}",
                genre.genre,
                genre.average_price,
                expected
            );
        }
        assert_eq!(genre.book_count, count);
    }
    let fantasy = report
        .genre_prices
        .iter()
        .find(|genre| genre.genre == "Fantasy")
        .unwrap();
    assert_ne!(fantasy.average_price, 17.3233333333333);
    assert!(report
        .genre_prices
        .windows(2)
        .all(|pair| pair[0].average_price >= pair[1].average_price));
}

#[test]
fn top_authors_and_decades() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    service.seed().unwrap();

    let report = service.aggregations().unwrap();

    assert_eq!(report.top_authors.len(), 3);
    assert_eq!(report.top_authors[0].book_count, 2);
    assert_eq!(report.top_authors[1].book_count, 2);
    assert_eq!(report.top_authors[2].book_count, 1);

    let decades: Vec<i64> = report.decades.iter().map(|bucket| bucket.decade).collect();
    assert!(decades.windows(2).all(|pair| pair[0] < pair[1]));
    let nineties = report
        .decades
        .iter()
        .find(|bucket| bucket.decade == 1990)
        .unwrap();
    assert!(nineties
        .titles
        .contains(&"Harry Potter and the Philosopher's Stone".to_string()));
    let regency = report
        .decades
        .iter()
        .find(|bucket| bucket.decade == 1810)
        .unwrap();
    assert_eq!(regency.titles, vec!["Pride and Prejudice".to_string()]);
    let total: u64 = report.decades.iter().map(|bucket| bucket.book_count).sum();
    assert_eq!(total, 12);
}

#[test]
fn full_run_against_directory_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let config = CatalogConfig::new(dir.path().to_string_lossy(), "library");

    let outcome = run_all(&config);

    let report = match &outcome {
        RunOutcome::Completed(report) => report,
        other => panic!("unexpected outcome: {other:?}"),
    };
    assert!(report.disconnected);
    assert_eq!(report.steps.len(), 5);
    assert!(matches!(report.steps[0], StepReport::Seed(_)));
    assert!(matches!(report.steps[4], StepReport::Indexing(_)));

    let transcript = render_outcome(&outcome).unwrap();
    assert!(transcript.contains(SUCCESS_MARKER));
    assert!(transcript.trim_end().ends_with("Connection closed"));

    let conn = rusqlite::Connection::open(dir.path().join("library.sqlite3")).unwrap();
    let collection = SqliteCollection::try_new(&conn, "books").unwrap();
    assert_eq!(collection.count_documents(&Filter::All).unwrap(), 11);
    let orwell = collection
        .find_one(&Filter::eq("title", "1984"), &FindOptions::default())
        .unwrap()
        .unwrap();
    assert_eq!(orwell["price"].as_f64(), Some(12.99));
}

#[test]
fn missing_endpoint_reports_connection_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = CatalogConfig::new(
        dir.path().join("absent").to_string_lossy(),
        "library",
    );

    let outcome = run_all(&config);

    assert!(matches!(
        outcome,
        RunOutcome::ConnectionFailed(CatalogError::Connection { .. })
    ));
    assert!(render_outcome(&outcome).unwrap().starts_with("❌ Connection failed:"));
    assert!(!dir.path().join("absent").exists());
}

#[test]
fn failing_step_aborts_and_still_disconnects() {
    let session = CatalogSession::connect(&CatalogConfig::in_memory()).unwrap();
    session
        .connection()
        .execute_batch("DROP TABLE documents;")
        .unwrap();

    let outcome = run_session(session);

    match &outcome {
        RunOutcome::Aborted { report, error } => {
            assert!(report.disconnected);
            assert!(report.steps.is_empty());
            assert!(matches!(
                error,
                CatalogError::Operation {
                    step: CatalogStep::Seed,
                    ..
                }
            ));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    let transcript = render_outcome(&outcome).unwrap();
    assert!(transcript.contains("❌ Error during execution: seed failed"));
    assert!(!transcript.contains(SUCCESS_MARKER));
}

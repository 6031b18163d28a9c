//! Fixed catalog steps run against one document collection.
//!
//! # Responsibility
//! - Issue every query, update, aggregation and explain of the run.
//! - Decode engine results into report types.
//!
//! # Invariants
//! - All filtering, grouping and ordering happens inside the store.
//! - Steps return on the first store error; nothing is retried.

use crate::model::book::{sample_books, BookRecord};
use crate::report::{
    AdvancedQueriesReport, AggregationReport, AuthorCount, BasicOperationsReport, DecadeBucket,
    GenrePrice, IndexingReport, PricedTitle, SeedReport, TitleAuthor, TitlePrice, UpdateReport,
};
use crate::store::{
    Accumulator, Document, DocumentCollection, Expr, Filter, FindOptions, Hint, IndexSpec,
    Pipeline, Projection, SortKey, StoreResult, Update,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Books per page in the pagination query.
pub const PAGE_SIZE: u64 = 5;
/// Pages fetched by the pagination query.
pub const PAGE_COUNT: u64 = 2;

pub const UPDATED_TITLE: &str = "1984";
pub const UPDATED_PRICE: f64 = 12.99;
pub const DELETED_TITLE: &str = "The Da Vinci Code";

/// Catalog steps over a document collection.
pub struct CatalogService<C: DocumentCollection> {
    collection: C,
}

impl<C: DocumentCollection> CatalogService<C> {
    pub fn new(collection: C) -> Self {
        Self { collection }
    }

    pub fn collection(&self) -> &C {
        &self.collection
    }

    /// Empties the collection and inserts the sample catalog.
    pub fn seed(&self) -> StoreResult<SeedReport> {
        let deleted = self.collection.delete_many(&Filter::All)?;
        let inserted = self.collection.insert_many(&sample_books())?;
        Ok(SeedReport {
            deleted,
            inserted: inserted.inserted_count(),
        })
    }

    /// Simple finds, one price update and one delete.
    pub fn basic_operations(&self) -> StoreResult<BasicOperationsReport> {
        let fantasy = self.find_books(&Filter::eq("genre", "Fantasy"))?;
        let published_after_1950 = self.find_books(&Filter::gt("published_year", 1950))?;
        let by_tolkien = self.find_books(&Filter::eq("author", "J.R.R. Tolkien"))?;

        let updated = self.collection.update_one(
            &Filter::eq("title", UPDATED_TITLE),
            &Update::set("price", UPDATED_PRICE),
        )?;
        let deleted = self
            .collection
            .delete_one(&Filter::eq("title", DELETED_TITLE))?;

        Ok(BasicOperationsReport {
            fantasy,
            published_after_1950,
            by_tolkien,
            price_update: UpdateReport {
                matched: updated.matched_count,
                modified: updated.modified_count,
            },
            deleted,
        })
    }

    /// Compound filters, projection, sorting and pagination.
    pub fn advanced_queries(&self) -> StoreResult<AdvancedQueriesReport> {
        let in_stock_recent = self.find_books(
            &Filter::eq("in_stock", true).and(Filter::gt("published_year", 2010)),
        )?;

        let fiction_projection: Vec<PricedTitle> = self.find_as(
            &Filter::eq("genre", "Fiction"),
            &FindOptions::default()
                .projection(Projection::include(["title", "author", "price"]).without_id())
                .limit(5),
        )?;

        let by_price = |key: SortKey| {
            FindOptions::default()
                .projection(Projection::include(["title", "price"]).without_id())
                .sort(key)
                .limit(3)
        };
        let cheapest: Vec<TitlePrice> =
            self.find_as(&Filter::All, &by_price(SortKey::asc("price")))?;
        let most_expensive: Vec<TitlePrice> =
            self.find_as(&Filter::All, &by_price(SortKey::desc("price")))?;

        let mut pages = Vec::new();
        for page in 0..PAGE_COUNT {
            let options = FindOptions::default()
                .projection(Projection::include(["title", "author"]).without_id())
                .sort(SortKey::asc("title"))
                .skip(page * PAGE_SIZE)
                .limit(PAGE_SIZE);
            let rows: Vec<TitleAuthor> = self.find_as(&Filter::All, &options)?;
            pages.push(rows);
        }

        Ok(AdvancedQueriesReport {
            in_stock_recent,
            fiction_projection,
            cheapest,
            most_expensive,
            pages,
        })
    }

    /// Genre prices, top authors and decade buckets.
    pub fn aggregations(&self) -> StoreResult<AggregationReport> {
        let genre_prices = Pipeline::new()
            .group(
                Expr::field("genre"),
                [
                    ("averagePrice", Accumulator::Avg(Expr::field("price"))),
                    ("bookCount", Accumulator::Sum(Expr::literal(1))),
                ],
            )
            .sort([SortKey::desc("averagePrice")]);

        let top_authors = Pipeline::new()
            .group(
                Expr::field("author"),
                [("bookCount", Accumulator::Sum(Expr::literal(1)))],
            )
            .sort([SortKey::desc("bookCount")])
            .limit(3);

        let year = || Expr::field("published_year");
        let decades = Pipeline::new()
            .project([
                ("title", Expr::field("title")),
                ("published_year", year()),
                (
                    "decade",
                    Expr::subtract(year(), Expr::modulo(year(), Expr::literal(10))),
                ),
            ])
            .group(
                Expr::field("decade"),
                [
                    ("bookCount", Accumulator::Sum(Expr::literal(1))),
                    ("books", Accumulator::Push(Expr::field("title"))),
                ],
            )
            .sort([SortKey::asc("_id")]);

        Ok(AggregationReport {
            genre_prices: self.aggregate_as::<GenrePrice>(&genre_prices)?,
            top_authors: self.aggregate_as::<AuthorCount>(&top_authors)?,
            decades: self.aggregate_as::<DecadeBucket>(&decades)?,
        })
    }

    /// Creates the title and author/year indexes, then explains three lookups.
    pub fn indexing(&self) -> StoreResult<IndexingReport> {
        let created_indexes = vec![
            self.collection.create_index(&IndexSpec::new().asc("title"))?,
            self.collection
                .create_index(&IndexSpec::new().asc("author").desc("published_year"))?,
        ];

        let hobbit = Filter::eq("title", "The Hobbit");
        let collection_scan = self
            .collection
            .explain(&hobbit, &FindOptions::default().hint(Hint::Natural))?;
        let title_lookup = self.collection.explain(&hobbit, &FindOptions::default())?;
        let compound_lookup = self.collection.explain(
            &Filter::eq("author", "Andy Weir").and(Filter::gt("published_year", 2010)),
            &FindOptions::default(),
        )?;

        Ok(IndexingReport {
            created_indexes,
            collection_scan,
            title_lookup,
            compound_lookup,
        })
    }

    fn find_books(&self, filter: &Filter) -> StoreResult<Vec<BookRecord>> {
        self.find_as(filter, &FindOptions::default())
    }

    fn find_as<T: DeserializeOwned>(
        &self,
        filter: &Filter,
        options: &FindOptions,
    ) -> StoreResult<Vec<T>> {
        decode_all(self.collection.find(filter, options)?)
    }

    fn aggregate_as<T: DeserializeOwned>(&self, pipeline: &Pipeline) -> StoreResult<Vec<T>> {
        decode_all(self.collection.aggregate(pipeline)?)
    }
}

fn decode_all<T: DeserializeOwned>(documents: Vec<Document>) -> StoreResult<Vec<T>> {
    documents
        .into_iter()
        .map(|document| Ok(serde_json::from_value(Value::Object(document))?))
        .collect()
}

//! Book record and the fixed sample catalog.

use serde::{Deserialize, Serialize};

/// One book document as stored in the catalog collection.
///
/// Field names match the stored document keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    /// Lookup key for the update and delete operations.
    pub title: String,
    pub author: String,
    /// Categorical grouping key.
    pub genre: String,
    pub published_year: i32,
    pub price: f64,
    pub in_stock: bool,
    pub pages: u32,
    pub publisher: String,
}

impl BookRecord {
    #[allow(clippy::too_many_arguments)]
    fn new(
        title: &str,
        author: &str,
        genre: &str,
        published_year: i32,
        price: f64,
        in_stock: bool,
        pages: u32,
        publisher: &str,
    ) -> Self {
        Self {
            title: title.to_string(),
            author: author.to_string(),
            genre: genre.to_string(),
            published_year,
            price,
            in_stock,
            pages,
            publisher: publisher.to_string(),
        }
    }
}

/// Returns the 12 records inserted by every seed.
pub fn sample_books() -> Vec<BookRecord> {
    vec![
        BookRecord::new(
            "The Great Gatsby",
            "F. Scott Fitzgerald",
            "Classic",
            1925,
            10.99,
            true,
            180,
            "Scribner",
        ),
        BookRecord::new(
            "To Kill a Mockingbird",
            "Harper Lee",
            "Fiction",
            1960,
            12.50,
            true,
            281,
            "J.B. Lippincott & Co.",
        ),
        BookRecord::new(
            "1984",
            "George Orwell",
            "Dystopian",
            1949,
            9.99,
            true,
            328,
            "Secker & Warburg",
        ),
        BookRecord::new(
            "Pride and Prejudice",
            "Jane Austen",
            "Romance",
            1813,
            8.99,
            false,
            432,
            "T. Egerton",
        ),
        BookRecord::new(
            "The Hobbit",
            "J.R.R. Tolkien",
            "Fantasy",
            1937,
            11.99,
            true,
            310,
            "George Allen & Unwin",
        ),
        BookRecord::new(
            "The Catcher in the Rye",
            "J.D. Salinger",
            "Fiction",
            1951,
            10.49,
            true,
            234,
            "Little, Brown and Company",
        ),
        BookRecord::new(
            "The Lord of the Rings",
            "J.R.R. Tolkien",
            "Fantasy",
            1954,
            24.99,
            true,
            1178,
            "George Allen & Unwin",
        ),
        BookRecord::new(
            "Harry Potter and the Philosopher's Stone",
            "J.K. Rowling",
            "Fantasy",
            1997,
            14.99,
            true,
            223,
            "Bloomsbury",
        ),
        BookRecord::new(
            "The Da Vinci Code",
            "Dan Brown",
            "Mystery",
            2003,
            13.99,
            false,
            454,
            "Doubleday",
        ),
        BookRecord::new(
            "The Alchemist",
            "Paulo Coelho",
            "Fiction",
            1988,
            11.25,
            true,
            208,
            "HarperTorch",
        ),
        BookRecord::new(
            "The Martian",
            "Andy Weir",
            "Science Fiction",
            2014,
            14.99,
            true,
            369,
            "Crown",
        ),
        BookRecord::new(
            "Project Hail Mary",
            "Andy Weir",
            "Science Fiction",
            2021,
            16.99,
            true,
            476,
            "Ballantine Books",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::sample_books;
    use std::collections::HashSet;

    #[test]
    fn sample_catalog_has_twelve_unique_titles() {
        let books = sample_books();
        assert_eq!(books.len(), 12);
        let titles = books.iter().map(|book| book.title.as_str()).collect::<HashSet<_>>();
        assert_eq!(titles.len(), 12);
    }

    #[test]
    fn record_serializes_with_stored_field_names() {
        let value = serde_json::to_value(&sample_books()[2]).unwrap();
        assert_eq!(value["title"], "1984");
        assert_eq!(value["published_year"], 1949);
        assert_eq!(value["in_stock"], true);
    }
}

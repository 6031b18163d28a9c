//! Console transcript for a catalog run.

use super::{
    AdvancedQueriesReport, AggregationReport, BasicOperationsReport, IndexingReport, RunReport,
    SeedReport, StepReport,
};
use crate::service::runner::RunOutcome;
use crate::store::ExplainStats;
use std::io::{self, Write};

/// Final line of a run that completed every step.
pub const SUCCESS_MARKER: &str = "🎉 ALL TASKS COMPLETED SUCCESSFULLY!";

const BANNER_WIDTH: usize = 50;

/// Writes the full transcript for `outcome`.
pub fn write_outcome<W: Write>(out: &mut W, outcome: &RunOutcome) -> io::Result<()> {
    match outcome {
        RunOutcome::ConnectionFailed(error) => {
            writeln!(out, "❌ Connection failed: {error}")?;
        }
        RunOutcome::Completed(report) => {
            write_report(out, report)?;
            writeln!(out, "\n{SUCCESS_MARKER}")?;
            writeln!(out, "{}", "=".repeat(37))?;
            write_disconnect(out, report)?;
        }
        RunOutcome::Aborted { report, error } => {
            write_report(out, report)?;
            writeln!(out, "\n❌ Error during execution: {error}")?;
            write_disconnect(out, report)?;
        }
    }
    Ok(())
}

/// Renders `outcome` into a string.
pub fn render_outcome(outcome: &RunOutcome) -> io::Result<String> {
    let mut buffer = Vec::new();
    write_outcome(&mut buffer, outcome)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn write_report<W: Write>(out: &mut W, report: &RunReport) -> io::Result<()> {
    writeln!(out, "✅ Connected to {} successfully\n", report.target)?;
    for step in &report.steps {
        match step {
            StepReport::Seed(seed) => write_seed(out, seed)?,
            StepReport::BasicOperations(basic) => write_basic(out, basic)?,
            StepReport::AdvancedQueries(advanced) => write_advanced(out, advanced)?,
            StepReport::Aggregations(aggregations) => write_aggregations(out, aggregations)?,
            StepReport::Indexing(indexing) => write_indexing(out, indexing)?,
        }
    }
    Ok(())
}

fn write_disconnect<W: Write>(out: &mut W, report: &RunReport) -> io::Result<()> {
    if report.disconnected {
        writeln!(out, "Connection closed")
    } else {
        writeln!(out, "❌ Connection did not close cleanly")
    }
}

fn write_banner<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    writeln!(out, "{title}")?;
    writeln!(out, "{}", "=".repeat(BANNER_WIDTH))
}

fn write_seed<W: Write>(out: &mut W, seed: &SeedReport) -> io::Result<()> {
    write_banner(out, "📚 BASIC CRUD OPERATIONS")?;
    writeln!(
        out,
        "✅ {} sample books inserted ({} previous documents removed)\n",
        seed.inserted, seed.deleted
    )
}

fn write_basic<W: Write>(out: &mut W, basic: &BasicOperationsReport) -> io::Result<()> {
    writeln!(out, "\n1. 🔍 FIND ALL BOOKS IN 'FANTASY' GENRE:")?;
    for book in &basic.fantasy {
        writeln!(out, "   - \"{}\" by {}", book.title, book.author)?;
    }

    writeln!(out, "\n2. 📅 FIND BOOKS PUBLISHED AFTER 1950:")?;
    for book in &basic.published_after_1950 {
        writeln!(out, "   - \"{}\" ({})", book.title, book.published_year)?;
    }

    writeln!(out, "\n3. ✍️ FIND BOOKS BY 'J.R.R. TOLKIEN':")?;
    for book in &basic.by_tolkien {
        writeln!(out, "   - \"{}\" ({})", book.title, book.published_year)?;
    }

    writeln!(out, "\n4. 💰 UPDATE PRICE OF '1984' TO $12.99:")?;
    writeln!(
        out,
        "   Matched {} and modified {} document(s)",
        basic.price_update.matched, basic.price_update.modified
    )?;

    writeln!(out, "\n5. 🗑️ DELETE 'THE DA VINCI CODE':")?;
    writeln!(out, "   Deleted {} document(s)", basic.deleted)
}

fn write_advanced<W: Write>(out: &mut W, advanced: &AdvancedQueriesReport) -> io::Result<()> {
    writeln!(out)?;
    write_banner(out, "\n📊 ADVANCED QUERIES")?;

    writeln!(out, "\n1. 🔍 BOOKS IN STOCK AND PUBLISHED AFTER 2010:")?;
    for book in &advanced.in_stock_recent {
        writeln!(
            out,
            "   - \"{}\" by {} ({}) - ${}",
            book.title, book.author, book.published_year, book.price
        )?;
    }

    writeln!(out, "\n2. 🎯 PROJECTION - TITLE, AUTHOR, PRICE ONLY:")?;
    for book in &advanced.fiction_projection {
        writeln!(out, "   - \"{}\" by {} - ${}", book.title, book.author, book.price)?;
    }

    writeln!(out, "\n3. 📊 SORTING BY PRICE:")?;
    writeln!(out, "   🔼 Ascending (Low to High):")?;
    for book in &advanced.cheapest {
        writeln!(out, "      ${} - \"{}\"", book.price, book.title)?;
    }
    writeln!(out, "   🔽 Descending (High to Low):")?;
    for book in &advanced.most_expensive {
        writeln!(out, "      ${} - \"{}\"", book.price, book.title)?;
    }

    let page_size = advanced.pages.first().map_or(0, Vec::len);
    writeln!(out, "\n4. 📄 PAGINATION ({page_size} BOOKS PER PAGE):")?;
    for (index, page) in advanced.pages.iter().enumerate() {
        writeln!(out, "   Page {}:", index + 1)?;
        for book in page {
            writeln!(out, "      - \"{}\" - {}", book.title, book.author)?;
        }
    }
    Ok(())
}

fn write_aggregations<W: Write>(out: &mut W, aggregations: &AggregationReport) -> io::Result<()> {
    writeln!(out)?;
    write_banner(out, "\n📈 AGGREGATION PIPELINES")?;

    writeln!(out, "\n1. 📊 AVERAGE PRICE BY GENRE:")?;
    for genre in &aggregations.genre_prices {
        writeln!(
            out,
            "   {}: ${:.2} ({} books)",
            genre.genre, genre.average_price, genre.book_count
        )?;
    }

    writeln!(out, "\n2. 👨‍💼 AUTHOR WITH MOST BOOKS:")?;
    for (index, author) in aggregations.top_authors.iter().enumerate() {
        writeln!(
            out,
            "   {} {}: {} books",
            rank_label(index),
            author.author,
            author.book_count
        )?;
    }

    writeln!(out, "\n3. 📅 BOOKS BY PUBLICATION DECADE:")?;
    for decade in &aggregations.decades {
        writeln!(out, "   {}s: {} books", decade.decade, decade.book_count)?;
    }
    Ok(())
}

fn write_indexing<W: Write>(out: &mut W, indexing: &IndexingReport) -> io::Result<()> {
    writeln!(out)?;
    write_banner(out, "\n⚡ INDEXING")?;

    writeln!(out, "\n1. 🔧 CREATING INDEXES:")?;
    for name in &indexing.created_indexes {
        writeln!(out, "   ✅ Index `{name}` ready")?;
    }

    writeln!(out, "\n2. 🚀 PERFORMANCE COMPARISON:")?;
    write_explain(out, "Without index (Collection Scan):", &indexing.collection_scan)?;
    write_explain(out, "With index on 'title':", &indexing.title_lookup)?;
    write_explain(
        out,
        "With compound index (author + year):",
        &indexing.compound_lookup,
    )
}

fn write_explain<W: Write>(out: &mut W, label: &str, stats: &ExplainStats) -> io::Result<()> {
    writeln!(out, "   {label}")?;
    match &stats.index_name {
        Some(index) => writeln!(out, "      Plan: {} ({index})", stats.stage)?,
        None => writeln!(out, "      Plan: {}", stats.stage)?,
    }
    writeln!(out, "      Documents examined: {}", stats.docs_examined)?;
    writeln!(out, "      Documents returned: {}", stats.docs_returned)?;
    writeln!(out, "      Execution time: {}ms", stats.execution_time_millis)
}

/// Medal for the first three positions.
pub fn rank_label(index: usize) -> &'static str {
    match index {
        0 => "🥇",
        1 => "🥈",
        _ => "🥉",
    }
}

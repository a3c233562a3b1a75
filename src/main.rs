use std::sync::Arc;

use heapstore::buffer::BufferPool;
use heapstore::catalog::Catalog;
use heapstore::common::{StorageConfig, TransactionId};
use heapstore::execution::{
    collect_tuples, Aggregate, AggregateOp, Delete, Filter, Insert, OpIterator, Predicate,
    SeqScan, TupleIterator,
};
use heapstore::storage::HeapFile;
use heapstore::tuple::{CompareOp, Field, Schema, Tuple, Type};

fn main() {
    tracing_subscriber::fmt::init();

    println!("Heapstore - a heap file storage engine in Rust");
    println!("==============================================\n");

    let db_path = "demo.dat";
    let config = StorageConfig {
        pool_pages: 4,
        ..StorageConfig::default()
    };

    let schema = Schema::builder()
        .field("dept", Type::Str)
        .field("salary", Type::Int)
        .build_arc();
    let file = Arc::new(
        HeapFile::open(db_path, schema.clone(), config.page_size).expect("Failed to open heap file"),
    );
    println!("Opened heap file {} as table {}", db_path, file.id());

    let catalog = Arc::new(Catalog::new());
    catalog.register_table(file.clone(), "employees", "");
    let pool = Arc::new(BufferPool::new(config, catalog).expect("Failed to create buffer pool"));
    println!("Created buffer pool with {} pages\n", pool.capacity());

    // Load rows through an Insert operator
    let tid = TransactionId::next();
    let rows = [
        ("eng", 120),
        ("eng", 100),
        ("ops", 80),
        ("sales", 90),
        ("ops", 70),
    ];
    let tuples = rows
        .iter()
        .map(|&(dept, salary)| {
            Tuple::new(schema.clone(), vec![Field::from(dept), Field::Int(salary)])
                .expect("Failed to build tuple")
        })
        .collect();
    let source = Box::new(TupleIterator::new(schema.clone(), tuples));
    let mut insert = Insert::new(pool.clone(), tid, source, file.id()).expect("Failed to plan insert");
    insert.open().expect("Failed to insert");
    let count = insert.next().expect("Failed to read count").expect("Missing count");
    println!("Inserted {} tuples into {} page(s)", count, file.page_count().unwrap_or(0));
    insert.close();

    // SELECT * WHERE salary > 85
    let scan = SeqScan::with_alias(pool.clone(), tid, file.id(), "e").expect("Failed to plan scan");
    let mut filter = Filter::new(Predicate::constant(1, CompareOp::GreaterThan, 85), Box::new(scan));
    filter.open().expect("Failed to open filter");
    println!("\n{}", filter.schema());
    for tuple in collect_tuples(&mut filter).expect("Failed to run filter") {
        println!("  {}", tuple);
    }
    filter.close();

    // SELECT dept, AVG(salary) GROUP BY dept
    let scan = SeqScan::new(pool.clone(), tid, file.id()).expect("Failed to plan scan");
    let mut avg = Aggregate::new(Box::new(scan), 1, Some(0), AggregateOp::Avg).expect("Failed to plan aggregate");
    avg.open().expect("Failed to open aggregate");
    println!("\n{}", avg.schema());
    for tuple in collect_tuples(&mut avg).expect("Failed to run aggregate") {
        println!("  {}", tuple);
    }
    avg.close();

    // DELETE WHERE dept = 'ops'
    let scan = SeqScan::new(pool.clone(), tid, file.id()).expect("Failed to plan scan");
    let ops = Filter::new(Predicate::constant(0, CompareOp::Equals, "ops"), Box::new(scan));
    let mut delete = Delete::new(pool.clone(), tid, Box::new(ops));
    delete.open().expect("Failed to delete");
    let count = delete.next().expect("Failed to read count").expect("Missing count");
    println!("\nDeleted {} tuples", count);
    delete.close();

    pool.flush_all_pages().expect("Failed to flush pages");
    println!("Flushed all pages to disk");

    // Clean up
    std::fs::remove_file(db_path).ok();
    println!("\nDemo completed successfully!");
}

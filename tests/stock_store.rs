//! Stock aggregate against PostgreSQL: transactional writes, the derived
//! quantity, version conflicts, deletes and list paging, plus rollback of
//! transactions abandoned by a drop or a panic.

mod common;

use common::{test_pool, unique, Fixture};
use gudang::executor::Executor;
use gudang::filters::Filters;
use gudang::models::stock::StockQuery;
use gudang::models::{StockDetailInput, StockInput, StockItem, StockStore};
use gudang::pool::PooledConnection;
use gudang::transaction::{run_in_transaction, Transaction, TransactionError};
use gudang::{DbPool, StoreError};
use std::panic::{catch_unwind, AssertUnwindSafe};

fn line(qty: f64, rak_id: i64, warehouse_id: i64) -> StockDetailInput {
    StockDetailInput {
        qty: Some(qty),
        satuan: Some("pcs".to_string()),
        rak_id: Some(rak_id),
        warehouse_id: Some(warehouse_id),
    }
}

fn insert_item(store: &StockStore, code: &str, lines: Vec<StockDetailInput>) -> StockItem {
    let mut item = StockItem::from_input(StockInput {
        produk_code: Some(code.to_string()),
        jsonstokdetail: Some(lines),
        ..StockInput::default()
    });
    store.insert(&mut item).expect("Failed to insert stock item");
    item
}

/// Re-reads `id`, applies `lines` as a replacement and updates.
fn replace_lines(
    store: &StockStore,
    id: &str,
    lines: Vec<StockDetailInput>,
) -> Result<StockItem, StoreError> {
    let mut item = store.get(id)?;
    item.apply(StockInput {
        jsonstokdetail: Some(lines),
        ..StockInput::default()
    });
    store.update(&mut item)?;
    Ok(item)
}

fn detail_count(pool: &DbPool, id: &str) -> i64 {
    let conn = pool.acquire().expect("Failed to acquire connection");
    let row = conn
        .query_one("SELECT COUNT(*) FROM stok_detail WHERE stok_id = $1", &[&id])
        .expect("Failed to count lines");
    row.get(0)
}

fn items_with_code(pool: &DbPool, code: &str) -> i64 {
    let conn = pool.acquire().expect("Failed to acquire connection");
    let row = conn
        .query_one("SELECT COUNT(*) FROM stok WHERE produk_code = $1", &[&code])
        .expect("Failed to count items");
    row.get(0)
}

const INSERT_BARE_ITEM: &str = "INSERT INTO stok (id, produk_code) VALUES ($1, $2)";

/// Writes through `conn` outside any transaction, then checks the row is
/// visible from another connection. A session left inside an open
/// transaction would keep it invisible.
fn assert_autocommits(pool: &DbPool, conn: &PooledConnection) {
    let code = unique("AUTO");
    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(INSERT_BARE_ITEM, &[&id, &code])
        .expect("Failed to insert after rollback");
    assert_eq!(items_with_code(pool, &code), 1);
}

#[test]
fn test_dropped_transaction_rolls_back() {
    let Some(pool) = test_pool() else { return };
    let conn = pool.acquire().expect("Failed to acquire connection");
    let code = unique("DROP");
    let id = uuid::Uuid::new_v4().to_string();

    let tx = Transaction::begin(conn.client(), None).expect("Failed to begin");
    tx.execute(INSERT_BARE_ITEM, &[&id, &code])
        .expect("Failed to insert in transaction");
    assert!(!tx.is_closed());
    drop(tx);

    assert_eq!(items_with_code(&pool, &code), 0);
    assert_autocommits(&pool, &conn);
}

#[test]
fn test_panic_inside_transaction_rolls_back() {
    let Some(pool) = test_pool() else { return };
    let conn = pool.acquire().expect("Failed to acquire connection");
    let code = unique("PANIC");
    let id = uuid::Uuid::new_v4().to_string();

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        run_in_transaction::<(), TransactionError, _>(conn.client(), None, |tx| {
            tx.execute(INSERT_BARE_ITEM, &[&id, &code])
                .expect("Failed to insert in transaction");
            panic!("request handler panicked mid-write");
        })
    }));
    assert!(outcome.is_err());

    assert_eq!(items_with_code(&pool, &code), 0);
    assert_autocommits(&pool, &conn);
}

#[test]
fn test_stock_lifecycle_with_line_replacement() {
    let Some(pool) = test_pool() else { return };
    let fx = Fixture::create(&pool);
    let store = StockStore::new(pool.clone());
    let wh = fx.warehouse.warehouse_id;

    let created = insert_item(&store, &unique("CHS001"), vec![]);
    let item = store.get(&created.id).expect("Failed to get item");
    assert_eq!(item.qty, 0.0);
    assert!(item.jsonstokdetail.is_empty());
    assert_eq!(item.version, 1);

    replace_lines(
        &store,
        &created.id,
        vec![line(5.0, fx.rack_a.rak_id, wh), line(3.0, fx.rack_b.rak_id, wh)],
    )
    .expect("Failed to add lines");
    let item = store.get(&created.id).expect("Failed to get item");
    assert_eq!(item.qty, 8.0);
    assert_eq!(item.version, 2);
    assert_eq!(item.jsonstokdetail.len(), 2);
    assert_eq!(item.jsonstokdetail[0].qty, 5.0);
    assert_eq!(item.jsonstokdetail[0].rak_code.as_deref(), Some(fx.rack_a.rak_code.as_str()));
    assert_eq!(
        item.jsonstokdetail[1].name_warehouse.as_deref(),
        Some(fx.warehouse.name_warehouse.as_str())
    );

    replace_lines(&store, &created.id, vec![]).expect("Failed to clear lines");
    let item = store.get(&created.id).expect("Failed to get item");
    assert_eq!(item.qty, 0.0);
    assert!(item.jsonstokdetail.is_empty());
    assert_eq!(item.version, 3);
}

#[test]
fn test_get_joins_brand_and_model_names() {
    let Some(pool) = test_pool() else { return };
    let fx = Fixture::create(&pool);
    let store = StockStore::new(pool.clone());

    let mut item = StockItem::from_input(StockInput {
        produk_code: Some(unique("BT")),
        produk_ket: Some("Honda Beat".to_string()),
        brand_id: Some(fx.brand.id),
        model_id: Some(fx.model.id),
        buy: Some("15250000.50".parse().unwrap()),
        ..StockInput::default()
    });
    store.insert(&mut item).expect("Failed to insert stock item");

    let read = store.get(&item.id).expect("Failed to get item");
    assert_eq!(read.brandname.as_deref(), Some(fx.brand.name.as_str()));
    assert_eq!(read.modelname.as_deref(), Some(fx.model.name.as_str()));
    assert_eq!(read.buy, Some("15250000.50".parse().unwrap()));
    assert_eq!(read.sell, None);
}

#[test]
fn test_failed_line_insert_keeps_previous_state() {
    let Some(pool) = test_pool() else { return };
    let fx = Fixture::create(&pool);
    let store = StockStore::new(pool.clone());
    let wh = fx.warehouse.warehouse_id;

    let created = insert_item(
        &store,
        &unique("ATOM"),
        vec![line(5.0, fx.rack_a.rak_id, wh), line(3.0, fx.rack_b.rak_id, wh)],
    );

    // No such rack: the line insert fails after the old lines were deleted.
    let result = replace_lines(&store, &created.id, vec![line(1.0, i64::MAX, wh)]);
    assert!(matches!(result, Err(StoreError::Database(_))), "{:?}", result);

    let item = store.get(&created.id).expect("Failed to get item");
    assert_eq!(item.version, 1);
    assert_eq!(item.jsonstokdetail.len(), 2);
    assert_eq!(item.qty, 8.0);
}

#[test]
fn test_failed_insert_leaves_no_item() {
    let Some(pool) = test_pool() else { return };
    let fx = Fixture::create(&pool);
    let store = StockStore::new(pool.clone());
    let code = unique("NOLINE");

    let mut item = StockItem::from_input(StockInput {
        produk_code: Some(code.clone()),
        jsonstokdetail: Some(vec![line(2.0, i64::MAX, fx.warehouse.warehouse_id)]),
        ..StockInput::default()
    });
    assert!(store.insert(&mut item).is_err());

    let query = StockQuery {
        code,
        ..StockQuery::default()
    };
    let (items, metadata) = store.list(&query, &Filters::default()).expect("Failed to list");
    assert!(items.is_empty());
    assert_eq!(metadata.total_records, 0);
}

#[test]
fn test_concurrent_updates_from_same_version() {
    let Some(pool) = test_pool() else { return };
    let fx = Fixture::create(&pool);
    let store = StockStore::new(pool.clone());
    let created = insert_item(&store, &unique("RACE"), vec![]);

    let first = store.get(&created.id).expect("Failed to get item");
    let second = first.clone();
    let rak_id = fx.rack_a.rak_id;
    let wh = fx.warehouse.warehouse_id;

    let results: Vec<Result<(), StoreError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = [(first, 4.0), (second, 6.0)]
            .into_iter()
            .map(|(mut item, qty)| {
                let store = store.clone();
                scope.spawn(move || {
                    item.apply(StockInput {
                        jsonstokdetail: Some(vec![line(qty, rak_id, wh)]),
                        ..StockInput::default()
                    });
                    store.update(&mut item)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("update thread panicked"))
            .collect()
    });

    let won = results.iter().filter(|r| r.is_ok()).count();
    let conflicted = results
        .iter()
        .filter(|r| matches!(r, Err(StoreError::EditConflict)))
        .count();
    assert_eq!((won, conflicted), (1, 1), "{:?}", results);

    let item = store.get(&created.id).expect("Failed to get item");
    assert_eq!(item.version, 2);
    assert_eq!(item.jsonstokdetail.len(), 1);
}

#[test]
fn test_stale_version_is_rejected() {
    let Some(pool) = test_pool() else { return };
    let store = StockStore::new(pool.clone());
    let created = insert_item(&store, &unique("STALE"), vec![]);

    let mut stale = store.get(&created.id).expect("Failed to get item");
    replace_lines(&store, &created.id, vec![]).expect("Failed to update");

    stale.produk_ket = Some("overwrite".to_string());
    assert!(matches!(store.update(&mut stale), Err(StoreError::EditConflict)));
    let item = store.get(&created.id).expect("Failed to get item");
    assert_eq!(item.produk_ket, None);
    assert_eq!(item.version, 2);
}

#[test]
fn test_delete_removes_item_and_lines() {
    let Some(pool) = test_pool() else { return };
    let fx = Fixture::create(&pool);
    let store = StockStore::new(pool.clone());
    let created = insert_item(
        &store,
        &unique("DEL"),
        vec![line(1.0, fx.rack_a.rak_id, fx.warehouse.warehouse_id)],
    );
    assert_eq!(detail_count(&pool, &created.id), 1);

    store.delete(&created.id).expect("Failed to delete");
    assert!(matches!(store.get(&created.id), Err(StoreError::NotFound)));
    assert_eq!(detail_count(&pool, &created.id), 0);

    assert!(matches!(store.delete(&created.id), Err(StoreError::NotFound)));
    assert!(matches!(store.delete(""), Err(StoreError::NotFound)));
    assert!(matches!(store.get(""), Err(StoreError::NotFound)));
}

#[test]
fn test_list_pages_filters_and_derives_quantity() {
    let Some(pool) = test_pool() else { return };
    let fx = Fixture::create(&pool);
    let store = StockStore::new(pool.clone());
    let prefix = unique("PG");
    let wh = fx.warehouse.warehouse_id;

    for i in 0..5 {
        insert_item(
            &store,
            &format!("{}-{}", prefix, i),
            vec![line(i as f64, fx.rack_a.rak_id, wh), line(1.0, fx.rack_b.rak_id, wh)],
        );
    }

    let query = StockQuery {
        code: prefix.to_uppercase(),
        ..StockQuery::default()
    };
    let filters = Filters {
        page: 1,
        page_size: 2,
        sort: "produk_code".to_string(),
    };
    let (items, metadata) = store.list(&query, &filters).expect("Failed to list");
    assert_eq!(items.len(), 2);
    assert_eq!(metadata.total_records, 5);
    assert_eq!(metadata.last_page, 3);
    assert_eq!(items[0].produk_code, format!("{}-0", prefix));
    assert_eq!(items[1].qty, 2.0);
    assert!(items[0].jsonstokdetail.is_empty());

    let beyond = Filters {
        page: 4,
        ..filters
    };
    let (items, metadata) = store.list(&query, &beyond).expect("Failed to list");
    assert!(items.is_empty());
    assert_eq!(metadata.total_records, 5);
    assert_eq!(metadata.current_page, 4);

    let none = StockQuery {
        code: prefix.clone(),
        modelname: "no such model".to_string(),
        ..StockQuery::default()
    };
    let (items, metadata) = store.list(&none, &Filters::default()).expect("Failed to list");
    assert!(items.is_empty());
    assert_eq!(metadata.last_page, 0);
}

#[test]
fn test_transaction_deadline_rolls_back() {
    let Some(pool) = test_pool() else { return };
    let store = StockStore::new(pool.clone())
        .with_transaction_timeout(Some(std::time::Duration::from_nanos(1)));
    let code = unique("SLOW");

    let mut item = StockItem::from_input(StockInput {
        produk_code: Some(code.clone()),
        ..StockInput::default()
    });
    assert!(matches!(store.insert(&mut item), Err(StoreError::Timeout(_))));

    let query = StockQuery {
        code,
        ..StockQuery::default()
    };
    let (items, _) = StockStore::new(pool)
        .list(&query, &Filters::default())
        .expect("Failed to list");
    assert!(items.is_empty());
}

use dish_ledger::config::AppConfig;
use dish_ledger::{
    count_transactions, init_database, insert_transactions, ledger_table, list_transactions,
    load_csv, open_database, summary, DateRange, LedgerError, TransactionType,
};
use std::fs;

const CSV_HEADER: &str = "type,amount,description,date,category,account,supplier\n";

#[test]
fn test_csv_import_feeds_the_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("march.csv");
    fs::write(
        &csv_path,
        format!(
            "{CSV_HEADER}\
             income,880.50,lunch service,2024-03-02,营业收入,,堂食\n\
             expense,120,vegetables,2024-03-03,食材,微信,Fresh Farm\n\
             expense, 60.25 ,,2024-03-15,燃气,银行卡,City Gas\n"
        ),
    )
    .unwrap();

    let mut config = AppConfig::default();
    config.database.path = Some(dir.path().join("nested").join("ledger.db"));
    let db_path = config.prepare_database_path().unwrap();
    assert!(db_path.parent().unwrap().is_dir());

    let conn = open_database(&db_path).unwrap();
    init_database(&conn).unwrap();

    let rows = load_csv(&csv_path).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(insert_transactions(&conn, rows).unwrap(), 3);
    assert_eq!(count_transactions(&conn).unwrap(), 3);

    let stored = list_transactions(&conn, &DateRange::year(2024)).unwrap();
    assert_eq!(stored[0].date, "2024-03-15");
    assert_eq!(stored[0].description, "");
    // Blank account falls back to the default
    let income = stored.iter().find(|t| t.kind == TransactionType::Income).unwrap();
    assert_eq!(income.account, "现金");

    let stats = summary(&conn, &DateRange::year(2024)).unwrap();
    assert_eq!(stats.income, 880.5);
    assert_eq!(stats.expense, 180.25);

    let ledger = ledger_table(&conn, 2024).unwrap();
    assert_eq!(ledger.months[2].month, "2024-03");
    assert_eq!(ledger.months[2].balance, 700.25);
    assert_eq!(ledger.total_balance, 700.25);

    println!("✅ CSV import test PASSED");
}

#[test]
fn test_csv_batch_rejected_as_a_whole() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("bad.csv");
    fs::write(
        &csv_path,
        format!(
            "{CSV_HEADER}\
             expense,50,oil,2024-04-01,食材,,Fresh Farm\n\
             expense,30,napkins,2024-04-02,杂费,,\n"
        ),
    )
    .unwrap();

    let conn = open_database(&dir.path().join("ledger.db")).unwrap();
    init_database(&conn).unwrap();

    let err = insert_transactions(&conn, load_csv(&csv_path).unwrap()).unwrap_err();
    match err {
        LedgerError::Validation { message } => assert!(message.starts_with("1 records have no supplier")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(count_transactions(&conn).unwrap(), 0);
}

#[test]
fn test_database_reopens_with_data() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("ledger.db");

    {
        let conn = open_database(&db_path).unwrap();
        init_database(&conn).unwrap();
        let rows = vec![dish_ledger::NewTransaction::new(TransactionType::Expense, 9.9, "2024-05-05")
            .with_names("食材", "现金", "Market")];
        insert_transactions(&conn, rows).unwrap();
    }

    let conn = open_database(&db_path).unwrap();
    init_database(&conn).unwrap();
    assert_eq!(count_transactions(&conn).unwrap(), 1);
}

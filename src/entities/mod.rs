// Stored records
//
// - transaction: income/expense rows feeding the analysis
// - memo: notes with tag filtering and highlighting
// - tag: colour palette for memo tags

pub mod transaction;
pub mod memo;
pub mod tag;

pub use transaction::{
    Transaction, TransactionType, NewTransaction, DEFAULT_ACCOUNT,
    insert_transaction, insert_transactions, list_transactions, count_transactions, load_csv,
};
pub use memo::{
    Memo, NewMemo, MemoFilter, MemoStats, MemoView, TagChip, TagsInput,
    normalize_tags, normalize_memo_date, insert_memo, list_memos, memo_stats,
    distinct_tags, highlight_tags,
};
pub use tag::{Tag, DEFAULT_TAG_COLOR, list_tags, insert_tag, tag_colors, color_for};

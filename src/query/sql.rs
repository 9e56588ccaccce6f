use sigsearch_core::NUM_MASKS;

use super::table_name;

/// BigQuery statement equivalent to [`find_similar`](super::find_similar)
/// before the spatial post-filter.
///
/// Used by `sigsearch similar --explain` and by engines that take raw SQL.
/// Identifiers are backtick-quoted; the signature is inlined as a decimal
/// literal.
pub fn render_union_sql(
    dataset: &str,
    suffix: &str,
    signature: i64,
    partitions: &[u32; NUM_MASKS],
    max_hamming: u32,
    limit: usize,
) -> String {
    let branches: Vec<String> = partitions
        .iter()
        .enumerate()
        .map(|(index, part)| {
            format!(
                "SELECT signature, BIT_COUNT(signature^{signature}) AS hamming, x, y, z FROM `{table}`\n\
                 WHERE part={part} AND BIT_COUNT(signature^{signature}) < {max_hamming}\n",
                table = table_name(dataset, suffix, index),
            )
        })
        .collect();

    let mut sql = branches.join("UNION DISTINCT\n");
    sql.push_str(&format!(
        "ORDER BY BIT_COUNT(signature^{signature}), rand()\nLIMIT {limit}"
    ));
    sql
}

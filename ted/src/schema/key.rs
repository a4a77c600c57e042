//! Lookup-key selection among a table's unique constraints.

use crate::dialect::DbType;

use super::Column;
use super::catalog::KeyCandidate;

/// Width charged for variable-length types without a declared length.
const UNBOUNDED_WIDTH: u64 = 1 << 20;

/// Estimated storage width in bytes of a value of `declared_type`.
pub fn type_width(declared_type: &str) -> u64 {
    let t = declared_type.trim().to_ascii_lowercase();
    let (base, args) = match t.split_once('(') {
        Some((base, rest)) => (base.trim(), rest.split(')').next().unwrap_or("")),
        None => (t.as_str(), ""),
    };
    let length = args
        .split(',')
        .next()
        .and_then(|n| n.trim().parse::<u64>().ok());
    match base {
        "bool" | "boolean" | "tinyint" | "int1" => 1,
        "smallint" | "int2" | "smallserial" => 2,
        "mediumint" => 3,
        "int" | "integer" | "int4" | "serial" | "real" | "float4" | "date" => 4,
        "bigint" | "int8" | "bigserial" | "double" | "double precision" | "float8" | "float"
        | "timestamp" | "timestamptz" | "datetime" | "time" | "money" => 8,
        "uuid" | "hugeint" | "uhugeint" => 16,
        "numeric" | "decimal" => length.map(|p| p / 2 + 1).unwrap_or(16),
        "char" | "character" | "nchar" | "varchar" | "character varying" | "nvarchar"
        | "binary" | "varbinary" | "bit" | "bit varying" | "varbit" => {
            length.unwrap_or(UNBOUNDED_WIDTH)
        }
        _ if base.starts_with("timestamp") || base.starts_with("time ") => 8,
        _ => UNBOUNDED_WIDTH,
    }
}

/// Pick the lookup key: the primary key if there is one, otherwise the
/// narrowest eligible unique constraint. Returns column positions.
pub fn choose_key(db_type: DbType, columns: &[Column], candidates: &[KeyCandidate]) -> Vec<usize> {
    let resolve = |c: &KeyCandidate| -> Option<Vec<usize>> {
        c.columns
            .iter()
            .map(|name| {
                columns
                    .iter()
                    .position(|col| col.name == *name)
                    .or_else(|| columns.iter().position(|col| col.name.eq_ignore_ascii_case(name)))
            })
            .collect()
    };

    if let Some(pk) = candidates.iter().find(|c| c.primary).and_then(resolve) {
        return pk;
    }

    let mut eligible: Vec<(&KeyCandidate, Vec<usize>)> = candidates
        .iter()
        .filter(|c| !c.primary)
        .filter_map(|c| resolve(c).map(|pos| (c, pos)))
        .filter(|(c, pos)| {
            let nulls_collide = db_type == DbType::Postgres && c.nulls_not_distinct;
            nulls_collide || pos.iter().all(|&i| !columns[i].nullable)
        })
        .collect();

    eligible.sort_by(|(a, pa), (b, pb)| {
        let width = |pos: &[usize]| -> u64 {
            pos.iter()
                .map(|&i| type_width(&columns[i].type_name))
                .fold(0u64, u64::saturating_add)
        };
        pa.len()
            .cmp(&pb.len())
            .then_with(|| width(pa).cmp(&width(pb)))
            .then_with(|| a.name.cmp(&b.name))
    });

    eligible
        .into_iter()
        .next()
        .map(|(_, pos)| pos)
        .unwrap_or_default()
}

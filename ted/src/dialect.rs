use std::fmt;

/// SQL backends the engine can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbType {
    Sqlite,
    Postgres,
    Mysql,
    Duckdb,
}

impl DbType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DbType::Sqlite => "sqlite",
            DbType::Postgres => "postgres",
            DbType::Mysql => "mysql",
            DbType::Duckdb => "duckdb",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Some(DbType::Sqlite),
            "postgres" | "postgresql" | "pg" => Some(DbType::Postgres),
            "mysql" | "mariadb" | "my" => Some(DbType::Mysql),
            "duckdb" | "duck" => Some(DbType::Duckdb),
            _ => None,
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Words that are never emitted unquoted. Deliberately broader than any
/// single backend's reserved list.
const RESERVED: &[&str] = &[
    "all", "alter", "analyze", "and", "any", "as", "asc", "between", "by", "case", "cast",
    "check", "column", "constraint", "create", "cross", "current_date", "current_time",
    "current_timestamp", "current_user", "default", "delete", "desc", "distinct", "drop",
    "else", "end", "except", "exists", "false", "fetch", "for", "foreign", "from", "full",
    "grant", "group", "having", "in", "index", "inner", "insert", "intersect", "interval",
    "into", "is", "join", "key", "left", "like", "limit", "natural", "not", "null", "offset",
    "on", "or", "order", "outer", "primary", "references", "returning", "right", "row",
    "rows", "select", "set", "some", "table", "then", "to", "true", "union", "unique",
    "update", "user", "using", "values", "view", "when", "where", "window", "with",
];

/// Per-backend capability record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    pub db_type: DbType,
    pub supports_returning: bool,
    pub supports_row_value_comparison: bool,
    /// PostgreSQL 15+: unique constraints may declare `NULLS NOT DISTINCT`.
    pub supports_nulls_not_distinct: bool,
}

impl Dialect {
    /// Static capabilities assuming a current server version.
    pub fn new(db_type: DbType) -> Self {
        Self {
            db_type,
            supports_returning: !matches!(db_type, DbType::Mysql),
            supports_row_value_comparison: !matches!(db_type, DbType::Mysql),
            supports_nulls_not_distinct: matches!(db_type, DbType::Postgres),
        }
    }

    /// SQLite gained RETURNING in 3.35 and row values in 3.15.
    pub fn sqlite(version: (u32, u32)) -> Self {
        Self {
            db_type: DbType::Sqlite,
            supports_returning: version >= (3, 35),
            supports_row_value_comparison: version >= (3, 15),
            supports_nulls_not_distinct: false,
        }
    }

    /// `server_version_num`, e.g. 150004 for 15.4.
    pub fn postgres(server_version_num: u32) -> Self {
        Self {
            supports_nulls_not_distinct: server_version_num >= 150000,
            ..Self::new(DbType::Postgres)
        }
    }

    fn quote_char(&self) -> char {
        match self.db_type {
            DbType::Mysql => '`',
            _ => '"',
        }
    }

    /// Quote a single identifier when it is not a plain lowercase word.
    pub fn quote(&self, ident: &str) -> String {
        if is_plain_identifier(ident) {
            return ident.to_string();
        }
        let q = self.quote_char();
        let mut out = String::with_capacity(ident.len() + 2);
        out.push(q);
        for c in ident.chars() {
            if c == q {
                out.push(q);
            }
            out.push(c);
        }
        out.push(q);
        out
    }

    /// Quote a possibly schema-qualified name, part by part.
    pub fn quote_qualified(&self, name: &str) -> String {
        name.split('.')
            .map(|part| self.quote(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Inverse of [`Dialect::quote`].
    pub fn unquote(&self, s: &str) -> String {
        let q = self.quote_char();
        let mut chars = s.chars();
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            chars.next();
            chars.next_back();
            let doubled: String = [q, q].iter().collect();
            chars.as_str().replace(&doubled, &q.to_string())
        } else {
            s.to_string()
        }
    }

    /// Placeholder for the parameter at 1-based `pos`.
    pub fn placeholder(&self, pos: usize) -> String {
        match self.db_type {
            DbType::Postgres => format!("${pos}"),
            _ => "?".to_string(),
        }
    }

    /// Placeholder for a value bound against a column of `declared_type`.
    ///
    /// PostgreSQL types its parameters, so text-coerced values need an
    /// explicit cast to the column type.
    pub fn typed_placeholder(&self, pos: usize, declared_type: &str) -> String {
        match self.db_type {
            DbType::Postgres if !declared_type.is_empty() => {
                format!("CAST(${pos} AS {declared_type})")
            }
            _ => self.placeholder(pos),
        }
    }

    /// NULL placement for an ORDER BY term so NULLs sort below every value.
    /// SQLite and MySQL already order NULLs that way.
    pub fn nulls_order(&self, ascending: bool) -> &'static str {
        match (self.db_type, ascending) {
            (DbType::Postgres | DbType::Duckdb, true) => " NULLS FIRST",
            (DbType::Postgres | DbType::Duckdb, false) => " NULLS LAST",
            _ => "",
        }
    }

    /// Projection of one column in a SELECT list.
    pub fn select_column(&self, name: &str, declared_type: &str) -> String {
        let quoted = self.quote(name);
        match self.db_type {
            DbType::Postgres if !pg_decodable(declared_type) => {
                format!("{quoted}::text AS {quoted}")
            }
            _ => quoted,
        }
    }
}

fn is_plain_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_lowercase() || first == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !RESERVED.contains(&ident)
}

/// Postgres types the driver decodes without a text cast.
fn pg_decodable(declared_type: &str) -> bool {
    const NATIVE: &[&str] = &[
        "smallint",
        "integer",
        "bigint",
        "real",
        "double precision",
        "numeric",
        "boolean",
        "text",
        "character varying",
        "character",
        "\"char\"",
        "name",
        "bytea",
        "timestamp without time zone",
        "timestamp with time zone",
        "timestamp",
        "date",
        "time without time zone",
        "time",
        "uuid",
        "json",
        "jsonb",
    ];
    let t = declared_type.to_ascii_lowercase();
    if t.ends_with("[]") {
        return false;
    }
    let base = t.split('(').next().unwrap_or("").trim();
    NATIVE.contains(&base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_identifiers_stay_bare() {
        let d = Dialect::new(DbType::Postgres);
        assert_eq!(d.quote("users"), "users");
        assert_eq!(d.quote("_tmp1"), "_tmp1");
    }

    #[test]
    fn reserved_and_mixed_case_are_quoted() {
        let pg = Dialect::new(DbType::Postgres);
        assert_eq!(pg.quote("order"), "\"order\"");
        assert_eq!(pg.quote("UserName"), "\"UserName\"");
        assert_eq!(pg.quote("1st"), "\"1st\"");
        let my = Dialect::new(DbType::Mysql);
        assert_eq!(my.quote("select"), "`select`");
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        let pg = Dialect::new(DbType::Postgres);
        assert_eq!(pg.quote("a\"b"), "\"a\"\"b\"");
        let my = Dialect::new(DbType::Mysql);
        assert_eq!(my.quote("a`b"), "`a``b`");
    }

    #[test]
    fn qualified_names_quote_each_part() {
        let pg = Dialect::new(DbType::Postgres);
        assert_eq!(pg.quote_qualified("public.Users"), "public.\"Users\"");
        assert_eq!(pg.quote_qualified("users"), "users");
    }

    #[test]
    fn quote_unquote_round_trip() {
        let samples = [
            "users", "Users", "order", "a\"b", "a`b", "with space", "ünï", "", "x.y", "\"",
        ];
        for db in [DbType::Sqlite, DbType::Postgres, DbType::Mysql, DbType::Duckdb] {
            let d = Dialect::new(db);
            for s in samples {
                assert_eq!(d.unquote(&d.quote(s)), s, "{db} round trip of {s:?}");
            }
        }
    }

    #[test]
    fn placeholders_follow_backend_style() {
        assert_eq!(Dialect::new(DbType::Postgres).placeholder(3), "$3");
        assert_eq!(Dialect::new(DbType::Sqlite).placeholder(3), "?");
        assert_eq!(Dialect::new(DbType::Mysql).placeholder(1), "?");
        assert_eq!(
            Dialect::new(DbType::Postgres).typed_placeholder(2, "uuid"),
            "CAST($2 AS uuid)"
        );
        assert_eq!(Dialect::new(DbType::Sqlite).typed_placeholder(2, "uuid"), "?");
    }

    #[test]
    fn capability_flags() {
        assert!(!Dialect::new(DbType::Mysql).supports_returning);
        assert!(Dialect::new(DbType::Duckdb).supports_returning);
        assert!(Dialect::sqlite((3, 45)).supports_returning);
        assert!(!Dialect::sqlite((3, 31)).supports_returning);
        assert!(!Dialect::postgres(140009).supports_nulls_not_distinct);
        assert!(Dialect::postgres(160001).supports_nulls_not_distinct);
    }

    #[test]
    fn postgres_casts_exotic_types_to_text() {
        let pg = Dialect::new(DbType::Postgres);
        assert_eq!(pg.select_column("id", "integer"), "id");
        assert_eq!(pg.select_column("mood", "mood"), "mood::text AS mood");
        assert_eq!(pg.select_column("tags", "text[]"), "tags::text AS tags");
        assert_eq!(pg.select_column("name", "character varying(20)"), "name");
    }
}

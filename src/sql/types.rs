//! Column type spelling: dialect aliases to canonical names on import, and
//! canonical names to dialect spelling on export.

use super::SqlDialect;

/// Normalize a SQL column type. Aliases collapse to one spelling, parameters
/// and suffixes (`(10,2)`, `[]`, `unsigned`) are kept.
pub fn normalize_type(sql_type: &str, dialect: SqlDialect) -> String {
    let collapsed = sql_type.split_whitespace().collect::<Vec<_>>().join(" ");
    let lower;
    let (base, rest) = match collapsed.find(['(', '[']) {
        Some(i) => {
            lower = collapsed[..i].trim().to_lowercase();
            // Parameters keep their case: enum('A','b')
            (lower.as_str(), collapsed[i..].replace(", ", ","))
        }
        None => {
            lower = collapsed.to_lowercase();
            split_modifier(&lower)
        }
    };

    let mapped = match dialect {
        SqlDialect::MySQL => map_mysql_type(base, &rest),
        _ => map_postgres_type(base),
    };
    match mapped {
        // tinyint(1) already consumed its parameter
        "boolean" if base == "tinyint" => mapped.to_string(),
        _ => format!("{}{}", mapped, rest),
    }
}

/// `int unsigned` → (`int`, ` unsigned`)
fn split_modifier(lower: &str) -> (&str, String) {
    match lower.strip_suffix(" unsigned") {
        Some(base) => (base, " unsigned".to_string()),
        None => (lower, String::new()),
    }
}

fn map_postgres_type(base: &str) -> &str {
    match base {
        // Integer types
        "int" | "int4" | "integer" => "int",
        "bigint" | "int8" => "bigint",
        "smallint" | "int2" => "smallint",
        "serial" | "serial4" => "serial",
        "bigserial" | "serial8" => "bigserial",
        "smallserial" | "serial2" => "smallserial",

        // Floating point
        "real" | "float4" => "real",
        "double precision" | "float8" | "double" => "double precision",
        "decimal" | "numeric" => "numeric",

        // String types
        "varchar" | "character varying" => "varchar",
        "char" | "character" | "bpchar" => "char",

        // Date/time
        "timestamp" | "timestamp without time zone" => "timestamp",
        "timestamptz" | "timestamp with time zone" => "timestamptz",
        "time" | "time without time zone" => "time",
        "timetz" | "time with time zone" => "timetz",

        "boolean" | "bool" => "boolean",

        // Default: keep original
        _ => base,
    }
}

fn map_mysql_type<'a>(base: &'a str, params: &str) -> &'a str {
    match base {
        "int" | "integer" => "int",
        // TINYINT(1) is the MySQL boolean
        "tinyint" if params == "(1)" => "boolean",
        "bool" | "boolean" => "boolean",
        "double precision" | "double" => "double",
        "decimal" | "numeric" | "dec" => "decimal",
        "character varying" | "varchar" => "varchar",
        "character" | "char" => "char",
        _ => base,
    }
}

/// Spell a canonical type for the target dialect.
pub fn spell_type(typ: &str, dialect: SqlDialect) -> String {
    let lower = typ.to_lowercase();
    match dialect {
        SqlDialect::MySQL => match lower.as_str() {
            "boolean" | "bool" => "tinyint(1)".to_string(),
            "uuid" => "char(36)".to_string(),
            "timestamptz" => "timestamp".to_string(),
            "jsonb" => "json".to_string(),
            "bytea" => "blob".to_string(),
            "double precision" => "double".to_string(),
            _ if lower.ends_with("[]") => "json".to_string(),
            _ => typ.to_string(),
        },
        _ => match lower.as_str() {
            "datetime" => "timestamp".to_string(),
            _ => typ.to_string(),
        },
    }
}

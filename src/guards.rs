use itertools::Itertools;

use crate::ast::{Event, ForeignKeyArray, Immutable};
use crate::compiler::{Compilation, Timing};
use crate::guard::{body, RETURN_ROW};
use crate::naming;
use crate::quote::Quoting;

fn message(text: &str) -> String {
    text.replace('\'', "''").replace('%', "%%")
}

pub fn immutable(quoting: &dyn Quoting, rule: &Immutable) -> Compilation {
    // NULL-aware comparison: NULL -> NULL passes, NULL <-> value does not.
    let checks = rule
        .columns
        .iter()
        .map(|column| {
            let quoted = quoting.quote_identifier(column);
            format!(
                "IF NEW.{quoted} IS DISTINCT FROM OLD.{quoted} THEN\n  RAISE EXCEPTION 'Attempted {name} update on %.%: Old: %, New: %', TG_TABLE_SCHEMA, TG_TABLE_NAME, OLD.{quoted}, NEW.{quoted};\nEND IF;",
                quoted = quoted,
                name = message(column),
            )
        })
        .join("\n");

    let mut compilation = Compilation::default();
    compilation.add_trigger(
        &rule.table,
        naming::immutable(rule),
        &[Event::Update],
        Timing::Before,
        body(&[], rule.options.trigger_depth_limit, &checks, "RETURN NEW;"),
    );
    compilation
}

pub fn foreign_key_array(quoting: &dyn Quoting, rule: &ForeignKeyArray) -> Compilation {
    let (owner_names, referenced_names) = naming::foreign_key_array(quoting, rule);

    let table = quoting.quote_schema_table(&rule.table);
    let column = quoting.quote_identifier(&rule.column);
    let referenced_table = quoting.quote_schema_table(&rule.referenced_table);
    let referenced_column = quoting.quote_identifier(&rule.referenced_column);

    let owner_label = message(&format!("{}.{}", table, column));
    let referenced_label = message(&format!("{}.{}", referenced_table, referenced_column));

    let owner_checks = format!(
        "arr := NEW.{column};
IF array_ndims(arr) > 1 THEN
  RAISE EXCEPTION 'Foreign key array {owner} has more than 1 dimension: %, dimensions: %', arr, array_ndims(arr);
END IF;
SELECT count(*) INTO temp_count1 FROM unnest(arr);
SELECT count(*) INTO temp_count2 FROM (SELECT DISTINCT * FROM unnest(arr)) AS t;
IF temp_count1 != temp_count2 THEN
  RAISE EXCEPTION 'Duplicate entry in foreign key array {owner}: %', arr;
END IF;
SELECT count(*) INTO temp_count1 FROM {referenced_table} WHERE {referenced_column} = ANY(arr);
temp_count2 := array_length(arr, 1);
IF temp_count1 != temp_count2 THEN
  RAISE EXCEPTION 'Entry in foreign key array {owner} not in referenced column {referenced}: %', arr;
END IF;",
        column = column,
        owner = owner_label,
        referenced = referenced_label,
        referenced_table = referenced_table,
        referenced_column = referenced_column,
    );

    let referenced_checks = format!(
        "IF (TG_OP = 'UPDATE' AND NEW.{referenced_column} IS NOT DISTINCT FROM OLD.{referenced_column}) THEN
  RETURN NEW;
END IF;
val := OLD.{referenced_column};
SELECT count(*) INTO temp_count FROM {table} WHERE {column} @> ARRAY[val];
IF temp_count > 0 THEN
  RAISE EXCEPTION 'Entry in referenced column {referenced} still in foreign key array {owner}: %, rows: %', val, temp_count;
END IF;",
        referenced_column = referenced_column,
        table = table,
        column = column,
        owner = owner_label,
        referenced = referenced_label,
    );

    let limit = rule.options.trigger_depth_limit;
    let mut compilation = Compilation::default();
    compilation.add_trigger(
        &rule.table,
        owner_names,
        &[Event::Insert, Event::Update],
        Timing::Before,
        body(
            &[
                format!("arr {}.{}%TYPE;", table, column),
                "temp_count1 int;".to_owned(),
                "temp_count2 int;".to_owned(),
            ],
            limit,
            &owner_checks,
            "RETURN NEW;",
        ),
    );
    compilation.add_trigger(
        &rule.referenced_table,
        referenced_names,
        &[Event::Update, Event::Delete],
        Timing::Before,
        body(
            &[
                format!("val {}.{}%TYPE;", referenced_table, referenced_column),
                "temp_count int;".to_owned(),
            ],
            limit,
            &referenced_checks,
            RETURN_ROW,
        ),
    );
    compilation
}

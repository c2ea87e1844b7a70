pub const RETURN_ROW: &str = "IF (TG_OP = 'DELETE') THEN\n  RETURN OLD;\nEND IF;\nRETURN NEW;";

pub fn depth_guard(limit: Option<i64>) -> Option<String> {
    limit.map(|limit| {
        format!(
            "IF pg_trigger_depth() > {} THEN\n  IF (TG_OP = 'DELETE') THEN\n    RETURN OLD;\n  END IF;\n  RETURN NEW;\nEND IF;",
            limit
        )
    })
}

pub fn body(declare: &[String], limit: Option<i64>, statements: &str, tail: &str) -> String {
    let mut s = String::new();
    if !declare.is_empty() {
        s.push_str("DECLARE\n");
        for declaration in declare {
            s.push_str("  ");
            s.push_str(declaration);
            s.push('\n');
        }
    }
    s.push_str("BEGIN\n");
    for section in depth_guard(limit).iter().map(String::as_str).chain([statements, tail]) {
        if section.is_empty() {
            continue;
        }
        for line in section.lines() {
            s.push_str("  ");
            s.push_str(line);
            s.push('\n');
        }
    }
    s.push_str("END;");
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_guard_without_limit() {
        assert_eq!(depth_guard(None), None);
        assert_eq!(
            body(&[], None, "NULL;", RETURN_ROW),
            "BEGIN\n  NULL;\n  IF (TG_OP = 'DELETE') THEN\n    RETURN OLD;\n  END IF;\n  RETURN NEW;\nEND;"
        );
    }

    #[test]
    fn test_guard_comes_first() {
        let body = body(&["n int;".to_owned()], Some(2), "NULL;", "RETURN NEW;");
        assert!(body.starts_with("DECLARE\n  n int;\nBEGIN\n  IF pg_trigger_depth() > 2 THEN\n"));
        let guard = body.find("pg_trigger_depth").unwrap();
        let statement = body.find("NULL;").unwrap();
        assert!(guard < statement);
        assert!(body.ends_with("  RETURN NEW;\nEND;"));
    }
}

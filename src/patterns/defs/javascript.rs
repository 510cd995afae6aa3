//! JavaScript pattern table (also serves TypeScript via fallback).

use super::Pattern;
use super::{
    PatternCategory::{Architecture, Documentation, Structure, Syntax},
    query, with_fallbacks, with_recovery, with_tests, without_name,
};

const LANG: &str = "javascript";

pub fn patterns() -> Vec<Pattern> {
    vec![
        with_tests(
            with_recovery(
                query(
                    LANG,
                    "javascript.function",
                    Syntax,
                    "[(function_declaration name: (identifier) @name) @item (method_definition name: (property_identifier) @name) @item]",
                    "function",
                ),
                r"^\s*(?:async\s+)?function\s*\*?\s*(?P<name>\w+)",
            ),
            &[("function greet(name) { return name; }\n", true), ("const x = 1;\n", false)],
        ),
        with_fallbacks(
            query(
                LANG,
                "javascript.arrow_binding",
                Syntax,
                "(variable_declarator name: (identifier) @name value: (arrow_function)) @item",
                "arrow_function",
            ),
            &["javascript.function"],
        ),
        with_tests(
            with_recovery(
                query(
                    LANG,
                    "javascript.class",
                    Syntax,
                    "(class_declaration name: (identifier) @name) @item",
                    "class",
                ),
                r"^\s*class\s+(?P<name>\w+)",
            ),
            &[("class Widget {}\n", true)],
        ),
        with_recovery(
            without_name(query(
                LANG,
                "javascript.import",
                Structure,
                "(import_statement) @item",
                "import",
            )),
            r#"^\s*import\s+.*?from\s+['"](?P<name>[^'"]+)['"]"#,
        ),
        without_name(query(
            LANG,
            "javascript.branch",
            Structure,
            "[(if_statement) @item (for_statement) @item (while_statement) @item (switch_statement) @item]",
            "branch",
        )),
        without_name(query(
            LANG,
            "javascript.comment",
            Documentation,
            "(comment) @item",
            "comment",
        )),
        without_name(query(
            LANG,
            "javascript.export",
            Architecture,
            "(export_statement) @item",
            "export",
        )),
    ]
}

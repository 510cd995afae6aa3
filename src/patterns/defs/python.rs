//! Python pattern table.

use super::{
    PatternCategory::{Architecture, Documentation, ErrorHandling, Naming, Semantics, Structure, Syntax},
    query, regex, with_fallbacks, with_recovery, with_tests, without_name,
};
use super::Pattern;

const LANG: &str = "python";

pub fn patterns() -> Vec<Pattern> {
    vec![
        with_tests(
            with_recovery(
                query(
                    LANG,
                    "python.function",
                    Syntax,
                    "(function_definition name: (identifier) @name) @item",
                    "function",
                ),
                r"^\s*(?:async\s+)?def\s+(?P<name>\w+)",
            ),
            &[
                ("def foo(a, b):\n    return a + b\n", true),
                ("x = 1\n", false),
            ],
        ),
        with_tests(
            with_recovery(
                query(
                    LANG,
                    "python.class",
                    Syntax,
                    "(class_definition name: (identifier) @name) @item",
                    "class",
                ),
                r"^\s*class\s+(?P<name>\w+)",
            ),
            &[("class Foo:\n    pass\n", true), ("def foo(): pass\n", false)],
        ),
        with_tests(
            with_recovery(
                without_name(query(
                    LANG,
                    "python.import",
                    Structure,
                    "[(import_statement) @item (import_from_statement) @item]",
                    "import",
                )),
                r"^\s*(?:from|import)\s+(?P<name>[\w.]+)",
            ),
            &[("import os\n", true), ("from a.b import c\n", true)],
        ),
        without_name(query(
            LANG,
            "python.decorator",
            Structure,
            "(decorator) @item",
            "decorator",
        )),
        without_name(query(
            LANG,
            "python.branch",
            Structure,
            "[(if_statement) @item (for_statement) @item (while_statement) @item (with_statement) @item]",
            "branch",
        )),
        // A standalone string expression is a docstring in practice.
        with_tests(
            without_name(query(
                LANG,
                "python.docstring",
                Documentation,
                "(expression_statement (string) @item)",
                "docstring",
            )),
            &[("def f():\n    \"\"\"doc\"\"\"\n", true)],
        ),
        without_name(query(
            LANG,
            "python.comment",
            Documentation,
            "(comment) @item",
            "comment",
        )),
        query(
            LANG,
            "python.type_hint",
            Semantics,
            "(typed_parameter (identifier) @name) @item",
            "type_hint",
        ),
        query(
            LANG,
            "python.binding",
            Naming,
            "(assignment left: (identifier) @name) @item",
            "binding",
        ),
        with_fallbacks(
            without_name(query(
                LANG,
                "python.exception_handler",
                ErrorHandling,
                "(try_statement (except_clause) @item)",
                "exception_handler",
            )),
            &["python.branch"],
        ),
        without_name(regex(
            LANG,
            "python.main_guard",
            Architecture,
            r#"(?m)^if\s+__name__\s*==\s*['"]__main__['"]"#,
            "entry_point",
        )),
    ]
}

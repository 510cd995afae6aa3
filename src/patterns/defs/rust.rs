//! Rust pattern table.

use super::Pattern;
use super::{
    PatternCategory::{
        Architecture, CodePattern, Documentation, ErrorHandling, Structure, Syntax,
    },
    query, regex, with_recovery, with_tests, without_name,
};

const LANG: &str = "rust";

pub fn patterns() -> Vec<Pattern> {
    vec![
        with_tests(
            with_recovery(
                query(
                    LANG,
                    "rust.function",
                    Syntax,
                    "(function_item name: (identifier) @name) @item",
                    "function",
                ),
                r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:const\s+)?(?:unsafe\s+)?fn\s+(?P<name>\w+)",
            ),
            &[("fn main() {}\n", true), ("let x = 1;\n", false)],
        ),
        with_tests(
            with_recovery(
                query(
                    LANG,
                    "rust.struct",
                    Syntax,
                    "(struct_item name: (type_identifier) @name) @item",
                    "struct",
                ),
                r"^\s*(?:pub(?:\([^)]*\))?\s+)?struct\s+(?P<name>\w+)",
            ),
            &[("struct Point { x: i32 }\n", true)],
        ),
        query(
            LANG,
            "rust.enum",
            Syntax,
            "(enum_item name: (type_identifier) @name) @item",
            "enum",
        ),
        query(
            LANG,
            "rust.trait",
            Syntax,
            "(trait_item name: (type_identifier) @name) @item",
            "trait",
        ),
        without_name(query(
            LANG,
            "rust.impl",
            Structure,
            "(impl_item) @item",
            "impl",
        )),
        with_recovery(
            without_name(query(
                LANG,
                "rust.use",
                Structure,
                "(use_declaration) @item",
                "import",
            )),
            r"^\s*use\s+(?P<name>[\w:]+)",
        ),
        without_name(query(
            LANG,
            "rust.branch",
            Structure,
            "[(if_expression) @item (for_expression) @item (while_expression) @item (match_expression) @item]",
            "branch",
        )),
        with_tests(
            regex(
                LANG,
                "rust.doc_comment",
                Documentation,
                r"(?m)^[ \t]*///[ \t]?(?P<name>.*)$",
                "doc_comment",
            ),
            &[("/// Frobnicates the widget\nfn f() {}\n", true), ("// plain\n", false)],
        ),
        without_name(query(
            LANG,
            "rust.line_comment",
            Documentation,
            "(line_comment) @item",
            "comment",
        )),
        without_name(regex(
            LANG,
            "rust.panic_path",
            ErrorHandling,
            r"\.unwrap\(\)|\.expect\(|panic!\(",
            "panic_path",
        )),
        without_name(regex(
            LANG,
            "rust.question_mark",
            CodePattern,
            r"\)\?[;.]",
            "error_propagation",
        )),
        query(
            LANG,
            "rust.module",
            Architecture,
            "(mod_item name: (identifier) @name) @item",
            "module",
        ),
    ]
}

//! Pattern tables for the format-parser languages (regex-kind).

use super::Pattern;
use super::{
    PatternCategory::{CodePattern, Documentation, Semantics, Structure, Syntax},
    regex, with_tests, without_name,
};

pub fn patterns(language_id: &str) -> Vec<Pattern> {
    match language_id {
        "markdown" => markdown(),
        "rst" => vec![
            regex(
                "rst",
                "rst.directive",
                Documentation,
                r"(?m)^\.\.\s+(?P<name>[\w-]+)::",
                "directive",
            ),
            regex(
                "rst",
                "rst.section",
                Documentation,
                r"(?m)^(?P<name>\S[^\n]*)\n(=+|-+|~+|\^+)\s*$",
                "section",
            ),
        ],
        "asciidoc" => vec![
            regex(
                "asciidoc",
                "asciidoc.heading",
                Documentation,
                r"(?m)^=+[ \t]+(?P<name>.+)$",
                "heading",
            ),
            regex(
                "asciidoc",
                "asciidoc.attribute",
                Semantics,
                r"(?m)^:(?P<name>[\w-]+):",
                "attribute",
            ),
        ],
        "ini" | "editorconfig" => vec![
            regex(
                language_id,
                &format!("{language_id}.section"),
                Structure,
                r"(?m)^\s*\[(?P<name>[^\]]+)\]\s*$",
                "section",
            ),
            regex(
                language_id,
                &format!("{language_id}.property"),
                Semantics,
                r"(?m)^\s*(?P<name>[\w.-]+)\s*[=:]\s*\S",
                "setting",
            ),
        ],
        "toml" => vec![
            with_tests(
                regex(
                    "toml",
                    "toml.table",
                    Structure,
                    r"(?m)^\s*\[\[?(?P<name>[^\]]+?)\]\]?\s*$",
                    "table",
                ),
                &[("[dependencies]\nserde = \"1\"\n", true), ("x = 1\n", false)],
            ),
            regex(
                "toml",
                "toml.pair",
                Semantics,
                r#"(?m)^\s*(?P<name>[\w.-]+)\s*=\s*\S"#,
                "setting",
            ),
        ],
        "yaml" => vec![
            with_tests(
                regex(
                    "yaml",
                    "yaml.top_key",
                    Structure,
                    r"(?m)^(?P<name>[\w-]+):",
                    "mapping_key",
                ),
                &[("services:\n  web:\n    image: x\n", true)],
            ),
            regex(
                "yaml",
                "yaml.anchor",
                Semantics,
                r"&(?P<name>[\w-]+)",
                "anchor",
            ),
        ],
        "json" => vec![regex(
            "json",
            "json.key",
            Semantics,
            r#""(?P<name>[^"\\]+)"\s*:"#,
            "key",
        )],
        "env" => vec![regex(
            "env",
            "env.pair",
            Semantics,
            r"(?m)^(?:export\s+)?(?P<name>[A-Za-z_][A-Za-z0-9_]*)=",
            "setting",
        )],
        "graphql" => vec![regex(
            "graphql",
            "graphql.definition",
            Syntax,
            r"(?m)^\s*(?:type|interface|enum|input|union|scalar|fragment)\s+(?P<name>\w+)",
            "definition",
        )],
        "xml" => vec![
            regex(
                "xml",
                "xml.element",
                Structure,
                r"<(?P<name>[A-Za-z][\w:.-]*)[\s>/]",
                "element",
            ),
            without_name(regex(
                "xml",
                "xml.comment",
                Documentation,
                r"(?s)<!--.*?-->",
                "comment",
            )),
        ],
        _ => Vec::new(),
    }
}

fn markdown() -> Vec<Pattern> {
    vec![
        with_tests(
            regex(
                "markdown",
                "markdown.heading",
                Documentation,
                r"(?m)^#{1,6}[ \t]+(?P<name>.+)$",
                "heading",
            ),
            &[("# Title\n\ntext\n", true), ("plain text\n", false)],
        ),
        without_name(regex(
            "markdown",
            "markdown.code_block",
            CodePattern,
            r"(?s)```.*?```",
            "code_block",
        )),
        regex(
            "markdown",
            "markdown.link",
            Documentation,
            r"\[(?P<name>[^\]]+)\]\([^)]*\)",
            "link",
        ),
    ]
}
